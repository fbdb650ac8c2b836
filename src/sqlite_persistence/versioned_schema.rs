use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

use super::BASE_DB_VERSION;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Only mutated when optional field assignments are passed
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                default_value: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
}

impl Column {
    fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default_value) = self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default_value));
        }
        sql
    }
}

/// One row of `PRAGMA table_info`.
struct ExistingColumn {
    name: String,
    type_name: String,
    non_null: bool,
    default_value: Option<String>,
    is_primary_key: bool,
}

/// SQLite reports expression defaults with one extra pair of parentheses.
fn unwrap_parentheses(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(s)
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    fn create(&self, conn: &Connection) -> Result<()> {
        let columns_sql = self
            .columns
            .iter()
            .map(Column::definition)
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute(&format!("CREATE TABLE {} ({});", self.name, columns_sql), [])?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, column_name),
                [],
            )?;
        }
        Ok(())
    }

    fn existing_columns(&self, conn: &Connection) -> Result<Vec<ExistingColumn>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ExistingColumn {
                    name: row.get(1)?,
                    type_name: row.get(2)?,
                    non_null: row.get::<_, i32>(3)? == 1,
                    default_value: row.get(4)?,
                    is_primary_key: row.get::<_, i32>(5)? == 1,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read columns of table {}", self.name))?;
        Ok(columns)
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        let existing = self.existing_columns(conn)?;
        if existing.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}",
                self.name,
                existing.len(),
                self.columns.len()
            );
        }

        for (actual, expected) in existing.iter().zip(self.columns) {
            if actual.name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    actual.name
                );
            }
            let same_default = actual.default_value.as_deref().map(unwrap_parentheses)
                == expected.default_value.map(unwrap_parentheses);
            if actual.type_name != expected.sql_type.as_sql()
                || actual.non_null != expected.non_null
                || actual.is_primary_key != expected.is_primary_key
                || !same_default
            {
                bail!("Table {} column {} definition mismatch", self.name, expected.name);
            }
        }

        for (index_name, _column) in self.indices {
            let index_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                params![index_name, self.name],
                |row| row.get(0),
            )?;
            if index_count == 0 {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }
}

/// The tables a database is expected to hold at a given version.
pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected = (BASE_DB_VERSION + self.version) as i64;
        if raw_version != expected {
            bail!(
                "Database version {} does not match expected version {}",
                raw_version - BASE_DB_VERSION as i64,
                self.version
            );
        }
        self.tables.iter().try_for_each(|table| table.validate(conn))
    }
}

/// Opens the database at `path`, creating `schema` when the file is new and
/// validating it otherwise.
pub fn open_versioned<P: AsRef<Path>>(
    path: P,
    schema: &VersionedSchema,
    label: &str,
) -> Result<Connection> {
    let path = path.as_ref();
    let is_new_db = !path.exists();
    let conn = Connection::open(path).with_context(|| format!("Failed to open {} database", label))?;

    if is_new_db {
        info!("Creating new {} database at {:?}", label, path);
        schema.create(&conn)?;
    } else {
        schema
            .validate(&conn)
            .with_context(|| format!("{} database schema validation failed", label))?;
    }
    Ok(conn)
}
