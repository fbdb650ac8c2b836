use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

pub const CACHE_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[Table {
        name: "cache_entries",
        columns: &[
            sqlite_column!("key", SqlType::Text, is_primary_key = true),
            sqlite_column!("value", SqlType::Text, non_null = true),
            sqlite_column!("expires_at", SqlType::Integer, non_null = true),
            sqlite_column!(
                "created_at",
                SqlType::Integer,
                non_null = true,
                default_value = Some(DEFAULT_TIMESTAMP)
            ),
        ],
        indices: &[("idx_cache_entries_expires_at", "expires_at")],
    }],
};
