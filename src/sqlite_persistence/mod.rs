mod versioned_schema;

pub use versioned_schema::*;

/// Offset added to schema versions before they are written to `PRAGMA user_version`,
/// so that databases not created by us are told apart from version 0.
pub const BASE_DB_VERSION: usize = 99999;
