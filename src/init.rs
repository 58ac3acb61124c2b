use rusqlite::{Connection, Result};

/// Create the tables this crate owns, if missing.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS data_keys (
            name           TEXT PRIMARY KEY NOT NULL,
            active         INTEGER NOT NULL,
            provider       TEXT NOT NULL,
            encrypted_data BLOB NOT NULL,
            created        TEXT NOT NULL,
            updated        TEXT NOT NULL
        );
        "#,
    )
}
