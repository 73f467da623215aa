use crate::errors::StoreError;
use libsql::Connection;
use tracing::{debug, instrument};

/// Idempotent `CREATE TABLE IF NOT EXISTS` statements, applied in order at
/// startup. Mirrors the reference schema in the original implementation's
/// `db.py` one-for-one (column names, indexes).
const TABLES: &[(&str, &str)] = &[
    (
        "employees",
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            employee_id TEXT PRIMARY KEY,
            display_name TEXT,
            access_start DATETIME NOT NULL,
            access_end DATETIME NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    ),
    (
        "embeddings",
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_id TEXT NOT NULL REFERENCES employees(employee_id) ON DELETE CASCADE,
            embedding BLOB NOT NULL,
            photo_hash TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    ),
    (
        "embeddings_employee_idx",
        "CREATE INDEX IF NOT EXISTS embeddings_employee_idx ON embeddings(employee_id);",
    ),
    (
        "audit_log",
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            event_type TEXT NOT NULL,
            employee_id TEXT,
            matched_employee_id TEXT,
            similarity_score REAL,
            result TEXT NOT NULL,
            reason TEXT,
            metadata TEXT
        );
        "#,
    ),
    (
        "audit_log_timestamp_idx",
        "CREATE INDEX IF NOT EXISTS audit_log_timestamp_idx ON audit_log(timestamp DESC);",
    ),
    (
        "audit_log_employee_idx",
        "CREATE INDEX IF NOT EXISTS audit_log_employee_idx ON audit_log(employee_id);",
    ),
];

#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    for (name, statement) in TABLES {
        debug!(table = *name, "applying schema statement");
        connection.execute(statement, ()).await?;
    }
    Ok(())
}
