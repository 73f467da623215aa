use crate::errors::StoreError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument};

/// Owns the `libsql::Database` handle and the write-gate. Cheap to clone —
/// every repository holds one, matching `TursoClient`'s shape in the
/// teacher crate, but the write-gate here is new: writes must be serialized,
/// reads may run in parallel on their own connection.
#[derive(Clone)]
pub struct StoreClient {
    database: Arc<Database>,
    write_gate: Arc<AsyncMutex<()>>,
}

impl StoreClient {
    #[instrument]
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        info!(path, "opening store database");
        let database = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let bootstrap = database
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        enable_foreign_keys(&bootstrap).await?;
        apply_schema(&bootstrap).await?;

        Ok(StoreClient {
            database: Arc::new(database),
            write_gate: Arc::new(AsyncMutex::new(())),
        })
    }

    /// SQLite disables FK enforcement by default on every new connection;
    /// `embeddings.employee_id`'s `ON DELETE CASCADE` is a no-op without this.
    pub async fn connection(&self) -> Result<Connection, StoreError> {
        let conn = self
            .database
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        enable_foreign_keys(&conn).await?;
        Ok(conn)
    }

    /// Holds the write-gate for the duration of `f`. All mutating
    /// repository methods go through this; reads bypass it entirely.
    pub async fn with_write_lock<F, Fut, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let _permit = self.write_gate.lock().await;
        let conn = self.connection().await?;
        f(conn).await
    }
}

async fn enable_foreign_keys(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
    Ok(())
}
