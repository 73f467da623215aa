use crate::client::StoreClient;
use crate::errors::StoreError;
use faceaccess_models::employee::{bytes_to_vector, is_normalized, vector_to_bytes};
use libsql::{params, Connection};
use tracing::instrument;

#[derive(Clone)]
pub struct EmbeddingRepository {
    client: StoreClient,
}

impl EmbeddingRepository {
    pub fn new(client: StoreClient) -> Self {
        EmbeddingRepository { client }
    }

    #[instrument(skip(self, vector))]
    pub async fn add(
        &self,
        employee_id: &str,
        vector: &[f32],
        photo_hash: Option<&str>,
    ) -> Result<i64, StoreError> {
        if !is_normalized(vector) {
            return Err(StoreError::EmbeddingNotNormalized(
                faceaccess_models::employee::l2_norm(vector),
            ));
        }

        let bytes = vector_to_bytes(vector);
        self.client
            .with_write_lock(move |conn| {
                let employee_id = employee_id.to_string();
                let photo_hash = photo_hash.map(str::to_string);
                async move {
                    conn.execute(
                        "INSERT INTO embeddings (employee_id, embedding, photo_hash) VALUES (?1, ?2, ?3)",
                        params![employee_id, bytes, photo_hash],
                    )
                    .await?;
                    Ok(conn.last_insert_rowid())
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_for_employee(&self, employee_id: &str) -> Result<u64, StoreError> {
        self.client
            .with_write_lock(move |conn| {
                let employee_id = employee_id.to_string();
                async move {
                    let rows = conn
                        .execute(
                            "DELETE FROM embeddings WHERE employee_id = ?1",
                            params![employee_id],
                        )
                        .await?;
                    Ok(rows)
                }
            })
            .await
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let conn = self.client.connection().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM embeddings", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }
}

/// Loads all embedding vectors enrolled for one employee. Shared by
/// `EmployeeRepository::get_active_with_embeddings` since that query is
/// naturally a join, not a repository-crossing call.
pub(crate) async fn vectors_for(conn: &Connection, employee_id: &str) -> Result<Vec<Vec<f32>>, StoreError> {
    let mut rows = conn
        .query(
            "SELECT embedding FROM embeddings WHERE employee_id = ?1",
            params![employee_id.to_string()],
        )
        .await?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        let bytes: Vec<u8> = row.get(0)?;
        out.push(bytes_to_vector(&bytes));
    }
    Ok(out)
}
