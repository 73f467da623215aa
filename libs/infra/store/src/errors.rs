use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    Mapping(String),

    #[error("employee {0} not found")]
    EmployeeNotFound(String),

    #[error("access_end ({end}) must be strictly after access_start ({start})")]
    InvalidWindow { start: String, end: String },

    #[error("embedding vector norm out of tolerance: {0}")]
    EmbeddingNotNormalized(f32),
}
