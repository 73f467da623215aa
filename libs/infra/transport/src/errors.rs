use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth adapter error: {0}")]
    Adapter(#[from] bluer::Error),
    #[error("invalid characteristic UUID '{0}'")]
    InvalidUuid(String),
}
