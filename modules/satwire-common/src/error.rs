use thiserror::Error;

#[derive(Error, Debug)]
pub enum SatwireError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
