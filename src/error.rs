use crate::store::StoreError;

/// Failures that stop a binary before or while serving.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] figment::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("http server error: {0}")]
    Http(#[from] hyper::Error),
}
