#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("machine {0} not found")]
    NotFound(String),
    #[error("invalid provider id {0:?}")]
    InvalidProviderId(String),
    #[error("provider operation not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("provider config: {0}")]
    Config(String),
    #[error("cluster name is required")]
    NoClusterName,
    #[error("unsupported provider {0:?}")]
    Unsupported(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
