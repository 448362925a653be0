#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("provider error: {source}")]
    Provider {
        #[from]
        source: capacity_provider::Error,
    },

    #[error("config error: {source}")]
    Config {
        #[from]
        source: capacity_types::ConfigError,
    },

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("config key {0} not found in backing store")]
    ConfigKeyNotFound(String),

    #[error("no machine type satisfies the pod's resource request")]
    NoResourcesRequested,

    #[error("no allowed machine type has room for the pod's resource request")]
    NoAllowedMachines,

    #[error("autoscaler is paused")]
    Paused,

    #[error("engine is not ready: no config has been loaded yet")]
    NotReady,
}
