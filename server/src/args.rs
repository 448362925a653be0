use clap::Parser;

/// CLI flags for the capacity server. Every flag has a `CAPACITY_`-prefixed environment
/// equivalent so the process can be configured purely from a Deployment's env block.
#[derive(Parser, Debug, Clone)]
#[command(name = "capacity-server", version)]
pub struct Args {
    /// Path to the kubescaler config file. Takes priority over the ConfigMap lookup.
    #[arg(long, env = "CAPACITY_KUBESCALER_CONFIG")]
    pub kubescaler_config: Option<String>,

    /// Name of the ConfigMap to fall back to when `--kubescaler-config` is unset.
    #[arg(long, env = "CAPACITY_CONFIGMAP_NAME", default_value = "capacity-kubescaler")]
    pub configmap_name: String,

    /// Namespace of the fallback ConfigMap.
    #[arg(long, env = "CAPACITY_CONFIGMAP_NAMESPACE", default_value = "kube-system")]
    pub configmap_namespace: String,

    /// Path to a kubeconfig file. Empty means in-cluster config.
    #[arg(long, env = "CAPACITY_KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Address the HTTP server binds to.
    #[arg(long, env = "CAPACITY_LISTEN_ADDR", default_value = "0.0.0.0:8081")]
    pub listen_addr: String,

    #[arg(long, env = "CAPACITY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// `txt` for human-readable colored output, `json` for structured log lines.
    #[arg(long, env = "CAPACITY_LOG_FORMAT", default_value = "txt")]
    pub log_format: String,
}
