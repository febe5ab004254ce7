//! Error types for applift-kube

use thiserror::Error;

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while orchestrating cluster resources
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig loading error
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Registry error surfaced through a pipeline
    #[error("registry error: {0}")]
    Registry(#[from] applift_registry::RegistryError),

    /// The requested runtime has no configured image/profile pair
    #[error("unsupported runtime: {offered}. Supported: [{supported}]")]
    UnsupportedRuntime { offered: String, supported: String },

    /// Build job reported a Failed condition
    #[error("job {name} has failed: {message}")]
    JobFailed { name: String, message: String },

    /// Knative service reported Ready=False
    #[error("failed to set up service {name}: {message}")]
    ServiceSetupFailed { name: String, message: String },

    /// Build failure enriched with the failed container's log
    #[error("{message}")]
    BuildFailed { message: String },

    /// Watch subscription ended without observing a terminal condition
    #[error("subscription to {kind} {name} events expired")]
    SubscriptionExpired { kind: String, name: String },

    /// Watch subscription delivered an error event
    #[error("watch of {kind} {name} failed: {message}")]
    WatchFailed {
        kind: String,
        name: String,
        message: String,
    },

    /// A ready service carried no URL
    #[error("empty URL reported for ready service {name}")]
    EmptyServiceUrl { name: String },

    /// The designated service container is absent from a pod's status
    #[error("container {container} is missing in service pod")]
    MissingContainerStatus { container: String },

    /// Invalid manifest
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Service apiVersion does not parse as `<group>/<version>`
    #[error("invalid api version '{0}', expected <group>/<version>")]
    InvalidApiVersion(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Background watch task failed
    #[error("watch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::InvalidConfig(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }
}
