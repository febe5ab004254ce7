//! Controller configuration
//!
//! Everything the pipelines need comes from one YAML file: base manifest
//! templates for the auth secret, the build job and the Knative service,
//! the runtime catalog, watch timeouts and log-trimming limits. The
//! templates are parsed into their typed manifests up front so a malformed
//! template fails at startup instead of on the first request.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;

use crate::error::{KubeError, Result};
use crate::knative::KnativeService;
use applift_registry::RegistryConfig;

/// Top-level controller configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AppConfig {
    /// Namespace that hosts build secrets and jobs
    pub build_namespace: String,

    /// Namespace that hosts deployed services
    pub deploy_namespace: String,

    /// Explicit kubeconfig path; in-cluster config is used when absent
    #[serde(default)]
    pub kube_config: Option<PathBuf>,

    /// Kubeconfig context for the build cluster
    #[serde(default)]
    pub build_context: Option<String>,

    /// Kubeconfig context for the deploy cluster
    #[serde(default)]
    pub deploy_context: Option<String>,

    /// Runtime applied when a request does not name one
    pub default_runtime: String,

    /// Name of the init container that fetches application sources
    pub puller_container: String,

    /// Name of the container that runs the image build
    pub builder_container: String,

    /// Name of the container serving the application in each revision
    pub service_container: String,

    /// Watch timeout for image build jobs, in seconds
    pub image_build_timeout_sec: u32,

    /// Watch timeout for service readiness, in seconds
    pub service_setup_timeout_sec: u32,

    /// Interval between keep-alive events on streaming responses
    pub heartbeat_period_sec: u64,

    /// Line cap applied to failure logs attached to error messages
    pub max_error_log_lines: usize,

    /// Character cap applied to failure logs attached to error messages
    pub max_error_log_chars: usize,

    /// Supported runtimes, keyed by runtime id
    pub runtimes: BTreeMap<String, RuntimeConfig>,

    /// Image registry the build jobs push to
    pub registry: RegistryConfig,

    /// Base manifests patched per application
    pub templates: Templates,
}

/// Image and build profile backing one runtime id
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuntimeConfig {
    pub image: String,
    pub profile: String,
}

/// Base manifests for the resources the controller creates
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Templates {
    pub secret: Secret,
    pub job: Job,
    pub service: KnativeService,
}

impl AppConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&raw)?;
        config.service_api_version()?;
        Ok(config)
    }

    /// The `apiVersion` declared by the service template.
    pub fn service_api_version(&self) -> Result<&str> {
        self.templates
            .service
            .types
            .as_ref()
            .map(|t| t.api_version.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                KubeError::InvalidConfig("service template has no apiVersion".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
build-namespace: builds
deploy-namespace: apps
default-runtime: python3.11
puller-container: sources-puller
builder-container: image-builder
service-container: app
image-build-timeout-sec: 600
service-setup-timeout-sec: 300
heartbeat-period-sec: 10
max-error-log-lines: 20
max-error-log-chars: 1000
runtimes:
  python3.11:
    image: python:3.11-slim
    profile: python
registry:
  host: registry.example.com
  image-name-format: apps/{name}
  image-label: latest
templates:
  secret:
    apiVersion: v1
    kind: Secret
    metadata:
      labels:
        app.kubernetes.io/managed-by: app-ctrl
  job:
    apiVersion: batch/v1
    kind: Job
    spec:
      backoffLimit: 0
      template:
        spec:
          restartPolicy: Never
          containers:
          - name: image-builder
            image: gcr.io/kaniko-project/executor:latest
  service:
    apiVersion: serving.knative.dev/v1
    kind: Service
    metadata: {}
    spec:
      template:
        spec:
          containerConcurrency: 10
"#;

    #[test]
    fn parses_full_configuration() {
        let config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(config.build_namespace, "builds");
        assert_eq!(config.default_runtime, "python3.11");
        assert_eq!(config.runtimes["python3.11"].profile, "python");
        assert_eq!(config.registry.host, "registry.example.com");
        assert_eq!(config.image_build_timeout_sec, 600);
        assert_eq!(config.service_api_version().unwrap(), "serving.knative.dev/v1");

        let job_spec = config.templates.job.spec.as_ref().unwrap();
        assert_eq!(job_spec.backoff_limit, Some(0));
        let revision = config
            .templates
            .service
            .spec
            .template
            .as_ref()
            .unwrap()
            .spec
            .as_ref()
            .unwrap();
        assert_eq!(revision.container_concurrency, Some(10));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.deploy_namespace, "apps");
        assert!(config.kube_config.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<AppConfig, _> =
            serde_yaml::from_str(&format!("{SAMPLE}\nmystery-knob: 1\n"));

        assert!(result.is_err());
    }
}
