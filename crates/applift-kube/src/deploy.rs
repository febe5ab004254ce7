//! Service deploy pipeline
//!
//! A deployed application is one Knative service running the previously
//! built image. The pipeline stamps the service manifest, creates it and
//! waits for the Ready condition; the service URL reported by the status
//! is the operation's result. Undeploy and log retrieval are keyed purely
//! by the application name.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;

use applift_core::naming::app_name;

use crate::client::ClusterClient;
use crate::config::AppConfig;
use crate::error::{KubeError, Result};
use crate::knative::{KnativeService, service_api_resource};
use crate::manifests::ManifestFactory;
use crate::watch::create_and_watch;

/// Log of one running application instance.
#[derive(Clone, Debug, Serialize)]
pub struct LogEntry {
    pub instance: String,
    pub content: String,
}

/// Orchestrates service rollout against the deploy cluster.
#[derive(Clone)]
pub struct DeployPipeline {
    cluster: ClusterClient,
    factory: ManifestFactory,
    config: Arc<AppConfig>,
}

impl DeployPipeline {
    pub fn new(cluster: ClusterClient, factory: ManifestFactory, config: Arc<AppConfig>) -> Self {
        Self {
            cluster,
            factory,
            config,
        }
    }

    /// Create the application service and wait until it is ready.
    ///
    /// Returns the public URL reported by the service status.
    pub async fn deploy(&self, name: &str, env: &BTreeMap<String, String>) -> Result<String> {
        let service = self.factory.app_service(name, env);
        let resource = service_api_resource(self.config.service_api_version()?)?;

        let services = self.cluster.services(&resource);
        let timeout = self.config.service_setup_timeout_sec;
        let verdict_name = app_name(name);
        let watch = tokio::spawn(create_and_watch(
            services,
            service,
            "service",
            timeout,
            move |state: &KnativeService| service_verdict(&verdict_name, state),
        ));

        let url = watch.await??;
        tracing::info!(app = name, url, "service is ready");
        Ok(url)
    }

    /// Delete the application service; returns whether it existed.
    pub async fn undeploy(&self, name: &str) -> Result<bool> {
        let resource = service_api_resource(self.config.service_api_version()?)?;
        self.cluster
            .delete_service(&resource, &app_name(name))
            .await
    }

    /// Collect the serving container's log from every instance.
    ///
    /// Instances whose serving container is still waiting are skipped; an
    /// instance with no status for that container at all is an error.
    pub async fn logs(&self, name: &str) -> Result<Vec<LogEntry>> {
        let selector = format!("serving.knative.dev/service={}", app_name(name));
        let pods = self.cluster.pods_by_label(&selector).await?;

        let mut logs = Vec::new();
        for pod in &pods {
            if !container_running(pod, &self.config.service_container)? {
                continue;
            }
            let Some(instance) = pod.metadata.name.as_deref() else {
                continue;
            };
            let content = self
                .cluster
                .container_log(instance, &self.config.service_container)
                .await?;
            logs.push(LogEntry {
                instance: instance.to_string(),
                content,
            });
        }

        Ok(logs)
    }
}

/// Decide whether a service state is terminal.
fn service_verdict(name: &str, service: &KnativeService) -> Result<Option<String>> {
    let Some(status) = service.status.as_ref() else {
        return Ok(None);
    };
    let conditions = status.conditions.as_deref().unwrap_or_default();

    for condition in conditions {
        if condition.type_ == "Ready" {
            if condition.status == "True" {
                let url = status.url.as_deref().unwrap_or_default().trim();
                if url.is_empty() {
                    return Err(KubeError::EmptyServiceUrl {
                        name: name.to_string(),
                    });
                }
                return Ok(Some(url.to_string()));
            }
            if condition.status == "False" {
                return Err(KubeError::ServiceSetupFailed {
                    name: name.to_string(),
                    message: condition.message.clone().unwrap_or_default(),
                });
            }
        }

        tracing::info!(
            service = name,
            status = condition.type_,
            reason = condition.reason.as_deref().unwrap_or_default(),
            message = condition.message.as_deref().unwrap_or_default(),
            "service condition"
        );
    }

    Ok(None)
}

/// Whether the named container of a pod has left the waiting state.
fn container_running(pod: &Pod, container: &str) -> Result<bool> {
    let status = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_deref())
        .unwrap_or_default()
        .iter()
        .find(|status| status.name == container)
        .ok_or_else(|| KubeError::MissingContainerStatus {
            container: container.to_string(),
        })?;

    Ok(status
        .state
        .as_ref()
        .is_none_or(|state| state.waiting.is_none()))
}
