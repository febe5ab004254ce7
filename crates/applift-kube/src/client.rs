//! Typed Kubernetes API access
//!
//! One client per target cluster and namespace. Deletes are idempotent:
//! they report whether the resource existed, and a 404 from the API server
//! is absorbed rather than surfaced. Jobs and services are deleted with
//! foreground propagation so their pods are gone before the delete call
//! resolves; secrets have no dependents and use the default policy.

use std::path::Path;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::ApiResource;
use kube::{Client, Config};

use crate::error::{KubeError, Result};
use crate::knative::KnativeService;

/// Handle to one namespace of one cluster.
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    namespace: String,
}

impl ClusterClient {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Connect using an explicit kubeconfig, or fall back to the ambient
    /// configuration (in-cluster service account or `KUBECONFIG`).
    pub async fn from_kubeconfig(
        path: Option<&Path>,
        context: Option<&str>,
        namespace: impl Into<String>,
    ) -> Result<Self> {
        let client = match path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                let options = KubeConfigOptions {
                    context: context.map(str::to_string),
                    ..Default::default()
                };
                let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
                Client::try_from(config)?
            }
            None => Client::try_default().await?,
        };

        Ok(Self::new(client, namespace))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Secrets API scoped to this client's namespace.
    pub fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Jobs API scoped to this client's namespace.
    pub fn jobs(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Knative services API for the dynamically resolved Serving version.
    pub fn services(&self, resource: &ApiResource) -> Api<KnativeService> {
        Api::namespaced_with(self.client.clone(), &self.namespace, resource)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub async fn create_secret(&self, secret: &Secret) -> Result<()> {
        let name = secret.metadata.name.as_deref().unwrap_or_default();
        tracing::info!(name, namespace = self.namespace, "creating secret");
        self.secrets()
            .create(&PostParams::default(), secret)
            .await?;
        Ok(())
    }

    /// Delete a secret; returns whether it existed.
    pub async fn delete_secret(&self, name: &str) -> Result<bool> {
        tracing::info!(name, namespace = self.namespace, "deleting secret");
        absorb_not_found(
            self.secrets()
                .delete(name, &DeleteParams::default())
                .await,
        )
    }

    /// Delete a job and its pods; returns whether it existed.
    pub async fn delete_job(&self, name: &str) -> Result<bool> {
        tracing::info!(name, namespace = self.namespace, "deleting job");
        absorb_not_found(self.jobs().delete(name, &DeleteParams::foreground()).await)
    }

    /// Delete a service and its revisions; returns whether it existed.
    pub async fn delete_service(&self, resource: &ApiResource, name: &str) -> Result<bool> {
        tracing::info!(name, namespace = self.namespace, "deleting service");
        absorb_not_found(
            self.services(resource)
                .delete(name, &DeleteParams::foreground())
                .await,
        )
    }

    /// Pods matching a label selector, in listing order.
    pub async fn pods_by_label(&self, selector: &str) -> Result<Vec<Pod>> {
        let pods = self
            .pods()
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(pods.items)
    }

    /// Current log of one container of one pod.
    pub async fn container_log(&self, pod: &str, container: &str) -> Result<String> {
        let params = LogParams {
            container: Some(container.to_string()),
            ..Default::default()
        };
        Ok(self.pods().logs(pod, &params).await?)
    }
}

fn absorb_not_found<T>(result: kube::Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(error) => {
            let error = KubeError::from(error);
            if error.is_not_found() {
                Ok(false)
            } else {
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "TestReason".to_string(),
            code,
        })
    }

    #[test]
    fn missing_resource_reads_as_not_deleted() {
        let outcome = absorb_not_found::<()>(Err(api_error(404))).unwrap();
        assert!(!outcome);
    }

    #[test]
    fn successful_delete_reads_as_deleted() {
        let outcome = absorb_not_found(Ok(())).unwrap();
        assert!(outcome);
    }

    #[test]
    fn other_api_errors_propagate() {
        let outcome = absorb_not_found::<()>(Err(api_error(500)));
        assert!(matches!(outcome, Err(KubeError::Api(_))));
    }
}
