//! Image build pipeline
//!
//! Building an application image takes three cluster resources: a secret
//! with the upstream credentials, a kaniko job that pulls the sources and
//! pushes the image, and the registry manifest the job produces. The
//! pipeline creates the first two and waits on the job's terminal
//! condition; when the job fails, the failed container's log is folded
//! into the returned error so callers see the actual build output instead
//! of a bare condition message.

use std::sync::Arc;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;

use applift_core::naming::{build_job_name, dial_auth_secret_name};
use applift_core::truncate_tail;
use applift_registry::RegistryClient;

use crate::client::ClusterClient;
use crate::config::AppConfig;
use crate::error::{KubeError, Result};
use crate::manifests::ManifestFactory;
use crate::watch::create_and_watch;

const VALIDATION_ERROR_MARKER: &str = "AppValidationException: ";

/// Inputs for one image build.
#[derive(Clone, Debug)]
pub struct BuildRequest {
    pub name: String,
    pub sources: String,
    pub api_key: Option<String>,
    pub jwt: Option<String>,
    pub runtime: String,
}

/// Orchestrates image builds against the build cluster.
#[derive(Clone)]
pub struct BuildPipeline {
    cluster: ClusterClient,
    factory: ManifestFactory,
    registry: RegistryClient,
    config: Arc<AppConfig>,
}

impl BuildPipeline {
    pub fn new(
        cluster: ClusterClient,
        factory: ManifestFactory,
        registry: RegistryClient,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            cluster,
            factory,
            registry,
            config,
        }
    }

    /// Build and push the application image; returns the image reference.
    pub async fn build(&self, request: &BuildRequest) -> Result<String> {
        // Reject unknown runtimes before touching the cluster.
        self.factory.runtime(&request.runtime)?;

        let secret = self.factory.auth_secret(
            &request.name,
            request.api_key.as_deref(),
            request.jwt.as_deref(),
        );
        self.cluster.create_secret(&secret).await?;

        let job = self
            .factory
            .build_job(&request.name, &request.sources, &request.runtime)?;
        let job_name = build_job_name(&request.name);

        let jobs = self.cluster.jobs();
        let timeout = self.config.image_build_timeout_sec;
        let watch = tokio::spawn(create_and_watch(jobs, job, "job", timeout, job_verdict));

        match watch.await? {
            Ok(()) => {
                tracing::info!(job = job_name, "job has completed successfully");
                Ok(self.config.registry.full_image_ref(&request.name))
            }
            Err(error) => Err(self.enrich_failure(&job_name, error).await),
        }
    }

    /// Fold the failed container's log into the build error.
    ///
    /// Enrichment is best effort: any problem locating the failed container
    /// or reading its log leaves the original error untouched.
    async fn enrich_failure(&self, job_name: &str, error: KubeError) -> KubeError {
        let pods = match self
            .cluster
            .pods_by_label(&format!("job-name={job_name}"))
            .await
        {
            Ok(pods) => pods,
            Err(_) => return error,
        };

        let Some((pod, container)) = find_failed_container(&pods) else {
            return error;
        };

        match self.cluster.container_log(pod, container).await {
            Ok(log) => KubeError::BuildFailed {
                message: error_message(
                    &log,
                    self.config.max_error_log_lines,
                    self.config.max_error_log_chars,
                ),
            },
            Err(_) => error,
        }
    }

    /// Remove every trace of an application's image.
    ///
    /// Deletes the build job, the auth secret and the registry manifest;
    /// returns whether anything existed to delete.
    pub async fn clean(&self, name: &str) -> Result<bool> {
        let mut deleted = self.cluster.delete_job(&build_job_name(name)).await?;
        deleted |= self
            .cluster
            .delete_secret(&dial_auth_secret_name(name))
            .await?;

        if let Some(digest) = self.registry.get_digest(name).await? {
            deleted |= self.registry.delete_manifest(name, &digest).await?;
        }

        Ok(deleted)
    }
}

/// Decide whether a job state is terminal.
fn job_verdict(job: &Job) -> Result<Option<()>> {
    let name = job.metadata.name.as_deref().unwrap_or_default();
    let conditions = job
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_deref())
        .unwrap_or_default();

    for condition in conditions {
        if condition.status == "True" {
            if condition.type_ == "Complete" {
                return Ok(Some(()));
            }
            if condition.type_ == "Failed" {
                return Err(KubeError::JobFailed {
                    name: name.to_string(),
                    message: condition.message.clone().unwrap_or_default(),
                });
            }
        }

        tracing::info!(
            job = name,
            status = condition.type_,
            reason = condition.reason.as_deref().unwrap_or_default(),
            message = condition.message.as_deref().unwrap_or_default(),
            "job condition"
        );
    }

    Ok(None)
}

/// First container of the first failed pod that terminated with a non-zero
/// exit code. Init containers are considered first, then the main ones,
/// then ephemeral ones.
fn find_failed_container(pods: &[Pod]) -> Option<(&str, &str)> {
    let pod = pods.iter().find(|pod| {
        pod.status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            == Some("Failed")
    })?;

    let pod_name = pod.metadata.name.as_deref()?;
    let status = pod.status.as_ref()?;

    let statuses = [
        &status.init_container_statuses,
        &status.container_statuses,
        &status.ephemeral_container_statuses,
    ];
    let container = statuses
        .into_iter()
        .flatten()
        .flatten()
        .find(|container| {
            container
                .state
                .as_ref()
                .and_then(|state| state.terminated.as_ref())
                .is_some_and(|terminated| terminated.exit_code != 0)
        })?;

    Some((pod_name, &container.name))
}

/// Summarize a failed build log.
///
/// A validation marker in the log means the sources themselves were
/// rejected; everything after the marker is the user-facing message.
/// Otherwise the log tail is attached, bounded by the configured limits.
fn error_message(log: &str, max_lines: usize, max_chars: usize) -> String {
    match log.find(VALIDATION_ERROR_MARKER) {
        Some(index) => {
            let rest = &log[index + VALIDATION_ERROR_MARKER.len()..];
            format!("Validation error: {rest}").trim().to_string()
        }
        None => format!(
            "Failed to build image. Logs: {}",
            truncate_tail(log, max_lines, max_chars)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::{JobCondition, JobStatus};
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateTerminated, ContainerStatus, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn job_with(type_: &str, status: &str, message: Option<&str>) -> Job {
        Job {
            metadata: ObjectMeta {
                name: Some("app-ctrl-build-demo".to_string()),
                ..Default::default()
            },
            status: Some(JobStatus {
                conditions: Some(vec![JobCondition {
                    type_: type_.to_string(),
                    status: status.to_string(),
                    message: message.map(str::to_string),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn container_status(name: &str, exit_code: Option<i32>) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            state: Some(ContainerState {
                terminated: exit_code.map(|exit_code| ContainerStateTerminated {
                    exit_code,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn failed_pod(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Failed".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn complete_condition_is_success() {
        let verdict = job_verdict(&job_with("Complete", "True", None)).unwrap();
        assert_eq!(verdict, Some(()));
    }

    #[test]
    fn failed_condition_carries_the_message() {
        let error = job_verdict(&job_with("Failed", "True", Some("BackoffLimitExceeded")))
            .unwrap_err();

        assert!(matches!(
            error,
            KubeError::JobFailed { ref name, ref message }
                if name == "app-ctrl-build-demo" && message == "BackoffLimitExceeded"
        ));
    }

    #[test]
    fn non_terminal_conditions_keep_waiting() {
        assert!(job_verdict(&job_with("Suspended", "False", None))
            .unwrap()
            .is_none());
        assert!(job_verdict(&job_with("Complete", "False", None))
            .unwrap()
            .is_none());
        assert!(job_verdict(&Job::default()).unwrap().is_none());
    }

    #[test]
    fn failed_container_lookup_prefers_init_containers() {
        let mut pod = failed_pod("pod-1");
        let status = pod.status.as_mut().unwrap();
        status.init_container_statuses = Some(vec![
            container_status("puller", Some(0)),
            container_status("checker", Some(2)),
        ]);
        status.container_statuses = Some(vec![container_status("builder", Some(1))]);

        let found = find_failed_container(std::slice::from_ref(&pod));

        assert_eq!(found, Some(("pod-1", "checker")));
    }

    #[test]
    fn running_pods_are_skipped() {
        let mut running = failed_pod("pod-0");
        running.status.as_mut().unwrap().phase = Some("Running".to_string());
        let mut failed = failed_pod("pod-1");
        failed.status.as_mut().unwrap().container_statuses =
            Some(vec![container_status("builder", Some(1))]);
        let pods = [running, failed];

        let found = find_failed_container(&pods);

        assert_eq!(found, Some(("pod-1", "builder")));
    }

    #[test]
    fn pod_without_terminated_container_yields_nothing() {
        let mut pod = failed_pod("pod-1");
        pod.status.as_mut().unwrap().container_statuses =
            Some(vec![container_status("builder", None)]);

        assert!(find_failed_container(std::slice::from_ref(&pod)).is_none());
    }

    #[test]
    fn validation_marker_takes_priority() {
        let log = "step 1\nstep 2\nAppValidationException: bad requirements.txt \n";

        let message = error_message(log, 10, 100);

        assert_eq!(message, "Validation error: bad requirements.txt");
    }

    #[test]
    fn log_tail_is_truncated() {
        let log = "one\ntwo\nthree\nfour";

        let message = error_message(log, 2, 100);

        assert_eq!(message, "Failed to build image. Logs: three\nfour");
    }
}
