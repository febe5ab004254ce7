//! Manifest factory
//!
//! Builds concrete manifests for one application by cloning the configured
//! templates and patching them in place. All navigation goes through the
//! get-or-create accessors, so a template may predefine any subset of the
//! touched nodes and the factory fills in the rest.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvFromSource, EnvVar, PodSpec, PodTemplateSpec, Secret, SecretEnvSource,
};

use applift_core::{FieldSpec, ListChain, NamedItemSpec};
use applift_core::naming::{app_name, build_job_name, dial_auth_secret_name};

use crate::config::{AppConfig, RuntimeConfig};
use crate::error::{KubeError, Result};
use crate::knative::{KnativeService, RevisionSpec, RevisionTemplateSpec, ServiceSpec};

const JOB_SPEC: FieldSpec<Job, JobSpec> = FieldSpec::new(JobSpec::default, |job| &mut job.spec);

const POD_SPEC: FieldSpec<PodTemplateSpec, PodSpec> =
    FieldSpec::new(PodSpec::default, |template| &mut template.spec);

const INIT_CONTAINERS: FieldSpec<PodSpec, Vec<Container>> =
    FieldSpec::new(Vec::new, |spec| &mut spec.init_containers);

const CONTAINER_ENV: FieldSpec<Container, Vec<EnvVar>> =
    FieldSpec::new(Vec::new, |container| &mut container.env);

const CONTAINER_ENV_FROM: FieldSpec<Container, Vec<EnvFromSource>> =
    FieldSpec::new(Vec::new, |container| &mut container.env_from);

const CONTAINER_ARGS: FieldSpec<Container, Vec<String>> =
    FieldSpec::new(Vec::new, |container| &mut container.args);

const SERVICE_TEMPLATE: FieldSpec<ServiceSpec, RevisionTemplateSpec> =
    FieldSpec::new(RevisionTemplateSpec::default, |spec| &mut spec.template);

const REVISION_SPEC: FieldSpec<RevisionTemplateSpec, RevisionSpec> =
    FieldSpec::new(RevisionSpec::default, |template| &mut template.spec);

const REVISION_CONTAINERS: FieldSpec<RevisionSpec, Vec<Container>> =
    FieldSpec::new(Vec::new, |spec| &mut spec.containers);

const CONTAINER_NAME: NamedItemSpec<Container> = NamedItemSpec::new(
    Container::default,
    |container| &container.name,
    |container, name| container.name = name,
);

const ENV_VAR_NAME: NamedItemSpec<EnvVar> =
    NamedItemSpec::new(EnvVar::default, |var| &var.name, |var, name| var.name = name);

/// Produces per-application manifests from the configured templates.
#[derive(Clone)]
pub struct ManifestFactory {
    config: Arc<AppConfig>,
}

impl ManifestFactory {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Resolve a runtime id against the configured catalog.
    pub fn runtime(&self, id: &str) -> Result<&RuntimeConfig> {
        self.config
            .runtimes
            .get(id)
            .ok_or_else(|| KubeError::UnsupportedRuntime {
                offered: id.to_string(),
                supported: self
                    .config
                    .runtimes
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Secret carrying the application's upstream credentials.
    ///
    /// Blank credentials are omitted rather than stored as empty values.
    pub fn auth_secret(&self, name: &str, api_key: Option<&str>, jwt: Option<&str>) -> Secret {
        let mut creds = BTreeMap::new();
        if let Some(api_key) = api_key.filter(|v| !v.trim().is_empty()) {
            creds.insert("API_KEY".to_string(), api_key.to_string());
        }
        if let Some(jwt) = jwt.filter(|v| !v.trim().is_empty()) {
            creds.insert("JWT".to_string(), jwt.to_string());
        }

        let mut secret = self.config.templates.secret.clone();
        secret.metadata.name = Some(dial_auth_secret_name(name));
        secret.string_data = Some(creds);
        secret
    }

    /// Kaniko job that builds and pushes the application image.
    ///
    /// The puller init container receives the source location and the auth
    /// secret; the builder container receives the dockerfile, destination
    /// and base-image arguments derived from the runtime.
    pub fn build_job(&self, name: &str, sources: &str, runtime: &str) -> Result<Job> {
        let runtime = self.runtime(runtime)?;
        let target_image = self.config.registry.full_image_ref(name);
        tracing::info!(target_image, "target image");

        let mut job = self.config.templates.job.clone();
        job.metadata.name = Some(build_job_name(name));

        let pod_spec = POD_SPEC.get_or_set(&mut JOB_SPEC.get_or_set(&mut job).template);

        {
            let init_containers = INIT_CONTAINERS.get_or_set(pod_spec);
            let mut containers = ListChain::new(init_containers, &CONTAINER_NAME);
            let puller = containers.entry(&self.config.puller_container);

            let env = CONTAINER_ENV.get_or_set(puller);
            ListChain::new(env, &ENV_VAR_NAME).entry("SOURCES").value =
                Some(sources.to_string());

            CONTAINER_ENV_FROM.get_or_set(puller).push(EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: dial_auth_secret_name(name),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }

        let mut containers = ListChain::new(&mut pod_spec.containers, &CONTAINER_NAME);
        let builder = containers.entry(&self.config.builder_container);
        CONTAINER_ARGS.get_or_set(builder).extend([
            format!("--dockerfile=/templates/{}/Dockerfile", runtime.profile),
            format!("--destination={target_image}"),
            format!("--build-arg=PYTHON_IMAGE={}", runtime.image),
        ]);

        Ok(job)
    }

    /// Knative service running the built image with the given environment.
    pub fn app_service(&self, name: &str, env: &BTreeMap<String, String>) -> KnativeService {
        let mut service = self.config.templates.service.clone();
        service.metadata.name = Some(app_name(name));

        let revision = REVISION_SPEC.get_or_set(SERVICE_TEMPLATE.get_or_set(&mut service.spec));
        let containers = REVISION_CONTAINERS.get_or_set(revision);
        let mut chain = ListChain::new(containers, &CONTAINER_NAME);
        let container = chain.entry(&self.config.service_container);

        container.image = Some(self.config.registry.full_image_ref(name));

        let container_env = CONTAINER_ENV.get_or_set(container);
        let mut env_chain = ListChain::new(container_env, &ENV_VAR_NAME);
        for (key, value) in env {
            env_chain.entry(key).value = Some(value.clone());
        }

        service
    }
}
