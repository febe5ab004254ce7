//! Applift Kube - cluster integration for the application controller
//!
//! This crate turns logical application names and user sources into cluster
//! resources:
//! - **Configuration**: base manifest templates, runtimes and limits
//! - **Manifest Factory**: clones templates and patches them through the
//!   get-or-create navigation engine
//! - **Cluster Client**: thin typed wrapper over the Kubernetes API
//! - **Watch Primitive**: create a resource and wait for a terminal
//!   condition, bounded by a timeout
//! - **Build Pipeline**: secret + kaniko job orchestration with failure-log
//!   enrichment and idempotent cleanup
//! - **Deploy Pipeline**: Knative service rollout, log retrieval and
//!   idempotent undeploy

pub mod build;
pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod knative;
pub mod manifests;
pub mod watch;

pub use build::{BuildPipeline, BuildRequest};
pub use client::ClusterClient;
pub use config::{AppConfig, RuntimeConfig, Templates};
pub use deploy::{DeployPipeline, LogEntry};
pub use error::{KubeError, Result};
pub use knative::{Condition, KnativeService, ServiceSpec, ServiceStatus};
pub use manifests::ManifestFactory;
