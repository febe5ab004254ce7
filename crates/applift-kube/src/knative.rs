//! Knative Serving resource types
//!
//! The revisioned service is a custom resource; its API group and version
//! come from the configured service template's own `apiVersion` rather than
//! being compiled in, so the controller can follow whatever Serving version
//! the cluster runs. Only the fields the pipelines read or patch are typed;
//! container shapes reuse the core `Container` model.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Container, Volume};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{ApiResource, GroupVersionKind, Object};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{KubeError, Result};

/// The Knative `Service` custom resource
pub type KnativeService = Object<ServiceSpec, ServiceStatus>;

/// Desired state of a Knative service
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<RevisionTemplateSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<Vec<TrafficTarget>>,
}

/// Template for the revisions stamped out by the service
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<RevisionSpec>,
}

/// Pod-shaped spec of a single revision
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_concurrency: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<Container>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Volume>>,
}

/// Observed state of a Knative service
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_created_revision_name: Option<String>,

    /// Public URL of the service, populated once routing is programmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<Vec<TrafficTarget>>,
}

/// Status condition attached to the service
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    /// Tri-state: "True", "False" or "Unknown"
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// In-cluster address of the service
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addressable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Traffic split entry
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_revision: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Build the dynamic API resource for the Knative Service kind from a
/// `"<group>/<version>"` string.
pub fn service_api_resource(api_version: &str) -> Result<ApiResource> {
    let (group, version) = api_version
        .split_once('/')
        .filter(|(group, version)| !group.is_empty() && !version.is_empty())
        .ok_or_else(|| KubeError::InvalidApiVersion(api_version.to_string()))?;

    Ok(ApiResource::from_gvk(&GroupVersionKind::gvk(
        group, version, "Service",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_resource_from_group_version() {
        let resource = service_api_resource("serving.knative.dev/v1").unwrap();

        assert_eq!(resource.group, "serving.knative.dev");
        assert_eq!(resource.version, "v1");
        assert_eq!(resource.kind, "Service");
        assert_eq!(resource.plural, "services");
    }

    #[test]
    fn api_version_without_group_is_rejected() {
        assert!(service_api_resource("v1").is_err());
        assert!(service_api_resource("serving.knative.dev/").is_err());
        assert!(service_api_resource("/v1").is_err());
    }

    #[test]
    fn status_parses_conditions_and_url() {
        let status: ServiceStatus = serde_yaml::from_str(
            r#"
observedGeneration: 3
url: http://demo.apps.example.com
conditions:
- type: Ready
  status: "True"
  lastTransitionTime: "2024-05-01T10:00:00Z"
- type: RoutesReady
  status: "Unknown"
  reason: Reconciling
  message: working on it
"#,
        )
        .unwrap();

        assert_eq!(status.url.as_deref(), Some("http://demo.apps.example.com"));
        let conditions = status.conditions.unwrap();
        assert_eq!(conditions[0].type_, "Ready");
        assert_eq!(conditions[0].status, "True");
        assert_eq!(conditions[1].reason.as_deref(), Some("Reconciling"));
    }
}
