//! Request and response payloads of the public API

use std::collections::BTreeMap;

use applift_kube::LogEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateImageRequest {
    /// Location of the application sources to build
    pub sources: String,

    /// Runtime id; the configured default applies when absent
    #[serde(default)]
    pub runtime: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateImageResponse {
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    /// Environment passed to the application container
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CreateDeploymentResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct GetApplicationLogsResponse {
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_request_runtime_is_optional() {
        let request: CreateImageRequest =
            serde_json::from_str(r#"{"sources": "files/demo"}"#).unwrap();

        assert_eq!(request.sources, "files/demo");
        assert!(request.runtime.is_none());
    }

    #[test]
    fn deployment_request_env_defaults_to_empty() {
        let request: CreateDeploymentRequest = serde_json::from_str("{}").unwrap();

        assert!(request.env.is_empty());
    }
}
