//! Registry HTTP client
//!
//! Digest lookup is a metadata-only HEAD request against the manifest
//! endpoint. Registries differ in which manifest media type they serve for
//! a tag, so the lookup probes the OCI media type first and falls back to
//! the Docker distribution media type when the first probe reports 404.

use reqwest::StatusCode;
use reqwest::header::ACCEPT;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Client for the registry's manifest API
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Registry configuration backing this client.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Look up the manifest digest for an application's image tag.
    ///
    /// Returns `Ok(None)` when the image is not present under either
    /// manifest media type.
    pub async fn get_digest(&self, name: &str) -> Result<Option<String>> {
        match self.get_digest_as(OCI_MANIFEST, name).await? {
            Some(digest) => Ok(Some(digest)),
            None => self.get_digest_as(DOCKER_MANIFEST, name).await,
        }
    }

    async fn get_digest_as(&self, media_type: &str, name: &str) -> Result<Option<String>> {
        let image = self.config.image_name(name);
        let url = self.config.manifest_url(&image, &self.config.image_label);
        tracing::info!(image, media_type, "retrieving manifest digest");

        let response = self
            .http
            .head(&url)
            .header(ACCEPT, media_type)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RegistryError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let digest = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|digest| !digest.trim().is_empty())
            .ok_or_else(|| RegistryError::MissingDigest {
                media_type: media_type.to_string(),
            })?;

        tracing::info!(image, digest, "retrieved manifest digest");
        Ok(Some(digest.to_string()))
    }

    /// Delete the manifest identified by `digest`.
    ///
    /// Returns whether a manifest was actually removed; 404 is a no-op.
    pub async fn delete_manifest(&self, name: &str, digest: &str) -> Result<bool> {
        let image = self.config.image_name(name);
        let url = self.config.manifest_url(&image, digest);
        tracing::info!(image, digest, "deleting manifest");

        let response = self.http.delete(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(RegistryError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        tracing::info!(image, digest, "deleted manifest");
        Ok(true)
    }
}
