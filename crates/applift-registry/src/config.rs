//! Registry configuration and image-name derivation

use serde::Deserialize;

/// Configuration of the registry that build jobs push to
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistryConfig {
    /// Registry host, e.g. `registry.example.com:5000`
    pub host: String,

    /// Scheme used for registry API calls
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Repository name template; `{name}` is replaced with the logical
    /// application name, e.g. `dial/applications/{name}`
    pub image_name_format: String,

    /// Tag applied to every built image
    pub image_label: String,
}

fn default_protocol() -> String {
    "https".to_string()
}

impl RegistryConfig {
    /// Repository name of the image for a logical application.
    pub fn image_name(&self, name: &str) -> String {
        self.image_name_format.replace("{name}", name)
    }

    /// Fully qualified image reference, `<host>/<repository>:<label>`.
    pub fn full_image_ref(&self, name: &str) -> String {
        format!("{}/{}:{}", self.host, self.image_name(name), self.image_label)
    }

    /// Manifest endpoint URL for a repository and reference (tag or digest).
    pub(crate) fn manifest_url(&self, image: &str, reference: &str) -> String {
        format!(
            "{}://{}/v2/{}/manifests/{}",
            self.protocol, self.host, image, reference
        )
    }
}
