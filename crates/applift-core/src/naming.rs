//! Deterministic cluster resource names
//!
//! Every resource managed for a logical application is named as
//! `app-ctrl-<kind>-<name>`, so lookups and deletes can be repeated without
//! any stored state.

const NAME_PREFIX: &str = "app-ctrl";

/// Name of the secret holding the application's DIAL credentials.
pub fn dial_auth_secret_name(name: &str) -> String {
    kube_name("dial-auth", name)
}

/// Name of the image build job.
pub fn build_job_name(name: &str) -> String {
    kube_name("build", name)
}

/// Name of the deployed application service.
pub fn app_name(name: &str) -> String {
    kube_name("app", name)
}

fn kube_name(kind: &str, name: &str) -> String {
    format!("{NAME_PREFIX}-{kind}-{name}")
}
