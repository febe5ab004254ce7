//! Applift Registry - container registry integration
//!
//! This crate talks to the Docker Registry HTTP API (v2) on behalf of the
//! build pipeline:
//! - digest lookup with media-type negotiation (OCI first, then Docker
//!   distribution)
//! - manifest deletion by digest
//! - pure image-name derivation shared with the manifest factory

pub mod client;
pub mod config;
pub mod error;

pub use client::RegistryClient;
pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
