//! Applift Core - foundational utilities for the application controller
//!
//! This crate provides the pure building blocks shared by the pipelines:
//! - `mapping`: get-or-create navigation over cloned manifest trees
//! - `naming`: deterministic cluster resource names
//! - `text`: bounded log-tail truncation for error reporting

pub mod mapping;
pub mod naming;
pub mod text;

pub use mapping::{FieldSpec, ListChain, NamedItemSpec};
pub use text::truncate_tail;
