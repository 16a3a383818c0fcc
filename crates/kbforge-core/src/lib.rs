//! Core types shared across the kbforge crates.
//!
//! A plan starts as a table of [`ResourceDescriptor`]s whose config fields may
//! hold [`Reference`]s to other descriptors. Nothing here talks to a cloud
//! provider; the types only describe what should exist.

pub mod attributes;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod schema;

pub use attributes::{AttributeTable, PredictionContext, ResourceAttributes};
pub use config::{ArtifactsConfig, ConfigError, StackConfig, StackParameters};
pub use descriptor::{
    Attribute, ConfigValue, Declarations, Reference, RemovalPolicy, ResolvedResource,
    ResourceConfig, ResourceDescriptor, ResourceKind,
};
pub use error::PlanError;
