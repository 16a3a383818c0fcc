//! Stack configuration for kbforge.
//!
//! A stack file (`kbforge.yaml` by convention) names the stack, the account
//! it targets, the external parameters the knowledge base needs and the
//! artifacts operators upload once provisioning completes.
//!
//! ```yaml
//! tag: kb-izakaya
//! account: "123456789012"
//! region: us-east-1
//! removal_policy: destroy
//! parameters:
//!   embedding_model_arn: arn:aws:bedrock:us-east-1::foundation-model/amazon.titan-embed-text-v1
//!   vector_endpoint: https://index-abc.svc.pinecone.io
//!   secret_arn: arn:aws:secretsmanager:us-east-1:123456789012:secret:pinecone
//! artifacts:
//!   files: [izakaya_menu.txt, izakaya_guidance.pdf]
//! ```

pub mod artifacts;
pub mod parameters;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::attributes::{PredictionContext, ResourceAttributes};
use crate::descriptor::RemovalPolicy;
use crate::error::PlanError;

pub use artifacts::ArtifactsConfig;
pub use parameters::StackParameters;

/// Complete stack configuration loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Name prefix for every resource in the stack.
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Target account id.
    #[serde(default)]
    pub account: String,

    /// Target region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Knowledge base description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// What happens to the storage bucket on teardown. Must be explicit.
    pub removal_policy: RemovalPolicy,

    /// External parameters.
    #[serde(default)]
    pub parameters: StackParameters,

    /// Expected upload artifacts.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Known attributes of descriptors, keyed by descriptor id. These take
    /// precedence over synthetic identifiers in dry runs.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub overrides: HashMap<String, ResourceAttributes>,

    /// Optional file of raw declarations used instead of the built-in
    /// knowledge-base template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_file: Option<PathBuf>,
}

fn default_tag() -> String {
    "kb-izakaya".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl StackConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve `resources_file` relative to the
    /// config file's directory.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(resources_file) = &config.resources_file
            && !resources_file.is_absolute()
        {
            config.resources_file = Some(base_dir.join(resources_file));
        }

        Ok(config)
    }

    /// Apply a `key=value` override, as passed with `--set`.
    pub fn apply_override(&mut self, assignment: &str) -> Result<(), ConfigError> {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(ConfigError::Config(format!(
                "expected key=value, got '{}'",
                assignment
            )));
        };
        let value = value.trim().to_string();
        match key.trim() {
            "tag" => self.tag = value,
            "account" => self.account = value,
            "region" => self.region = Some(value),
            "description" => self.description = Some(value),
            other => self.parameters.set(other, value)?,
        }
        Ok(())
    }

    /// Check that every required external parameter is present.
    ///
    /// Runs before declaration so a missing parameter fails the whole plan.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.tag.trim().is_empty() {
            return Err(PlanError::incomplete("stack", "tag"));
        }
        if self.account.trim().is_empty() {
            return Err(PlanError::incomplete("stack", "account"));
        }
        if let Some(missing) = self.parameters.first_missing() {
            return Err(PlanError::incomplete("stack", missing));
        }
        Ok(())
    }

    pub fn bucket_name(&self) -> String {
        format!("{}-{}", self.tag, self.account)
    }

    pub fn role_name(&self) -> String {
        format!("{}_role", self.tag)
    }

    pub fn prediction_context(&self) -> PredictionContext {
        let account = Some(self.account.clone()).filter(|a| !a.trim().is_empty());
        PredictionContext::new(account, self.region.clone())
    }
}
