//! Operator-facing outputs.
//!
//! After provisioning, operators upload the expected source documents into
//! the storage bucket. One directive is emitted per expected file.

use serde::{Deserialize, Serialize};

use kbforge_core::{ArtifactsConfig, PlanError, ResolvedResource, ResourceKind};

const UPLOAD_DESCRIPTION: &str = "Command to upload a file to the storage bucket";

/// A human-readable post-provisioning instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDirective {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Files expected in a storage resource once it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUploads {
    pub storage_id: String,
    pub files: Vec<String>,
    pub local_dir: String,
    pub copy_tool: String,
}

impl ArtifactUploads {
    pub fn from_config(storage_id: impl Into<String>, artifacts: &ArtifactsConfig) -> Self {
        Self {
            storage_id: storage_id.into(),
            files: artifacts.files.clone(),
            local_dir: artifacts.local_dir.clone(),
            copy_tool: artifacts.copy_tool.clone(),
        }
    }

    /// One upload command per file, targeting the resolved bucket.
    ///
    /// Each command names the bucket exactly once; a file name, local
    /// directory or copy tool that repeats the bucket name is rejected.
    pub fn directives(
        &self,
        resources: &[ResolvedResource],
    ) -> Result<Vec<OutputDirective>, PlanError> {
        let storage = resources
            .iter()
            .find(|r| r.id == self.storage_id)
            .ok_or_else(|| PlanError::unresolved("outputs", &self.storage_id))?;
        if storage.kind != ResourceKind::Storage {
            return Err(PlanError::schema(
                &self.storage_id,
                format!("upload target must be storage, found {}", storage.kind),
            ));
        }
        let bucket = storage
            .attributes
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlanError::incomplete(&self.storage_id, "id"))?;

        self.files
            .iter()
            .map(|file| {
                let value = format!(
                    "{} {} s3://{}/{}",
                    self.copy_tool,
                    self.local_path(file),
                    bucket,
                    file
                );
                if value.matches(bucket).count() != 1 {
                    return Err(PlanError::schema(
                        &self.storage_id,
                        format!(
                            "upload command for '{}' must name bucket '{}' exactly once",
                            file, bucket
                        ),
                    ));
                }
                Ok(OutputDirective {
                    label: format!("UploadCommand_{}", file),
                    value,
                    description: UPLOAD_DESCRIPTION.to_string(),
                })
            })
            .collect()
    }

    fn local_path(&self, file: &str) -> String {
        let dir = self.local_dir.trim_end_matches('/');
        if dir.is_empty() {
            file.to_string()
        } else {
            format!("{}/{}", dir, file)
        }
    }
}
