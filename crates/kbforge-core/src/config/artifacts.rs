//! Files operators are expected to upload after provisioning.

use serde::{Deserialize, Serialize};

/// Expected input artifacts and how to upload them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// File names expected in the storage bucket.
    #[serde(default)]
    pub files: Vec<String>,

    /// Local directory the files are uploaded from.
    #[serde(default = "default_local_dir")]
    pub local_dir: String,

    /// Copy command prefix.
    #[serde(default = "default_copy_tool")]
    pub copy_tool: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            local_dir: default_local_dir(),
            copy_tool: default_copy_tool(),
        }
    }
}

fn default_local_dir() -> String {
    "assets".to_string()
}

fn default_copy_tool() -> String {
    "aws s3 cp".to_string()
}
