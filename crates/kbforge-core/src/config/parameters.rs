//! External parameters of a knowledge-base stack.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Named parameters supplied from outside the plan.
///
/// All three are required; an empty value fails the plan before any
/// descriptor is declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameters {
    /// ARN of the embedding model the knowledge base invokes.
    #[serde(default, alias = "embeddingModelArn")]
    pub embedding_model_arn: String,

    /// Connection endpoint of the external vector index.
    #[serde(default, alias = "pineconeEndpoint")]
    pub vector_endpoint: String,

    /// ARN of the secret holding the vector index credentials.
    #[serde(default, alias = "pineconeSecretArn")]
    pub secret_arn: String,
}

impl StackParameters {
    /// Parameters in the order they are validated.
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            ("embedding_model_arn", self.embedding_model_arn.as_str()),
            ("vector_endpoint", self.vector_endpoint.as_str()),
            ("secret_arn", self.secret_arn.as_str()),
        ]
    }

    /// Set a parameter by name. Accepts the snake_case names and the
    /// camelCase context keys.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        let slot = match key {
            "embedding_model_arn" | "embeddingModelArn" => &mut self.embedding_model_arn,
            "vector_endpoint" | "pineconeEndpoint" => &mut self.vector_endpoint,
            "secret_arn" | "pineconeSecretArn" => &mut self.secret_arn,
            _ => {
                return Err(ConfigError::Config(format!(
                    "unknown parameter '{}'",
                    key
                )));
            }
        };
        *slot = value.into();
        Ok(())
    }

    /// First parameter that is empty, if any.
    pub fn first_missing(&self) -> Option<&'static str> {
        self.entries()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_context_keys_are_accepted() {
        let mut params = StackParameters::default();
        params.set("embeddingModelArn", "arn:model").unwrap();
        params.set("vector_endpoint", "https://index").unwrap();
        assert_eq!(params.first_missing(), Some("secret_arn"));

        params.set("pineconeSecretArn", "arn:secret").unwrap();
        assert_eq!(params.first_missing(), None);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut params = StackParameters::default();
        assert!(matches!(
            params.set("region", "x"),
            Err(ConfigError::Config(_))
        ));
    }
}
