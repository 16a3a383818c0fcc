//! Provider policy documents.

use serde::{Deserialize, Serialize};

use crate::grant::{GrantAction, PermissionGrant};

const POLICY_VERSION: &str = "2012-10-17";

/// One allow statement of an inline policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Effect")]
    pub effect: String,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource")]
    pub resources: Vec<String>,
}

/// Inline policy attached to an access role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    /// Render grants as allow statements. Grants with the same action set
    /// share a statement; statement order follows the grants.
    pub fn from_grants(grants: &[PermissionGrant]) -> Self {
        let mut groups: Vec<(&[GrantAction], Vec<String>)> = Vec::new();
        for grant in grants {
            match groups
                .iter_mut()
                .find(|(actions, _)| *actions == grant.actions.as_slice())
            {
                Some((_, resources)) => resources.push(grant.resource_pattern.clone()),
                None => groups.push((
                    grant.actions.as_slice(),
                    vec![grant.resource_pattern.clone()],
                )),
            }
        }

        let statements = groups
            .into_iter()
            .map(|(actions, resources)| PolicyStatement {
                effect: "Allow".to_string(),
                actions: actions
                    .iter()
                    .map(|a| a.provider_action().to_string())
                    .collect(),
                resources,
            })
            .collect();

        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn statements_group_identical_action_sets() {
        let grants = vec![
            PermissionGrant {
                resource_pattern: "arn:secret:a".to_string(),
                actions: vec![GrantAction::ReadSecret],
            },
            PermissionGrant {
                resource_pattern: "arn:aws:s3:::docs".to_string(),
                actions: vec![GrantAction::List],
            },
            PermissionGrant {
                resource_pattern: "arn:secret:b".to_string(),
                actions: vec![GrantAction::ReadSecret],
            },
        ];

        let doc = PolicyDocument::from_grants(&grants);
        assert_eq!(
            doc.to_value(),
            json!({
                "Version": "2012-10-17",
                "Statement": [
                    {
                        "Effect": "Allow",
                        "Action": ["secretsmanager:GetSecretValue"],
                        "Resource": ["arn:secret:a", "arn:secret:b"]
                    },
                    {
                        "Effect": "Allow",
                        "Action": ["s3:ListBucket"],
                        "Resource": ["arn:aws:s3:::docs"]
                    }
                ]
            })
        );
    }

    #[test]
    fn no_grants_renders_empty_statement_list() {
        let doc = PolicyDocument::from_grants(&[]);
        assert!(doc.statements.is_empty());
        assert_eq!(doc.version, "2012-10-17");
    }
}
