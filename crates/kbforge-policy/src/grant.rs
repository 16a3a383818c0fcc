//! Permission grants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Actions a role can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantAction {
    ReadSecret,
    InvokeModel,
    List,
    ReadObject,
}

impl GrantAction {
    /// Provider-neutral action name.
    pub fn label(&self) -> &'static str {
        match self {
            GrantAction::ReadSecret => "read-secret",
            GrantAction::InvokeModel => "invoke-model",
            GrantAction::List => "list",
            GrantAction::ReadObject => "read-object",
        }
    }

    /// Action name understood by the provider's policy language.
    pub fn provider_action(&self) -> &'static str {
        match self {
            GrantAction::ReadSecret => "secretsmanager:GetSecretValue",
            GrantAction::InvokeModel => "bedrock:InvokeModel",
            GrantAction::List => "s3:ListBucket",
            GrantAction::ReadObject => "s3:GetObject",
        }
    }
}

impl fmt::Display for GrantAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Actions allowed on one resource pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub resource_pattern: String,
    pub actions: Vec<GrantAction>,
}

/// Grants deduplicated by (pattern, action), in first-discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    grants: Vec<PermissionGrant>,
}

impl GrantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `action` on `pattern`. Returns false if it was already granted.
    pub fn add(&mut self, pattern: impl Into<String>, action: GrantAction) -> bool {
        let pattern = pattern.into();
        match self.grants.iter_mut().find(|g| g.resource_pattern == pattern) {
            Some(grant) if grant.actions.contains(&action) => false,
            Some(grant) => {
                grant.actions.push(action);
                true
            }
            None => {
                self.grants.push(PermissionGrant {
                    resource_pattern: pattern,
                    actions: vec![action],
                });
                true
            }
        }
    }

    /// Every (pattern, action) pair, in discovery order.
    pub fn pairs(&self) -> Vec<(&str, GrantAction)> {
        self.grants
            .iter()
            .flat_map(|g| {
                g.actions
                    .iter()
                    .map(move |a| (g.resource_pattern.as_str(), *a))
            })
            .collect()
    }

    pub fn grants(&self) -> &[PermissionGrant] {
        &self.grants
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_pairs_are_dropped_and_order_kept() {
        let mut set = GrantSet::new();
        assert!(set.add("arn:b", GrantAction::List));
        assert!(set.add("arn:a", GrantAction::ReadSecret));
        assert!(!set.add("arn:b", GrantAction::List));
        assert!(set.add("arn:b", GrantAction::ReadObject));

        assert_eq!(
            set.pairs(),
            vec![
                ("arn:b", GrantAction::List),
                ("arn:b", GrantAction::ReadObject),
                ("arn:a", GrantAction::ReadSecret),
            ]
        );
    }
}
