//! Attributes of realized resources.
//!
//! Attributes become known either when the provisioning backend creates a
//! resource, or ahead of time when they can be derived from declared literals
//! (a bucket's ARN follows from its name).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::descriptor::{Attribute, ResourceDescriptor, ResourceKind};

/// Identifiers exposed by a realized resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ResourceAttributes {
    pub fn get(&self, attribute: Attribute) -> Option<&str> {
        match attribute {
            Attribute::Arn => self.arn.as_deref(),
            Attribute::Id => self.id.as_deref(),
            Attribute::Endpoint => self.endpoint.as_deref(),
        }
    }

    pub fn with(mut self, attribute: Attribute, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match attribute {
            Attribute::Arn => self.arn = value,
            Attribute::Id => self.id = value,
            Attribute::Endpoint => self.endpoint = value,
        }
        self
    }

    /// Fill attributes missing here from `other`.
    pub fn or(mut self, other: &ResourceAttributes) -> Self {
        if self.arn.is_none() {
            self.arn = other.arn.clone();
        }
        if self.id.is_none() {
            self.id = other.id.clone();
        }
        if self.endpoint.is_none() {
            self.endpoint = other.endpoint.clone();
        }
        self
    }
}

/// Attributes of already-realized descriptors, keyed by descriptor id.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    entries: HashMap<String, ResourceAttributes>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, attributes: ResourceAttributes) {
        self.entries.insert(id.into(), attributes);
    }

    pub fn get(&self, id: &str) -> Option<&ResourceAttributes> {
        self.entries.get(id)
    }

    pub fn attribute(&self, id: &str, attribute: Attribute) -> Option<&str> {
        self.entries.get(id).and_then(|a| a.get(attribute))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

impl FromIterator<(String, ResourceAttributes)> for AttributeTable {
    fn from_iter<I: IntoIterator<Item = (String, ResourceAttributes)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Account context used to derive attributes before anything exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionContext {
    pub partition: String,
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Default for PredictionContext {
    fn default() -> Self {
        Self {
            partition: "aws".to_string(),
            account: None,
            region: None,
        }
    }
}

impl PredictionContext {
    pub fn new(account: Option<String>, region: Option<String>) -> Self {
        Self {
            account,
            region,
            ..Self::default()
        }
    }

    /// Derive `attribute` of `descriptor` from its declared literals.
    ///
    /// Returns `None` when the value is only known after creation.
    pub fn predict(&self, descriptor: &ResourceDescriptor, attribute: Attribute) -> Option<String> {
        match descriptor.kind {
            ResourceKind::Storage => {
                let name = non_empty(descriptor.literal_str("bucket_name"))?;
                Some(match attribute {
                    Attribute::Arn => format!("arn:{}:s3:::{}", self.partition, name),
                    Attribute::Id => name.to_string(),
                    Attribute::Endpoint => format!("s3://{}", name),
                })
            }
            ResourceKind::AccessRole => {
                let name = non_empty(descriptor.literal_str("role_name"))?;
                match attribute {
                    Attribute::Arn => {
                        let account = non_empty(self.account.as_deref())?;
                        Some(format!("arn:{}:iam::{}:role/{}", self.partition, account, name))
                    }
                    Attribute::Id => Some(name.to_string()),
                    Attribute::Endpoint => None,
                }
            }
            ResourceKind::VectorKnowledgeBase | ResourceKind::DataSource => None,
        }
    }

    /// All attributes of `descriptor` that can be predicted.
    pub fn predict_all(&self, descriptor: &ResourceDescriptor) -> ResourceAttributes {
        ResourceAttributes {
            arn: self.predict(descriptor, Attribute::Arn),
            id: self.predict(descriptor, Attribute::Id),
            endpoint: self.predict(descriptor, Attribute::Endpoint),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ConfigValue, RemovalPolicy, ResourceConfig};

    fn descriptor(kind: ResourceKind, fields: &[(&str, &str)]) -> ResourceDescriptor {
        ResourceDescriptor {
            id: "x".to_string(),
            kind,
            config: fields
                .iter()
                .map(|(k, v)| (k.to_string(), ConfigValue::from(*v)))
                .collect::<ResourceConfig>(),
            removal_policy: RemovalPolicy::Destroy,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn bucket_attributes_follow_from_name() {
        let ctx = PredictionContext::default();
        let bucket = descriptor(ResourceKind::Storage, &[("bucket_name", "kb-docs-123")]);

        let attrs = ctx.predict_all(&bucket);
        assert_eq!(attrs.arn.as_deref(), Some("arn:aws:s3:::kb-docs-123"));
        assert_eq!(attrs.id.as_deref(), Some("kb-docs-123"));
        assert_eq!(attrs.endpoint.as_deref(), Some("s3://kb-docs-123"));
    }

    #[test]
    fn role_arn_needs_an_account() {
        let role = descriptor(
            ResourceKind::AccessRole,
            &[("role_name", "kb_role"), ("assumed_by", "svc")],
        );

        assert_eq!(PredictionContext::default().predict(&role, Attribute::Arn), None);

        let ctx = PredictionContext::new(Some("123456789012".to_string()), None);
        assert_eq!(
            ctx.predict(&role, Attribute::Arn).as_deref(),
            Some("arn:aws:iam::123456789012:role/kb_role")
        );
    }

    #[test]
    fn empty_bucket_name_is_not_predictable() {
        let bucket = descriptor(ResourceKind::Storage, &[("bucket_name", "  ")]);
        assert_eq!(PredictionContext::default().predict(&bucket, Attribute::Arn), None);
    }

    #[test]
    fn overrides_take_precedence_when_merged() {
        let external = ResourceAttributes::default().with(Attribute::Arn, "arn:external");
        let predicted = ResourceAttributes::default()
            .with(Attribute::Arn, "arn:predicted")
            .with(Attribute::Id, "predicted-id");

        let merged = external.or(&predicted);
        assert_eq!(merged.get(Attribute::Arn), Some("arn:external"));
        assert_eq!(merged.get(Attribute::Id), Some("predicted-id"));
    }
}
