//! Resource descriptors and the declaration table.
//!
//! A descriptor declares a desired cloud resource. Config fields hold either a
//! literal value or a [`Reference`] to an attribute of another descriptor that
//! will only be known once that descriptor is realized.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::attributes::ResourceAttributes;
use crate::config::ConfigError;
use crate::error::PlanError;
use crate::schema;

/// Kinds of resources a plan can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Storage,
    AccessRole,
    VectorKnowledgeBase,
    DataSource,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Storage => "storage",
            ResourceKind::AccessRole => "access_role",
            ResourceKind::VectorKnowledgeBase => "vector_knowledge_base",
            ResourceKind::DataSource => "data_source",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "storage" | "bucket" => Ok(ResourceKind::Storage),
            "accessrole" | "role" => Ok(ResourceKind::AccessRole),
            "vectorknowledgebase" | "knowledgebase" => Ok(ResourceKind::VectorKnowledgeBase),
            "datasource" => Ok(ResourceKind::DataSource),
            _ => Err(PlanError::schema(s, format!("unknown resource kind '{}'", s))),
        }
    }
}

/// Attribute of a realized resource that other descriptors can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Arn,
    Id,
    Endpoint,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Arn => write!(f, "arn"),
            Attribute::Id => write!(f, "id"),
            Attribute::Endpoint => write!(f, "endpoint"),
        }
    }
}

/// What happens to a resource when the stack is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Resource and its contents are removed.
    Destroy,
    /// Resource survives teardown.
    Retain,
}

/// Placeholder for an attribute of another descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    #[serde(rename = "ref")]
    pub target: String,
    pub attribute: Attribute,
}

impl Reference {
    pub fn new(target: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            target: target.into(),
            attribute,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

/// A config field value: a literal or a reference, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Reference(Reference),
    Literal(serde_json::Value),
}

impl ConfigValue {
    pub fn reference(target: impl Into<String>, attribute: Attribute) -> Self {
        ConfigValue::Reference(Reference::new(target, attribute))
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            ConfigValue::Reference(r) => Some(r),
            ConfigValue::Literal(_) => None,
        }
    }

    pub fn as_literal_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Literal(v) => v.as_str(),
            ConfigValue::Reference(_) => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Literal(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Literal(serde_json::Value::String(value))
    }
}

impl From<Reference> for ConfigValue {
    fn from(value: Reference) -> Self {
        ConfigValue::Reference(value)
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        ConfigValue::Literal(value)
    }
}

/// Field name to value mapping of a descriptor.
pub type ResourceConfig = BTreeMap<String, ConfigValue>;

/// Declared, not-yet-resolved specification of a desired resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: String,
    pub kind: ResourceKind,
    pub config: ResourceConfig,
    pub removal_policy: RemovalPolicy,
    /// Extra ordering edges that do not appear as config references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceDescriptor {
    pub fn field(&self, name: &str) -> Option<&ConfigValue> {
        self.config.get(name)
    }

    pub fn literal_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(ConfigValue::as_literal_str)
    }

    /// References held by this descriptor's config, in field order.
    pub fn references(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.config
            .iter()
            .filter_map(|(name, value)| value.as_reference().map(|r| (name.as_str(), r)))
    }

    /// Does any config field reference `target`?
    pub fn references_target(&self, target: &str) -> bool {
        self.references().any(|(_, r)| r.target == target)
    }

    /// Ids this descriptor must be realized after, without duplicates.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        let targets = self
            .references()
            .map(|(_, r)| r.target.as_str())
            .chain(self.depends_on.iter().map(String::as_str));
        for target in targets {
            if !deps.contains(&target) {
                deps.push(target);
            }
        }
        deps
    }
}

/// A descriptor whose references have all been replaced by literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedResource {
    pub id: String,
    pub kind: ResourceKind,
    pub config: BTreeMap<String, serde_json::Value>,
    pub removal_policy: RemovalPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Attributes exposed by the realized resource.
    #[serde(default)]
    pub attributes: ResourceAttributes,
}

impl ResolvedResource {
    pub fn config_str(&self, name: &str) -> Option<&str> {
        self.config.get(name).and_then(|v| v.as_str())
    }
}

/// The declaration table of a plan.
///
/// Descriptors keep their declaration order, which breaks ties during
/// resolution and scoping.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    descriptors: Vec<ResourceDescriptor>,
    index: HashMap<String, usize>,
}

/// On-disk form of a single declaration.
#[derive(Debug, Deserialize)]
struct RawDeclaration {
    id: String,
    kind: String,
    removal_policy: RemovalPolicy,
    #[serde(default)]
    config: ResourceConfig,
    #[serde(default)]
    depends_on: Vec<String>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor after checking its config against the kind's schema.
    ///
    /// Nothing is created externally; the descriptor only enters this table.
    pub fn declare(
        &mut self,
        id: impl Into<String>,
        kind: ResourceKind,
        config: ResourceConfig,
        removal_policy: RemovalPolicy,
    ) -> Result<String, PlanError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PlanError::schema(id, "descriptor id must not be empty"));
        }
        if self.index.contains_key(&id) {
            return Err(PlanError::Conflict { id });
        }
        schema::check_config(&id, kind, &config)?;

        tracing::debug!(id = %id, kind = %kind, "declared descriptor");

        self.index.insert(id.clone(), self.descriptors.len());
        self.descriptors.push(ResourceDescriptor {
            id: id.clone(),
            kind,
            config,
            removal_policy,
            depends_on: Vec::new(),
        });
        Ok(id)
    }

    /// Add an explicit ordering edge: `id` is realized after `target`.
    pub fn add_dependency(&mut self, id: &str, target: &str) -> Result<(), PlanError> {
        let descriptor = self.get_mut(id)?;
        if !descriptor.depends_on.iter().any(|d| d == target) {
            descriptor.depends_on.push(target.to_string());
        }
        Ok(())
    }

    /// Set a computed field, such as the grants derived for an access role.
    pub fn annotate(
        &mut self,
        id: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), PlanError> {
        let descriptor = self.get_mut(id)?;
        if !schema::is_computed_field(descriptor.kind, field) {
            return Err(PlanError::schema(
                id,
                format!("field '{}' is not a computed field of {}", field, descriptor.kind),
            ));
        }
        descriptor
            .config
            .insert(field.to_string(), ConfigValue::Literal(value));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.index.get(id).map(|&i| &self.descriptors[i])
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut ResourceDescriptor, PlanError> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.descriptors[i]),
            None => Err(PlanError::unresolved(id, id)),
        }
    }

    /// Declaration position of `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.iter()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.iter().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Check that every reference and explicit dependency targets a declared
    /// descriptor exposing the referenced attribute.
    pub fn validate(&self) -> Result<(), PlanError> {
        for descriptor in &self.descriptors {
            for (field, reference) in descriptor.references() {
                let Some(target) = self.get(&reference.target) else {
                    return Err(PlanError::unresolved(&descriptor.id, &reference.target));
                };
                if !schema::exposed_attributes(target.kind).contains(&reference.attribute) {
                    return Err(PlanError::schema(
                        &descriptor.id,
                        format!(
                            "field '{}' references {}, but {} does not expose '{}'",
                            field, reference, target.kind, reference.attribute
                        ),
                    ));
                }
            }
            for target in &descriptor.depends_on {
                if !self.index.contains_key(target) {
                    return Err(PlanError::unresolved(&descriptor.id, target));
                }
            }
        }
        Ok(())
    }

    /// Load declarations from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML list of declarations.
    ///
    /// ```yaml
    /// - id: bucket
    ///   kind: storage
    ///   removal_policy: destroy
    ///   config:
    ///     bucket_name: docs-123
    /// - id: source
    ///   kind: data_source
    ///   removal_policy: retain
    ///   config:
    ///     bucket_arn: { ref: bucket, attribute: arn }
    /// ```
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: Vec<RawDeclaration> = serde_yaml::from_str(content)?;
        let mut declarations = Self::new();
        for entry in raw {
            let kind: ResourceKind = entry.kind.parse().map_err(|e| match e {
                PlanError::Schema { message, .. } => PlanError::schema(&entry.id, message),
                other => other,
            })?;
            let id = declarations.declare(entry.id, kind, entry.config, entry.removal_policy)?;
            for target in &entry.depends_on {
                declarations.add_dependency(&id, target)?;
            }
        }
        Ok(declarations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_config(name: &str) -> ResourceConfig {
        ResourceConfig::from([("bucket_name".to_string(), ConfigValue::from(name))])
    }

    #[test]
    fn duplicate_id_is_a_conflict_regardless_of_kind() {
        let mut decls = Declarations::new();
        decls
            .declare("docs", ResourceKind::Storage, bucket_config("a"), RemovalPolicy::Destroy)
            .unwrap();

        let err = decls
            .declare(
                "docs",
                ResourceKind::AccessRole,
                ResourceConfig::from([
                    ("role_name".to_string(), ConfigValue::from("r")),
                    ("assumed_by".to_string(), ConfigValue::from("svc")),
                ]),
                RemovalPolicy::Retain,
            )
            .unwrap_err();
        assert_eq!(err, PlanError::Conflict { id: "docs".to_string() });
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn unknown_kind_is_a_schema_error() {
        let err = "queue".parse::<ResourceKind>().unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert_eq!(
            "VectorKnowledgeBase".parse::<ResourceKind>().unwrap(),
            ResourceKind::VectorKnowledgeBase
        );
        assert_eq!("data-source".parse::<ResourceKind>().unwrap(), ResourceKind::DataSource);
    }

    #[test]
    fn dangling_reference_fails_validation() {
        let mut decls = Declarations::new();
        decls
            .declare(
                "source",
                ResourceKind::DataSource,
                ResourceConfig::from([
                    ("name".to_string(), ConfigValue::from("src")),
                    ("knowledge_base_id".to_string(), ConfigValue::from("kb-1")),
                    ("bucket_arn".to_string(), ConfigValue::reference("ghost", Attribute::Arn)),
                ]),
                RemovalPolicy::Destroy,
            )
            .unwrap();

        assert_eq!(
            decls.validate().unwrap_err(),
            PlanError::unresolved("source", "ghost")
        );
    }

    #[test]
    fn reference_to_unexposed_attribute_fails_validation() {
        let mut decls = Declarations::new();
        decls
            .declare(
                "role",
                ResourceKind::AccessRole,
                ResourceConfig::from([
                    ("role_name".to_string(), ConfigValue::from("r")),
                    ("assumed_by".to_string(), ConfigValue::from("svc")),
                ]),
                RemovalPolicy::Destroy,
            )
            .unwrap();
        decls
            .declare(
                "source",
                ResourceKind::DataSource,
                ResourceConfig::from([
                    ("name".to_string(), ConfigValue::from("src")),
                    ("knowledge_base_id".to_string(), ConfigValue::from("kb-1")),
                    ("bucket_arn".to_string(), ConfigValue::reference("role", Attribute::Endpoint)),
                ]),
                RemovalPolicy::Destroy,
            )
            .unwrap();

        let err = decls.validate().unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("does not expose 'endpoint'"));
    }

    #[test]
    fn dependencies_merge_references_and_explicit_edges() {
        let mut decls = Declarations::new();
        decls
            .declare("bucket", ResourceKind::Storage, bucket_config("b"), RemovalPolicy::Destroy)
            .unwrap();
        decls
            .declare(
                "source",
                ResourceKind::DataSource,
                ResourceConfig::from([
                    ("name".to_string(), ConfigValue::from("src")),
                    ("knowledge_base_id".to_string(), ConfigValue::from("kb-1")),
                    ("bucket_arn".to_string(), ConfigValue::reference("bucket", Attribute::Arn)),
                ]),
                RemovalPolicy::Destroy,
            )
            .unwrap();
        decls.add_dependency("source", "bucket").unwrap();

        let source = decls.get("source").unwrap();
        assert_eq!(source.dependencies(), vec!["bucket"]);
        assert!(source.references_target("bucket"));
    }

    #[test]
    fn loads_declarations_from_yaml() {
        let yaml = r#"
- id: bucket
  kind: storage
  removal_policy: destroy
  config:
    bucket_name: docs-123
- id: source
  kind: DataSource
  removal_policy: retain
  config:
    name: docs-source
    knowledge_base_id: kb-external
    bucket_arn: { ref: bucket, attribute: arn }
"#;
        let decls = Declarations::from_yaml(yaml).unwrap();
        assert_eq!(decls.len(), 2);

        let source = decls.get("source").unwrap();
        assert_eq!(source.kind, ResourceKind::DataSource);
        assert_eq!(source.removal_policy, RemovalPolicy::Retain);
        assert_eq!(
            source.field("bucket_arn"),
            Some(&ConfigValue::reference("bucket", Attribute::Arn))
        );
        assert_eq!(source.literal_str("knowledge_base_id"), Some("kb-external"));
    }

    #[test]
    fn misspelled_reference_attribute_is_named() {
        let yaml = r#"
- id: bucket
  kind: storage
  removal_policy: destroy
  config:
    bucket_name: docs-123
- id: source
  kind: data_source
  removal_policy: retain
  config:
    name: docs-source
    knowledge_base_id: kb-external
    bucket_arn: { ref: bucket, attribute: ARN }
"#;
        let err = Declarations::from_yaml(yaml).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'source'"), "{}", message);
        assert!(message.contains("bucket_arn"), "{}", message);
        assert!(message.contains("ARN"), "{}", message);
    }

    #[test]
    fn reference_with_extra_keys_is_rejected() {
        let yaml = r#"
- id: bucket
  kind: storage
  removal_policy: destroy
  config:
    bucket_name: docs-123
- id: source
  kind: data_source
  removal_policy: retain
  config:
    name: docs-source
    knowledge_base_id: kb-external
    bucket_arn: { ref: bucket, attribute: arn, note: primary }
"#;
        let err = Declarations::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("note"), "{}", err);
    }

    #[test]
    fn yaml_without_removal_policy_is_rejected() {
        let yaml = r#"
- id: bucket
  kind: storage
  config:
    bucket_name: docs-123
"#;
        assert!(matches!(
            Declarations::from_yaml(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn annotate_only_accepts_computed_fields() {
        let mut decls = Declarations::new();
        decls
            .declare(
                "role",
                ResourceKind::AccessRole,
                ResourceConfig::from([
                    ("role_name".to_string(), ConfigValue::from("r")),
                    ("assumed_by".to_string(), ConfigValue::from("svc")),
                ]),
                RemovalPolicy::Destroy,
            )
            .unwrap();

        decls
            .annotate("role", "grants", serde_json::json!({"Statement": []}))
            .unwrap();
        assert!(decls.annotate("role", "role_name", serde_json::json!("x")).is_err());
    }
}
