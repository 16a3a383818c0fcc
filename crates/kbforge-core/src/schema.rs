//! Per-kind config schemas.
//!
//! Each resource kind accepts a fixed set of fields. Some fields accept
//! references, and some are computed by the planner and never declared.

use crate::descriptor::{Attribute, ConfigValue, Reference, ResourceConfig, ResourceKind};
use crate::error::PlanError;

/// JSON type a literal field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Mapping,
}

/// Description of one config field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub accepts_reference: bool,
    /// Filled in by the planner; declaring it is a schema error.
    pub computed: bool,
}

const fn text(name: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Text,
        required,
        accepts_reference: false,
        computed: false,
    }
}

const fn text_or_ref(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Text,
        required: true,
        accepts_reference: true,
        computed: false,
    }
}

const fn computed_mapping(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Mapping,
        required: false,
        accepts_reference: false,
        computed: true,
    }
}

const STORAGE_FIELDS: &[FieldSpec] = &[text("bucket_name", true)];

const ACCESS_ROLE_FIELDS: &[FieldSpec] = &[
    text("role_name", true),
    text("assumed_by", true),
    text("policy_name", false),
    computed_mapping("grants"),
];

const KNOWLEDGE_BASE_FIELDS: &[FieldSpec] = &[
    text("name", true),
    text_or_ref("role_arn"),
    text_or_ref("embedding_model_arn"),
    text("storage_type", true),
    text("connection_string", true),
    text_or_ref("credentials_secret_arn"),
    text("metadata_field", false),
    text("text_field", false),
    text("description", false),
];

const DATA_SOURCE_FIELDS: &[FieldSpec] = &[
    text("name", true),
    text_or_ref("knowledge_base_id"),
    text_or_ref("bucket_arn"),
    text("source_type", false),
];

/// Fields accepted by `kind`.
pub fn fields(kind: ResourceKind) -> &'static [FieldSpec] {
    match kind {
        ResourceKind::Storage => STORAGE_FIELDS,
        ResourceKind::AccessRole => ACCESS_ROLE_FIELDS,
        ResourceKind::VectorKnowledgeBase => KNOWLEDGE_BASE_FIELDS,
        ResourceKind::DataSource => DATA_SOURCE_FIELDS,
    }
}

/// Attributes a realized resource of `kind` exposes to references.
pub fn exposed_attributes(kind: ResourceKind) -> &'static [Attribute] {
    match kind {
        ResourceKind::Storage => &[Attribute::Arn, Attribute::Id, Attribute::Endpoint],
        ResourceKind::AccessRole => &[Attribute::Arn, Attribute::Id],
        ResourceKind::VectorKnowledgeBase => &[Attribute::Arn, Attribute::Id],
        ResourceKind::DataSource => &[Attribute::Id],
    }
}

pub fn is_computed_field(kind: ResourceKind, field: &str) -> bool {
    fields(kind).iter().any(|f| f.name == field && f.computed)
}

/// Type-check a declared config against the kind's schema.
pub fn check_config(
    id: &str,
    kind: ResourceKind,
    config: &ResourceConfig,
) -> Result<(), PlanError> {
    let specs = fields(kind);

    for (name, value) in config {
        let Some(spec) = specs.iter().find(|f| f.name == name) else {
            return Err(PlanError::schema(
                id,
                format!("unknown field '{}' for {}", name, kind),
            ));
        };
        if spec.computed {
            return Err(PlanError::schema(
                id,
                format!("field '{}' is computed and cannot be declared", name),
            ));
        }
        match value {
            ConfigValue::Reference(reference) => {
                if !spec.accepts_reference {
                    return Err(PlanError::schema(
                        id,
                        format!("field '{}' does not accept a reference ({})", name, reference),
                    ));
                }
            }
            // A mapping with a `ref` key that did not parse as a reference.
            ConfigValue::Literal(literal) if literal.get("ref").is_some() => {
                let err = serde_json::from_value::<Reference>(literal.clone())
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                return Err(PlanError::schema(
                    id,
                    format!("field '{}' holds a malformed reference: {}", name, err),
                ));
            }
            ConfigValue::Literal(literal) => {
                let ok = match spec.field_type {
                    FieldType::Text => literal.is_string(),
                    FieldType::Mapping => literal.is_object(),
                };
                if !ok {
                    return Err(PlanError::schema(
                        id,
                        format!(
                            "field '{}' expects {}, got {}",
                            name,
                            match spec.field_type {
                                FieldType::Text => "a string",
                                FieldType::Mapping => "a mapping",
                            },
                            literal
                        ),
                    ));
                }
            }
        }
    }

    if let Some(missing) = specs
        .iter()
        .find(|f| f.required && !config.contains_key(f.name))
    {
        return Err(PlanError::schema(
            id,
            format!("missing required field '{}' for {}", missing.name, kind),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(entries: &[(&str, ConfigValue)]) -> ResourceConfig {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn storage_requires_bucket_name() {
        let err = check_config("s", ResourceKind::Storage, &ResourceConfig::new()).unwrap_err();
        assert!(err.to_string().contains("missing required field 'bucket_name'"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let cfg = config(&[
            ("bucket_name", ConfigValue::from("b")),
            ("versioned", ConfigValue::from("yes")),
        ]);
        let err = check_config("s", ResourceKind::Storage, &cfg).unwrap_err();
        assert!(err.to_string().contains("unknown field 'versioned'"));
    }

    #[test]
    fn literal_type_mismatch_is_rejected() {
        let cfg = config(&[("bucket_name", ConfigValue::Literal(json!(42)))]);
        let err = check_config("s", ResourceKind::Storage, &cfg).unwrap_err();
        assert!(err.to_string().contains("expects a string"));
    }

    #[test]
    fn reference_only_where_accepted() {
        let cfg = config(&[("bucket_name", ConfigValue::reference("x", Attribute::Id))]);
        let err = check_config("s", ResourceKind::Storage, &cfg).unwrap_err();
        assert!(err.to_string().contains("does not accept a reference"));

        let cfg = config(&[
            ("name", ConfigValue::from("src")),
            ("knowledge_base_id", ConfigValue::reference("kb", Attribute::Id)),
            ("bucket_arn", ConfigValue::reference("bucket", Attribute::Arn)),
        ]);
        assert!(check_config("d", ResourceKind::DataSource, &cfg).is_ok());
    }

    #[test]
    fn malformed_reference_names_the_attribute() {
        let value: ConfigValue =
            serde_json::from_value(json!({"ref": "bucket", "attribute": "ARN"})).unwrap();
        assert!(matches!(value, ConfigValue::Literal(_)));

        let cfg = config(&[
            ("name", ConfigValue::from("src")),
            ("knowledge_base_id", ConfigValue::from("kb-1")),
            ("bucket_arn", value),
        ]);
        let err = check_config("d", ResourceKind::DataSource, &cfg).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("field 'bucket_arn' holds a malformed reference"));
        assert!(message.contains("ARN"), "{}", message);
    }

    #[test]
    fn reference_with_unknown_key_is_malformed() {
        let value: ConfigValue = serde_json::from_value(
            json!({"ref": "bucket", "attribute": "arn", "note": "primary"}),
        )
        .unwrap();
        let cfg = config(&[
            ("name", ConfigValue::from("src")),
            ("knowledge_base_id", ConfigValue::from("kb-1")),
            ("bucket_arn", value),
        ]);
        let err = check_config("d", ResourceKind::DataSource, &cfg).unwrap_err();
        assert!(err.to_string().contains("unknown field `note`"), "{}", err);
    }

    #[test]
    fn computed_grants_cannot_be_declared() {
        let cfg = config(&[
            ("role_name", ConfigValue::from("r")),
            ("assumed_by", ConfigValue::from("svc")),
            ("grants", ConfigValue::Literal(json!({"Statement": []}))),
        ]);
        let err = check_config("r", ResourceKind::AccessRole, &cfg).unwrap_err();
        assert!(err.to_string().contains("computed"));
        assert!(is_computed_field(ResourceKind::AccessRole, "grants"));
    }
}
