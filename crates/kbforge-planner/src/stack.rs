//! The knowledge-base stack template.
//!
//! Declares a document bucket, the role the knowledge base assumes, the
//! vector knowledge base itself and the data source binding the bucket to it.
//! All four carry the stack's `removal_policy`.

use kbforge_core::{
    Attribute, ConfigValue, Declarations, PlanError, ResourceConfig, ResourceKind, StackConfig,
};

pub const DATA_SOURCE_BUCKET: &str = "DataSourceBucket";
pub const KNOWLEDGE_BASE_ROLE: &str = "KnowledgeBaseRole";
pub const KNOWLEDGE_BASE: &str = "KnowledgeBase";
pub const DATA_SOURCE: &str = "BedrockKnowledgeBaseDataStore";

pub const SERVICE_PRINCIPAL: &str = "bedrock.amazonaws.com";
const POLICY_NAME: &str = "inlinePolicy1";
const VECTOR_STORE: &str = "PINECONE";
const SOURCE_TYPE: &str = "S3";

fn config<const N: usize>(entries: [(&str, ConfigValue); N]) -> ResourceConfig {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Declare the four resources of a knowledge-base stack.
///
/// Required parameters are checked first, so a missing one fails the plan
/// before anything is declared.
pub fn knowledge_base_stack(stack: &StackConfig) -> Result<Declarations, PlanError> {
    stack.validate()?;

    let params = &stack.parameters;
    let description = stack
        .description
        .clone()
        .unwrap_or_else(|| format!("{} knowledge base", stack.tag));

    let mut decls = Declarations::new();

    decls.declare(
        DATA_SOURCE_BUCKET,
        ResourceKind::Storage,
        config([("bucket_name", stack.bucket_name().into())]),
        stack.removal_policy,
    )?;

    decls.declare(
        KNOWLEDGE_BASE_ROLE,
        ResourceKind::AccessRole,
        config([
            ("role_name", stack.role_name().into()),
            ("assumed_by", SERVICE_PRINCIPAL.into()),
            ("policy_name", POLICY_NAME.into()),
        ]),
        stack.removal_policy,
    )?;

    decls.declare(
        KNOWLEDGE_BASE,
        ResourceKind::VectorKnowledgeBase,
        config([
            ("name", stack.tag.clone().into()),
            ("role_arn", ConfigValue::reference(KNOWLEDGE_BASE_ROLE, Attribute::Arn)),
            ("embedding_model_arn", params.embedding_model_arn.clone().into()),
            ("storage_type", VECTOR_STORE.into()),
            ("connection_string", params.vector_endpoint.clone().into()),
            ("credentials_secret_arn", params.secret_arn.clone().into()),
            ("metadata_field", "metadata".into()),
            ("text_field", "text".into()),
            ("description", description.into()),
        ]),
        stack.removal_policy,
    )?;

    decls.declare(
        DATA_SOURCE,
        ResourceKind::DataSource,
        config([
            ("name", format!("{}-data-source", stack.tag).into()),
            ("knowledge_base_id", ConfigValue::reference(KNOWLEDGE_BASE, Attribute::Id)),
            ("bucket_arn", ConfigValue::reference(DATA_SOURCE_BUCKET, Attribute::Arn)),
            ("source_type", SOURCE_TYPE.into()),
        ]),
        stack.removal_policy,
    )?;

    tracing::debug!(
        tag = %stack.tag,
        descriptors = decls.len(),
        removal_policy = ?stack.removal_policy,
        "declared knowledge-base stack"
    );
    Ok(decls)
}
