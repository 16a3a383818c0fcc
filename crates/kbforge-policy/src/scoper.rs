//! Grant derivation for access roles.
//!
//! A role's grants follow from what the resources assuming it act on:
//! - a knowledge base reads its credentials secret and invokes its
//!   embedding model
//! - a data source bound to that knowledge base lists its bucket and reads
//!   every object in it

use kbforge_core::{
    AttributeTable, ConfigValue, Declarations, PlanError, PredictionContext, ResourceDescriptor,
    ResourceKind,
};

use crate::document::PolicyDocument;
use crate::grant::{GrantAction, GrantSet, PermissionGrant};

/// One resource a dependent kind touches, and what it needs on it.
struct Usage {
    field: &'static str,
    grants: &'static [(GrantAction, &'static str)],
}

const KNOWLEDGE_BASE_USAGES: &[Usage] = &[
    Usage {
        field: "credentials_secret_arn",
        grants: &[(GrantAction::ReadSecret, "")],
    },
    Usage {
        field: "embedding_model_arn",
        grants: &[(GrantAction::InvokeModel, "")],
    },
];

// Object keys are unknown at declaration time, so object reads cover the
// whole bucket.
const DATA_SOURCE_USAGES: &[Usage] = &[Usage {
    field: "bucket_arn",
    grants: &[(GrantAction::List, ""), (GrantAction::ReadObject, "/*")],
}];

fn usages(kind: ResourceKind) -> &'static [Usage] {
    match kind {
        ResourceKind::VectorKnowledgeBase => KNOWLEDGE_BASE_USAGES,
        ResourceKind::DataSource => DATA_SOURCE_USAGES,
        ResourceKind::Storage | ResourceKind::AccessRole => &[],
    }
}

/// Grants computed for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPolicy {
    pub role_id: String,
    pub grants: GrantSet,
    /// Descriptors whose attributes appear in grant patterns. The role has to
    /// be realized after them.
    pub referenced: Vec<String>,
}

impl ScopedPolicy {
    pub fn grants(&self) -> &[PermissionGrant] {
        self.grants.grants()
    }

    pub fn document(&self) -> PolicyDocument {
        PolicyDocument::from_grants(self.grants.grants())
    }
}

/// Derives the minimal grant set of access roles.
///
/// Referenced ARNs come from `known` attributes when present (operator
/// overrides, or what a backend already returned), otherwise from the
/// prediction context.
pub struct PolicyScoper<'a> {
    declarations: &'a Declarations,
    context: &'a PredictionContext,
    known: Option<&'a AttributeTable>,
}

impl<'a> PolicyScoper<'a> {
    pub fn new(declarations: &'a Declarations, context: &'a PredictionContext) -> Self {
        Self {
            declarations,
            context,
            known: None,
        }
    }

    pub fn with_known(mut self, known: &'a AttributeTable) -> Self {
        self.known = Some(known);
        self
    }

    /// Compute the grants of the access role `role_id`.
    pub fn scope(&self, role_id: &str) -> Result<ScopedPolicy, PlanError> {
        let role = self
            .declarations
            .get(role_id)
            .ok_or_else(|| PlanError::unresolved(role_id, role_id))?;
        if role.kind != ResourceKind::AccessRole {
            return Err(PlanError::schema(
                role_id,
                format!("only access roles can be scoped, found {}", role.kind),
            ));
        }

        let mut grants = GrantSet::new();
        let mut referenced: Vec<String> = Vec::new();

        for dependent in self.dependents(role_id) {
            for usage in usages(dependent.kind) {
                let arn = self.usage_arn(dependent, usage.field, &mut referenced)?;
                for (action, suffix) in usage.grants {
                    grants.add(format!("{}{}", arn, suffix), *action);
                }
            }
        }

        tracing::debug!(
            role = %role_id,
            grants = grants.pairs().len(),
            "scoped access role"
        );

        Ok(ScopedPolicy {
            role_id: role_id.to_string(),
            grants,
            referenced,
        })
    }

    /// Scope every access role, in declaration order.
    pub fn scope_all(&self) -> Result<Vec<ScopedPolicy>, PlanError> {
        self.declarations
            .of_kind(ResourceKind::AccessRole)
            .map(|role| self.scope(&role.id))
            .collect()
    }

    /// Resources acting through the role: everything referencing the role's
    /// ARN, then everything referencing one of those, transitively.
    fn dependents(&self, role_id: &str) -> Vec<&'a ResourceDescriptor> {
        let mut members: Vec<&'a ResourceDescriptor> = Vec::new();

        loop {
            let round: Vec<&'a ResourceDescriptor> = self
                .declarations
                .iter()
                .filter(|d| d.id != role_id && !members.iter().any(|m| m.id == d.id))
                .filter(|d| {
                    assumes_role(d, role_id) || members.iter().any(|m| d.references_target(&m.id))
                })
                .collect();
            if round.is_empty() {
                return members;
            }
            members.extend(round);
        }
    }

    /// The concrete ARN `field` of `descriptor` points at.
    fn usage_arn(
        &self,
        descriptor: &ResourceDescriptor,
        field: &str,
        referenced: &mut Vec<String>,
    ) -> Result<String, PlanError> {
        let arn = match descriptor.field(field) {
            Some(ConfigValue::Literal(value)) => value.as_str().map(str::to_string),
            Some(ConfigValue::Reference(reference)) => {
                let target = self
                    .declarations
                    .get(&reference.target)
                    .ok_or_else(|| PlanError::unresolved(&descriptor.id, &reference.target))?;
                let value = self
                    .known
                    .and_then(|known| known.attribute(&target.id, reference.attribute))
                    .map(str::to_string)
                    .or_else(|| self.context.predict(target, reference.attribute));
                if value.is_some() && !referenced.contains(&target.id) {
                    referenced.push(target.id.clone());
                }
                value
            }
            None => None,
        };

        // An empty pattern would be a silently broad grant.
        match arn {
            Some(arn) if !arn.trim().is_empty() => Ok(arn),
            _ => Err(PlanError::incomplete(&descriptor.id, field)),
        }
    }
}

fn assumes_role(descriptor: &ResourceDescriptor, role_id: &str) -> bool {
    descriptor.references().any(|(_, r)| {
        r.target == role_id && r.attribute == kbforge_core::Attribute::Arn
    })
}
