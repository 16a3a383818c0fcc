//! Provisioning plans.
//!
//! `PlanBuilder::build` runs the whole pipeline: validate declarations, scope
//! access roles, resolve references, emit outputs. Any error aborts the plan;
//! a partial plan is never produced.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use kbforge_core::{
    AttributeTable, ConfigError, Declarations, PlanError, PredictionContext, ResolvedResource,
    ResourceAttributes, ResourceKind, StackConfig,
};
use kbforge_policy::{PolicyScoper, ScopedPolicy};

use crate::outputs::{ArtifactUploads, OutputDirective};
use crate::resolver::{DependencyResolver, SyntheticAttributes};
use crate::stack::{self, DATA_SOURCE_BUCKET};

/// Ordered, fully resolved resources plus operator outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningPlan {
    pub resources: Vec<ResolvedResource>,
    pub outputs: Vec<OutputDirective>,
}

impl ProvisioningPlan {
    pub fn get(&self, id: &str) -> Option<&ResolvedResource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.id == id)
    }

    /// Group resources into dependency levels. Resources in the same level
    /// have no edge between them and may be created concurrently.
    pub fn batches(&self) -> Vec<Vec<&str>> {
        let mut levels: HashMap<&str, usize> = HashMap::new();
        let mut batches: Vec<Vec<&str>> = Vec::new();

        for resource in &self.resources {
            let level = resource
                .depends_on
                .iter()
                .filter_map(|dep| levels.get(dep.as_str()))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            levels.insert(resource.id.as_str(), level);
            if batches.len() <= level {
                batches.resize_with(level + 1, Vec::new);
            }
            batches[level].push(resource.id.as_str());
        }

        batches
    }
}

/// Wrap resolved resources and compute output directives.
///
/// Pure function of its inputs; no external calls.
pub fn emit(
    resources: Vec<ResolvedResource>,
    uploads: Option<&ArtifactUploads>,
) -> Result<ProvisioningPlan, PlanError> {
    let outputs = match uploads {
        Some(uploads) => uploads.directives(&resources)?,
        None => Vec::new(),
    };
    Ok(ProvisioningPlan { resources, outputs })
}

/// Builds provisioning plans from a declaration table.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    declarations: Declarations,
    context: PredictionContext,
    overrides: HashMap<String, ResourceAttributes>,
    uploads: Option<ArtifactUploads>,
}

impl PlanBuilder {
    pub fn new(declarations: Declarations) -> Self {
        Self {
            declarations,
            context: PredictionContext::default(),
            overrides: HashMap::new(),
            uploads: None,
        }
    }

    /// Builder for a stack file: the knowledge-base template, or the raw
    /// declarations named by `resources_file`.
    pub fn from_stack(stack: &StackConfig) -> Result<Self, ConfigError> {
        let (declarations, storage_id) = match &stack.resources_file {
            Some(path) => {
                let declarations = Declarations::from_file(path)?;
                let storage_id = declarations
                    .of_kind(ResourceKind::Storage)
                    .next()
                    .map(|d| d.id.clone());
                (declarations, storage_id)
            }
            None => (
                stack::knowledge_base_stack(stack)?,
                Some(DATA_SOURCE_BUCKET.to_string()),
            ),
        };

        let mut builder = Self::new(declarations)
            .with_context(stack.prediction_context())
            .with_overrides(stack.overrides.clone());

        if !stack.artifacts.files.is_empty() {
            let storage_id = storage_id.ok_or_else(|| {
                ConfigError::Config(
                    "artifacts are listed but no storage resource is declared".to_string(),
                )
            })?;
            builder =
                builder.with_uploads(ArtifactUploads::from_config(storage_id, &stack.artifacts));
        }

        Ok(builder)
    }

    pub fn with_context(mut self, context: PredictionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, ResourceAttributes>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_uploads(mut self, uploads: ArtifactUploads) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn uploads(&self) -> Option<&ArtifactUploads> {
        self.uploads.as_ref()
    }

    /// Grants of every access role. Overridden ARNs take precedence over
    /// predicted ones, as they do when references are resolved.
    pub fn scoped_policies(&self) -> Result<Vec<ScopedPolicy>, PlanError> {
        self.declarations.validate()?;
        let known: AttributeTable = self
            .overrides
            .iter()
            .map(|(id, attributes)| (id.clone(), attributes.clone()))
            .collect();
        PolicyScoper::new(&self.declarations, &self.context)
            .with_known(&known)
            .scope_all()
    }

    /// Recompute the grants of an access role from the attributes realized
    /// so far. Other kinds are left untouched.
    pub fn rescope(
        &self,
        prepared: &Declarations,
        resource: &mut ResolvedResource,
        realized: &AttributeTable,
    ) -> Result<(), PlanError> {
        if resource.kind != ResourceKind::AccessRole {
            return Ok(());
        }
        let policy = PolicyScoper::new(prepared, &self.context)
            .with_known(realized)
            .scope(&resource.id)?;
        resource
            .config
            .insert("grants".to_string(), policy.document().to_value());
        Ok(())
    }

    /// Validated declarations with computed grants attached to access roles
    /// and their extra ordering edges added.
    pub fn prepare(&self) -> Result<Declarations, PlanError> {
        let policies = self.scoped_policies()?;

        let mut prepared = self.declarations.clone();
        for policy in policies {
            prepared.annotate(&policy.role_id, "grants", policy.document().to_value())?;
            for target in &policy.referenced {
                prepared.add_dependency(&policy.role_id, target)?;
            }
        }
        prepared.validate()?;
        Ok(prepared)
    }

    /// Dry-run plan with synthetic identifiers for in-plan resources.
    pub fn build(&self) -> Result<ProvisioningPlan, PlanError> {
        let prepared = self.prepare()?;

        let mut synthetic =
            SyntheticAttributes::new(self.context.clone()).with_overrides(self.overrides.clone());
        let resources = DependencyResolver::new(&prepared).resolve(&mut synthetic)?;
        let plan = emit(resources, self.uploads.as_ref())?;

        tracing::info!(
            resources = plan.resources.len(),
            outputs = plan.outputs.len(),
            "built provisioning plan"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbforge_core::{Attribute, ConfigValue, RemovalPolicy, ResourceConfig};

    fn resolved(id: &str, depends_on: &[&str]) -> ResolvedResource {
        ResolvedResource {
            id: id.to_string(),
            kind: ResourceKind::DataSource,
            config: Default::default(),
            removal_policy: RemovalPolicy::Destroy,
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            attributes: ResourceAttributes::default(),
        }
    }

    #[test]
    fn batches_group_independent_resources() {
        let plan = ProvisioningPlan {
            resources: vec![
                resolved("S", &[]),
                resolved("R", &["S"]),
                resolved("X", &[]),
                resolved("K", &["R"]),
                resolved("D", &["K", "S"]),
            ],
            outputs: Vec::new(),
        };

        assert_eq!(
            plan.batches(),
            vec![vec!["S", "X"], vec!["R"], vec!["K"], vec!["D"]]
        );
    }

    #[test]
    fn emit_without_uploads_has_no_outputs() {
        let plan = emit(vec![resolved("S", &[])], None).unwrap();
        assert!(plan.outputs.is_empty());
        assert_eq!(plan.position("S"), Some(0));
    }

    #[test]
    fn cycle_aborts_the_whole_plan() {
        let mut decls = Declarations::new();
        for (id, other) in [("a", "b"), ("b", "a")] {
            decls
                .declare(
                    id,
                    ResourceKind::DataSource,
                    ResourceConfig::from([
                        ("name".to_string(), ConfigValue::from(id)),
                        (
                            "knowledge_base_id".to_string(),
                            ConfigValue::reference(other, Attribute::Id),
                        ),
                        ("bucket_arn".to_string(), ConfigValue::from("arn:aws:s3:::b")),
                    ]),
                    RemovalPolicy::Destroy,
                )
                .unwrap();
        }

        let err = PlanBuilder::new(decls).build().unwrap_err();
        assert_eq!(
            err,
            PlanError::CyclicDependency {
                members: vec!["a".to_string(), "b".to_string()]
            }
        );
    }
}
