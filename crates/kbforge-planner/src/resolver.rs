//! Dependency ordering and reference binding.
//!
//! An edge A -> B exists when A references B (or lists B in `depends_on`).
//! Descriptors are realized in a stable topological order: among the
//! descriptors whose dependencies are all realized, the earliest declared
//! goes first.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kbforge_core::{
    AttributeTable, ConfigValue, Declarations, PlanError, PredictionContext, ResolvedResource,
    ResourceAttributes, ResourceDescriptor, ResourceKind,
};

/// Supplies the attributes of a descriptor once it is realized.
///
/// In a dry run these are synthetic; in a live run they come from the
/// provisioning backend.
pub trait AttributeSource {
    fn attributes(
        &mut self,
        descriptor: &ResourceDescriptor,
        resolved: &ResolvedResource,
    ) -> Result<ResourceAttributes, PlanError>;
}

const PLACEHOLDER_ACCOUNT: &str = "000000000000";
const PLACEHOLDER_REGION: &str = "dry-run";

/// Deterministic attributes for dry runs.
///
/// Operator-supplied overrides win, then attributes predictable from the
/// declaration, then `dryrun-*` placeholders.
#[derive(Debug, Clone, Default)]
pub struct SyntheticAttributes {
    context: PredictionContext,
    overrides: HashMap<String, ResourceAttributes>,
}

impl SyntheticAttributes {
    pub fn new(context: PredictionContext) -> Self {
        Self {
            context,
            overrides: HashMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, ResourceAttributes>) -> Self {
        self.overrides = overrides;
        self
    }

    fn placeholder(&self, descriptor: &ResourceDescriptor) -> ResourceAttributes {
        let partition = &self.context.partition;
        let account = self.context.account.as_deref().unwrap_or(PLACEHOLDER_ACCOUNT);
        let region = self.context.region.as_deref().unwrap_or(PLACEHOLDER_REGION);
        let slug = descriptor.id.to_ascii_lowercase();

        match descriptor.kind {
            ResourceKind::Storage => {
                let name = format!("dryrun-bucket-{}", slug);
                ResourceAttributes {
                    arn: Some(format!("arn:{}:s3:::{}", partition, name)),
                    endpoint: Some(format!("s3://{}", name)),
                    id: Some(name),
                }
            }
            ResourceKind::AccessRole => {
                let name = format!("dryrun-role-{}", slug);
                ResourceAttributes {
                    arn: Some(format!("arn:{}:iam::{}:role/{}", partition, account, name)),
                    id: Some(name),
                    endpoint: None,
                }
            }
            ResourceKind::VectorKnowledgeBase => {
                let id = format!("dryrun-kb-{}", slug);
                ResourceAttributes {
                    arn: Some(format!(
                        "arn:{}:bedrock:{}:{}:knowledge-base/{}",
                        partition, region, account, id
                    )),
                    id: Some(id),
                    endpoint: None,
                }
            }
            ResourceKind::DataSource => ResourceAttributes {
                id: Some(format!("dryrun-ds-{}", slug)),
                ..ResourceAttributes::default()
            },
        }
    }
}

impl AttributeSource for SyntheticAttributes {
    fn attributes(
        &mut self,
        descriptor: &ResourceDescriptor,
        _resolved: &ResolvedResource,
    ) -> Result<ResourceAttributes, PlanError> {
        let supplied = self.overrides.get(&descriptor.id).cloned().unwrap_or_default();
        Ok(supplied
            .or(&self.context.predict_all(descriptor))
            .or(&self.placeholder(descriptor)))
    }
}

/// Orders descriptors and substitutes references with concrete values.
pub struct DependencyResolver<'a> {
    declarations: &'a Declarations,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(declarations: &'a Declarations) -> Self {
        Self { declarations }
    }

    /// Topological order, ties broken by declaration order.
    pub fn order(&self) -> Result<Vec<&'a ResourceDescriptor>, PlanError> {
        let descriptors: Vec<&'a ResourceDescriptor> = self.declarations.iter().collect();

        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let mut positions = Vec::new();
            for target in descriptor.dependencies() {
                let position = self
                    .declarations
                    .position(target)
                    .ok_or_else(|| PlanError::unresolved(&descriptor.id, target))?;
                positions.push(position);
            }
            deps.push(positions);
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); descriptors.len()];
        for (node, targets) in deps.iter().enumerate() {
            for &target in targets {
                dependents[target].push(node);
            }
        }

        let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| node)
            .collect();

        let mut ordered = Vec::with_capacity(descriptors.len());
        let mut emitted = vec![false; descriptors.len()];
        while let Some(node) = ready.pop_first() {
            emitted[node] = true;
            ordered.push(descriptors[node]);
            for &dependent in &dependents[node] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if ordered.len() < descriptors.len() {
            let members = find_cycle(&deps, &emitted)
                .into_iter()
                .map(|node| descriptors[node].id.clone())
                .collect();
            return Err(PlanError::CyclicDependency { members });
        }

        Ok(ordered)
    }

    /// Replace every reference of `descriptor` with the target's realized
    /// attribute.
    pub fn bind(
        &self,
        descriptor: &ResourceDescriptor,
        table: &AttributeTable,
    ) -> Result<ResolvedResource, PlanError> {
        let mut config = BTreeMap::new();
        for (field, value) in &descriptor.config {
            let literal = match value {
                ConfigValue::Literal(literal) => literal.clone(),
                ConfigValue::Reference(reference) => {
                    if !table.contains(&reference.target) {
                        return Err(PlanError::unresolved(&descriptor.id, &reference.target));
                    }
                    match table.attribute(&reference.target, reference.attribute) {
                        Some(v) if !v.is_empty() => serde_json::Value::String(v.to_string()),
                        _ => return Err(PlanError::incomplete(&descriptor.id, field)),
                    }
                }
            };
            config.insert(field.clone(), literal);
        }

        Ok(ResolvedResource {
            id: descriptor.id.clone(),
            kind: descriptor.kind,
            config,
            removal_policy: descriptor.removal_policy,
            depends_on: descriptor
                .dependencies()
                .into_iter()
                .map(str::to_string)
                .collect(),
            attributes: ResourceAttributes::default(),
        })
    }

    /// Order, bind and realize every descriptor through `source`.
    pub fn resolve(
        &self,
        source: &mut impl AttributeSource,
    ) -> Result<Vec<ResolvedResource>, PlanError> {
        let order = self.order()?;
        let mut table = AttributeTable::new();
        let mut resolved = Vec::with_capacity(order.len());

        for descriptor in order {
            let mut resource = self.bind(descriptor, &table)?;
            let attributes = source.attributes(descriptor, &resource)?;
            tracing::debug!(
                id = %descriptor.id,
                kind = %descriptor.kind,
                arn = attributes.arn.as_deref().unwrap_or("-"),
                "resolved descriptor"
            );
            table.insert(descriptor.id.clone(), attributes.clone());
            resource.attributes = attributes;
            resolved.push(resource);
        }

        Ok(resolved)
    }
}

/// Walk unmet dependencies from the first blocked node until a node repeats.
fn find_cycle(deps: &[Vec<usize>], emitted: &[bool]) -> Vec<usize> {
    let Some(start) = (0..deps.len()).find(|&n| !emitted[n]) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = vec![start];
    let mut current = start;
    loop {
        // Every blocked node has at least one blocked dependency.
        let Some(&next) = deps[current].iter().find(|&&d| !emitted[d]) else {
            return path;
        };
        if let Some(at) = path.iter().position(|&n| n == next) {
            return path.split_off(at);
        }
        path.push(next);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbforge_core::{Attribute, RemovalPolicy, ResourceConfig};
    use pretty_assertions::assert_eq;

    fn source(id: &str, kb: ConfigValue, bucket: ConfigValue) -> (String, ResourceConfig) {
        (
            id.to_string(),
            ResourceConfig::from([
                ("name".to_string(), ConfigValue::from(id)),
                ("knowledge_base_id".to_string(), kb),
                ("bucket_arn".to_string(), bucket),
            ]),
        )
    }

    fn declare_sources(entries: Vec<(String, ResourceConfig)>) -> Declarations {
        let mut decls = Declarations::new();
        for (id, config) in entries {
            decls
                .declare(id, ResourceKind::DataSource, config, RemovalPolicy::Destroy)
                .unwrap();
        }
        decls
    }

    fn ids(order: &[&ResourceDescriptor]) -> Vec<String> {
        order.iter().map(|d| d.id.clone()).collect()
    }

    #[test]
    fn ties_follow_declaration_order() {
        let mut decls = declare_sources(vec![
            source("c", "kb".into(), "arn:b".into()),
            source("a", "kb".into(), "arn:b".into()),
            source("b", "kb".into(), "arn:b".into()),
        ]);
        decls.add_dependency("c", "b").unwrap();

        let resolver = DependencyResolver::new(&decls);
        assert_eq!(ids(&resolver.order().unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn self_reference_is_a_cycle_of_one() {
        let decls = declare_sources(vec![source(
            "loop",
            ConfigValue::reference("loop", Attribute::Id),
            "arn:b".into(),
        )]);

        let err = DependencyResolver::new(&decls).order().unwrap_err();
        assert_eq!(
            err,
            PlanError::CyclicDependency {
                members: vec!["loop".to_string()]
            }
        );
    }

    #[test]
    fn cycle_names_every_member_and_nothing_else() {
        let decls = declare_sources(vec![
            source("outside", ConfigValue::reference("a", Attribute::Id), "arn:b".into()),
            source("a", ConfigValue::reference("b", Attribute::Id), "arn:b".into()),
            source("b", ConfigValue::reference("c", Attribute::Id), "arn:b".into()),
            source("c", ConfigValue::reference("a", Attribute::Id), "arn:b".into()),
        ]);

        let err = DependencyResolver::new(&decls).order().unwrap_err();
        assert_eq!(
            err,
            PlanError::CyclicDependency {
                members: vec!["a".to_string(), "b".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn dangling_reference_names_source_and_target() {
        let decls = declare_sources(vec![source(
            "src",
            ConfigValue::reference("missing", Attribute::Id),
            "arn:b".into(),
        )]);

        assert_eq!(
            DependencyResolver::new(&decls).order().unwrap_err(),
            PlanError::unresolved("src", "missing")
        );
    }

    #[test]
    fn bind_substitutes_realized_attributes() {
        let decls = declare_sources(vec![
            source("first", "kb-1".into(), "arn:b".into()),
            source("second", ConfigValue::reference("first", Attribute::Id), "arn:b".into()),
        ]);
        let resolver = DependencyResolver::new(&decls);

        let mut table = AttributeTable::new();
        table.insert("first", ResourceAttributes::default().with(Attribute::Id, "ds-123"));

        let second = decls.get("second").unwrap();
        let resolved = resolver.bind(second, &table).unwrap();
        assert_eq!(resolved.config_str("knowledge_base_id"), Some("ds-123"));
        assert_eq!(resolved.depends_on, vec!["first".to_string()]);
    }

    #[test]
    fn bind_rejects_missing_attribute() {
        let decls = declare_sources(vec![
            source("first", "kb-1".into(), "arn:b".into()),
            source("second", "kb-1".into(), ConfigValue::reference("first", Attribute::Arn)),
        ]);
        let resolver = DependencyResolver::new(&decls);

        let mut table = AttributeTable::new();
        table.insert("first", ResourceAttributes::default().with(Attribute::Id, "ds-123"));

        let err = resolver.bind(decls.get("second").unwrap(), &table).unwrap_err();
        assert_eq!(err, PlanError::incomplete("second", "bucket_arn"));
    }

    #[test]
    fn overrides_beat_synthetic_identifiers() {
        let decls = declare_sources(vec![
            source("first", "kb-1".into(), "arn:b".into()),
            source("second", ConfigValue::reference("first", Attribute::Id), "arn:b".into()),
        ]);

        let mut synthetic = SyntheticAttributes::default().with_overrides(HashMap::from([(
            "first".to_string(),
            ResourceAttributes::default().with(Attribute::Id, "real-ds-id"),
        )]));
        let resolved = DependencyResolver::new(&decls).resolve(&mut synthetic).unwrap();

        assert_eq!(resolved[0].attributes.id.as_deref(), Some("real-ds-id"));
        assert_eq!(resolved[1].config_str("knowledge_base_id"), Some("real-ds-id"));
        assert_eq!(resolved[1].attributes.id.as_deref(), Some("dryrun-ds-second"));
    }
}
