use async_trait::async_trait;
use kbforge_core::{ResolvedResource, ResourceAttributes};
use kbforge_planner::ProvisioningPlan;
use std::collections::HashMap;

/// External system that turns resolved resources into real ones.
///
/// Resources are handed over in plan order; the attributes returned for one
/// resource are available to every later resource.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn create(&self, resource: &ResolvedResource) -> anyhow::Result<ResourceAttributes>;
}

/// Backend that creates nothing and replays the identifiers of a dry-run plan.
pub struct DryRunBackend {
    attributes: HashMap<String, ResourceAttributes>,
}

impl DryRunBackend {
    pub fn from_plan(plan: &ProvisioningPlan) -> Self {
        Self {
            attributes: plan
                .resources
                .iter()
                .map(|r| (r.id.clone(), r.attributes.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl ProvisioningBackend for DryRunBackend {
    async fn create(&self, resource: &ResolvedResource) -> anyhow::Result<ResourceAttributes> {
        self.attributes.get(&resource.id).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "Resource '{}' is not part of the dry-run plan.",
                resource.id
            )
        })
    }
}
