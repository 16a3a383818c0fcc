use crate::audit::{AuditSink, ProvisioningEvent, ProvisioningEventType};
use crate::backend::ProvisioningBackend;
use anyhow::Context;
use kbforge_core::AttributeTable;
use kbforge_planner::{DependencyResolver, PlanBuilder, ProvisioningPlan, emit};

pub struct Provisioner<B: ProvisioningBackend, S: AuditSink> {
    backend: B,
    audit: S,
}

impl<B: ProvisioningBackend, S: AuditSink> Provisioner<B, S> {
    pub fn new(backend: B, audit: S) -> Self {
        Self { backend, audit }
    }

    /// Apply a plan end-to-end.
    ///
    /// The full plan is built first so a declaration error never reaches the
    /// backend. Resources are then created in order, each bound against the
    /// attributes the backend returned for its dependencies. Access role
    /// grants are recomputed from those same attributes.
    pub async fn apply(&self, builder: &PlanBuilder) -> anyhow::Result<ProvisioningPlan> {
        builder.build().context("Plan validation failed; nothing was provisioned")?;

        let prepared = builder.prepare()?;
        let resolver = DependencyResolver::new(&prepared);
        let order = resolver.order()?;

        let mut table = AttributeTable::new();
        let mut resources = Vec::with_capacity(order.len());

        for descriptor in order {
            let mut resource = resolver.bind(descriptor, &table)?;
            builder.rescope(&prepared, &mut resource, &table)?;

            self.audit.record(ProvisioningEvent::new(
                &resource.id,
                resource.kind,
                ProvisioningEventType::Requested,
                serde_json::json!({
                    "removal_policy": resource.removal_policy,
                    "depends_on": resource.depends_on,
                }),
            ));

            let attributes = match self.backend.create(&resource).await {
                Ok(attributes) => attributes,
                Err(e) => {
                    self.audit.record(ProvisioningEvent::new(
                        &resource.id,
                        resource.kind,
                        ProvisioningEventType::Failed,
                        serde_json::json!({ "error": e.to_string() }),
                    ));
                    return Err(e.context(format!("Failed to create '{}'", resource.id)));
                }
            };

            self.audit.record(ProvisioningEvent::new(
                &resource.id,
                resource.kind,
                ProvisioningEventType::Created,
                serde_json::to_value(&attributes).unwrap_or_else(|_| serde_json::json!({})),
            ));

            table.insert(resource.id.clone(), attributes.clone());
            resource.attributes = attributes;
            resources.push(resource);
        }

        let plan = emit(resources, builder.uploads())?;
        tracing::info!(resources = plan.resources.len(), "applied provisioning plan");
        Ok(plan)
    }
}
