//! `kbforge apply`: walk the plan through a provisioning backend.

use anyhow::{Context, Result};

use kbforge_planner::{PlanBuilder, ProvisioningPlan};
use kbforge_runtime::{AuditSink, DryRunBackend, Provisioner, StdoutAuditSink, TracingAuditSink};

use super::StackArgs;
use super::plan::render_outputs;

pub async fn run(stack: &StackArgs, dry_run: bool, audit_stdout: bool) -> Result<()> {
    if !dry_run {
        anyhow::bail!("No provider backend is configured. Re-run with --dry-run.");
    }

    let builder = stack.builder()?;
    let plan = builder.build().context("Planning failed")?;
    let backend = DryRunBackend::from_plan(&plan);

    let applied = if audit_stdout {
        apply_with(backend, StdoutAuditSink, &builder).await?
    } else {
        apply_with(backend, TracingAuditSink, &builder).await?
    };

    println!(
        "✅ Applied {} resource(s) (dry run, nothing was created)",
        applied.resources.len()
    );
    print!("{}", render_outputs(&applied.outputs));
    Ok(())
}

async fn apply_with<S: AuditSink>(
    backend: DryRunBackend,
    audit: S,
    builder: &PlanBuilder,
) -> Result<ProvisioningPlan> {
    Provisioner::new(backend, audit).apply(builder).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbforge_core::StackConfig;
    use kbforge_runtime::ProvisioningEvent;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemorySink(Arc<Mutex<Vec<ProvisioningEvent>>>);

    impl AuditSink for MemorySink {
        fn record(&self, event: ProvisioningEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn builder() -> PlanBuilder {
        let stack = StackConfig::from_yaml(
            r#"
tag: kb-izakaya
account: "123456789012"
removal_policy: retain
parameters:
  embedding_model_arn: arn:model
  vector_endpoint: https://index
  secret_arn: arn:secret
artifacts:
  files: [izakaya_menu.txt, izakaya_guidance.pdf]
"#,
        )
        .unwrap();
        PlanBuilder::from_stack(&stack).unwrap()
    }

    #[tokio::test]
    async fn dry_run_apply_reproduces_the_plan() {
        let builder = builder();
        let planned = builder.build().unwrap();
        let sink = MemorySink::default();

        let applied = apply_with(DryRunBackend::from_plan(&planned), sink.clone(), &builder)
            .await
            .unwrap();

        assert_eq!(applied, planned);
        assert_eq!(sink.0.lock().unwrap().len(), 2 * planned.resources.len());
    }

    #[tokio::test]
    async fn apply_without_dry_run_is_refused() {
        let args = StackArgs {
            config: "does-not-matter.yaml".into(),
            overrides: Vec::new(),
        };
        let err = run(&args, false, false).await.unwrap_err();
        assert!(err.to_string().contains("--dry-run"));
    }
}
