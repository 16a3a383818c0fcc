//! `kbforge plan`, `kbforge policy` and `kbforge outputs`.
//!
//! All three build the same dry-run plan; they differ only in what they print.

use anyhow::{Context, Result};
use serde_json::{Map, Value as JsonValue};
use std::fmt::Write as _;

use kbforge_planner::{OutputDirective, ProvisioningPlan};
use kbforge_policy::ScopedPolicy;

use super::{OutputFormat, StackArgs};

pub fn run_plan(stack: &StackArgs, format: OutputFormat) -> Result<()> {
    let plan = stack.builder()?.build().context("Planning failed")?;
    match format {
        OutputFormat::Text => print!("{}", render_plan(&plan)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

pub fn run_policy(stack: &StackArgs, format: OutputFormat) -> Result<()> {
    let policies = stack
        .builder()?
        .scoped_policies()
        .context("Scoping access roles failed")?;
    match format {
        OutputFormat::Text => print!("{}", render_policies(&policies)),
        OutputFormat::Json => {
            let documents = policy_documents(&policies);
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
    }
    Ok(())
}

pub fn run_outputs(stack: &StackArgs, format: OutputFormat) -> Result<()> {
    let plan = stack.builder()?.build().context("Planning failed")?;
    match format {
        OutputFormat::Text => print!("{}", render_outputs(&plan.outputs)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan.outputs)?),
    }
    Ok(())
}

pub fn render_plan(plan: &ProvisioningPlan) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Provisioning plan ({} resources)", plan.resources.len());
    let _ = writeln!(out, "{}", "─".repeat(60));
    for (index, resource) in plan.resources.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {} [{}]", index + 1, resource.id, resource.kind);
        if !resource.depends_on.is_empty() {
            let _ = writeln!(out, "      depends on: {}", resource.depends_on.join(", "));
        }
        let _ = writeln!(
            out,
            "      removal policy: {}",
            serde_json::to_value(&resource.removal_policy)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default()
        );
        for (field, value) in &resource.config {
            // The inline policy is printed by `kbforge policy`.
            if field == "grants" {
                continue;
            }
            let _ = writeln!(out, "      {} = {}", field, display_value(value));
        }
    }

    let batches = plan.batches();
    if batches.len() > 1 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Creation batches:");
        for (level, ids) in batches.iter().enumerate() {
            let _ = writeln!(out, "  {}: {}", level + 1, ids.join(", "));
        }
    }

    if !plan.outputs.is_empty() {
        let _ = writeln!(out);
        out.push_str(&render_outputs(&plan.outputs));
    }

    out
}

pub fn render_policies(policies: &[ScopedPolicy]) -> String {
    let mut out = String::new();
    if policies.is_empty() {
        let _ = writeln!(out, "No access roles declared.");
        return out;
    }

    for policy in policies {
        let _ = writeln!(out, "{} ({} grants)", policy.role_id, policy.grants().len());
        for grant in policy.grants() {
            let actions: Vec<&str> = grant.actions.iter().map(|a| a.label()).collect();
            let _ = writeln!(out, "  {:<14} {}", actions.join(","), grant.resource_pattern);
        }
        if !policy.referenced.is_empty() {
            let _ = writeln!(out, "  created after: {}", policy.referenced.join(", "));
        }
    }
    out
}

pub fn render_outputs(outputs: &[OutputDirective]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Outputs:");
    if outputs.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for output in outputs {
        let _ = writeln!(out, "  {} = {}", output.label, output.value);
    }
    out
}

/// `{role_id: policy document}` for every scoped role.
fn policy_documents(policies: &[ScopedPolicy]) -> JsonValue {
    let documents: Map<String, JsonValue> = policies
        .iter()
        .map(|p| (p.role_id.clone(), p.document().to_value()))
        .collect();
    JsonValue::Object(documents)
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
