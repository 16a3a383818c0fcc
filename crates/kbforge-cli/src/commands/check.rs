//! `kbforge check` command implementation.
//!
//! Validates a stack file before anything is planned:
//! - JSON Schema validation against `schemas/StackConfig.schema.json`
//! - required parameters, after `--set` overrides
//! - a full dry-run plan, reporting the first declaration error
//! - warnings for settings that are legal but risky

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

use kbforge_core::{ConfigError, PlanError, RemovalPolicy, StackConfig};
use kbforge_planner::PlanBuilder;

use super::StackArgs;

/// Embedded so validation works without the repository checkout.
const STACK_CONFIG_SCHEMA: &str = include_str!("../../../../schemas/StackConfig.schema.json");

// ============================================================================
// Check Result Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Check that produced the finding, or the plan error category.
    pub category: String,
    pub message: String,
    pub file: Option<PathBuf>,
    /// Location within the file or graph (e.g. "/parameters" or a resource id).
    pub location: Option<String>,
}

impl CheckFinding {
    fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    fn info(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            file: None,
            location: None,
        }
    }

    fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    fn extend(&mut self, findings: impl IntoIterator<Item = CheckFinding>) {
        self.findings.extend(findings);
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn print_summary(&self) {
        let mut findings: Vec<&CheckFinding> = self.findings.iter().collect();
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.category.cmp(&b.category))
        });

        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);

        for (severity, header) in [
            (Severity::Error, "❌ Errors"),
            (Severity::Warning, "⚠️  Warnings"),
            (Severity::Info, "ℹ️  Info"),
        ] {
            let group: Vec<_> = findings.iter().filter(|f| f.severity == severity).collect();
            if group.is_empty() {
                continue;
            }
            println!("\n{} ({}):", header, group.len());
            println!("{}", "─".repeat(60));
            for finding in group {
                println!("  {}", format_finding(finding));
            }
        }

        println!();
        println!("{}", "═".repeat(60));
        if errors == 0 && warnings == 0 {
            println!("✅ All checks passed!");
        } else {
            println!("Summary: {} error(s), {} warning(s)", errors, warnings);
            if errors > 0 {
                println!("\n❌ Stack configuration has errors that must be fixed.");
            }
        }
    }
}

fn format_finding(finding: &CheckFinding) -> String {
    let icon = match finding.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
    };

    let location = match (&finding.file, &finding.location) {
        (Some(f), Some(l)) => format!(" [{}:{}]", f.display(), l),
        (Some(f), None) => format!(" [{}]", f.display()),
        (None, Some(l)) => format!(" [{}]", l),
        (None, None) => String::new(),
    };

    format!("{} [{}]{}: {}", icon, finding.category, location, finding.message)
}

// ============================================================================
// Main Check Runner
// ============================================================================

/// Run all checks without printing.
pub fn run_quiet(args: &StackArgs) -> Result<CheckResults> {
    let mut results = CheckResults::default();

    let schema_findings = validate_against_schema(&args.config)?;
    let schema_failed = schema_findings
        .iter()
        .any(|f| f.severity == Severity::Error);
    results.extend(schema_findings);
    if schema_failed {
        return Ok(results);
    }

    let stack = match args.load() {
        Ok(stack) => stack,
        Err(e) => {
            results.extend([CheckFinding::error("config", format!("{:#}", e))
                .with_file(args.config.clone())]);
            return Ok(results);
        }
    };

    results.extend(check_plan(&stack));
    results.extend(check_settings(&stack));
    Ok(results)
}

pub fn run(args: &StackArgs) -> Result<()> {
    println!("🔍 Checking stack {}...", args.config.display());
    println!();

    let results = run_quiet(args)?;
    results.print_summary();

    if results.has_errors() {
        anyhow::bail!(
            "Stack check failed with {} error(s)",
            results.error_count()
        );
    }

    Ok(())
}

// ============================================================================
// Check 1: JSON Schema Validation
// ============================================================================

fn validate_against_schema(config_path: &Path) -> Result<Vec<CheckFinding>> {
    let schema: JsonValue = serde_json::from_str(STACK_CONFIG_SCHEMA)
        .context("Failed to parse embedded StackConfig schema")?;

    let mut findings = Vec::new();

    let content = match fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) => {
            findings.push(
                CheckFinding::error("json-schema", format!("Failed to read file: {}", e))
                    .with_file(config_path),
            );
            return Ok(findings);
        }
    };

    let yaml_value: JsonValue = match serde_yaml::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            findings.push(
                CheckFinding::error("json-schema", format!("Failed to parse YAML: {}", e))
                    .with_file(config_path),
            );
            return Ok(findings);
        }
    };

    let compiled = jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("Failed to compile StackConfig schema: {}", e))?;

    for error in compiled.iter_errors(&yaml_value) {
        let path_str = error.instance_path().to_string();
        let location = if path_str.is_empty() {
            "(root)".to_string()
        } else {
            path_str
        };

        findings.push(
            CheckFinding::error("json-schema", error.to_string())
                .with_file(config_path)
                .with_location(location),
        );
    }

    Ok(findings)
}

// ============================================================================
// Check 2: Resource Graph
// ============================================================================

/// Run the full pipeline and report the error that would abort it.
fn check_plan(stack: &StackConfig) -> Vec<CheckFinding> {
    let outcome = PlanBuilder::from_stack(stack)
        .and_then(|builder| builder.build().map_err(ConfigError::from));

    match outcome {
        Ok(plan) => vec![CheckFinding::info(
            "plan",
            format!(
                "{} resources in {} creation batch(es), {} output(s)",
                plan.resources.len(),
                plan.batches().len(),
                plan.outputs.len()
            ),
        )],
        Err(ConfigError::Plan(e)) => vec![plan_finding(&e)],
        Err(e) => vec![CheckFinding::error("config", e.to_string())],
    }
}

fn plan_finding(error: &PlanError) -> CheckFinding {
    let finding = CheckFinding::error(error.kind(), error.to_string());
    match error.offending_ids().first() {
        Some(id) => finding.with_location(*id),
        None => finding,
    }
}

// ============================================================================
// Check 3: Risky Settings
// ============================================================================

fn check_settings(stack: &StackConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    if stack.removal_policy == RemovalPolicy::Destroy {
        findings.push(
            CheckFinding::warning(
                "removal-policy",
                "resources are destroyed with the stack, including uploaded documents",
            )
            .with_location("removal_policy"),
        );
    }

    if stack.artifacts.files.is_empty() {
        findings.push(
            CheckFinding::info("artifacts", "no artifacts listed; no upload commands are emitted")
                .with_location("artifacts.files"),
        );
    }

    if stack.region.is_none() {
        findings.push(
            CheckFinding::info("region", "no region set; the provider default applies")
                .with_location("region"),
        );
    }

    findings
}
