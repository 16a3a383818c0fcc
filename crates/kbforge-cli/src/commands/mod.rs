//! CLI command implementations for kbforge.

pub mod apply;
pub mod check;
pub mod plan;

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;

use kbforge_core::StackConfig;
use kbforge_planner::PlanBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Where the stack comes from and which `--set` overrides apply to it.
#[derive(Debug, Clone)]
pub struct StackArgs {
    pub config: PathBuf,
    pub overrides: Vec<String>,
}

impl StackArgs {
    pub fn load(&self) -> Result<StackConfig> {
        let mut stack = StackConfig::load_with_context(&self.config).with_context(|| {
            format!("Failed to load stack configuration {}", self.config.display())
        })?;
        for assignment in &self.overrides {
            stack
                .apply_override(assignment)
                .with_context(|| format!("Invalid --set '{}'", assignment))?;
        }
        tracing::debug!(
            tag = %stack.tag,
            overrides = self.overrides.len(),
            "loaded stack configuration"
        );
        Ok(stack)
    }

    pub fn builder(&self) -> Result<PlanBuilder> {
        let stack = self.load()?;
        PlanBuilder::from_stack(&stack).context("Failed to declare stack resources")
    }
}
