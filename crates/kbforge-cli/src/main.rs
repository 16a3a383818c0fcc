use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{OutputFormat, StackArgs};

#[derive(Parser, Debug)]
#[command(
    name = "kbforge",
    version,
    about = "Plan and provision a vector knowledge-base resource graph"
)]
struct Cli {
    /// Stack configuration file.
    #[arg(
        short,
        long,
        env = "KBFORGE_CONFIG",
        default_value = "kbforge.yaml",
        global = true
    )]
    config: PathBuf,

    /// Override a stack setting or parameter, e.g. --set secret_arn=arn:...
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    set: Vec<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the stack file and the resource graph it declares.
    Check,

    /// Print the ordered, resolved provisioning plan.
    Plan {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the computed grants of every access role.
    Policy {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the operator output directives (upload commands).
    Outputs {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Provision the plan through a backend.
    Apply {
        /// Replay the plan through the dry-run backend. Required until a
        /// provider backend is configured.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Print audit events to stdout instead of the log.
        #[arg(long, default_value_t = false)]
        audit_stdout: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let stack = StackArgs {
        config: cli.config,
        overrides: cli.set,
    };

    match cli.cmd {
        Command::Check => commands::check::run(&stack)?,
        Command::Plan { format } => commands::plan::run_plan(&stack, format)?,
        Command::Policy { format } => commands::plan::run_policy(&stack, format)?,
        Command::Outputs { format } => commands::plan::run_outputs(&stack, format)?,
        Command::Apply {
            dry_run,
            audit_stdout,
        } => commands::apply::run(&stack, dry_run, audit_stdout).await?,
    }

    Ok(())
}
