//! Ephemeral runner audit CLI.
//!
//! Inventories self-hosted CI runners across many Kubernetes clusters and
//! namespaces, reports on their state, and cleans up runners stuck in
//! pending or failed states.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::delete::DeleteCommand;
use commands::delete_fast::DeleteFastCommand;
use commands::report::ListCommand;
use commands::{GlobalArgs, RunContext};

/// Ephemeral runner inventory and cleanup.
#[derive(Parser)]
#[command(
    name = "runner-audit",
    version,
    about = "Inventory and clean up ephemeral CI runners across clusters",
    long_about = "Inventory ephemeral CI runners across Kubernetes clusters.\n\n\
                  Every run authenticates against each cluster in the inventory,\n\
                  queries all listed namespaces in parallel, writes a CSV report,\n\
                  and then shows the requested view. Deletion always asks for\n\
                  confirmation unless --yes is given.",
    arg_required_else_help = true
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show runner counts per organization.
    Summary,

    /// List runners in one state, grouped by organization.
    List(ListCommand),

    /// Delete pending or failed runners from the collected report.
    ///
    /// Shows the full plan and asks once before deleting anything.
    Delete(DeleteCommand),

    /// Re-query clusters and delete pending or failed runners one by one.
    ///
    /// Each runner is confirmed individually and deleted immediately.
    DeleteFast(DeleteFastCommand),

    /// Show every runner grouped by cluster and namespace.
    Details,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("info,runner_audit=debug")
    } else {
        EnvFilter::new("warn,runner_audit=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut ctx = RunContext::new(cli.global);

    match cli.command {
        Commands::Summary => commands::report::summary(&mut ctx).await,
        Commands::List(cmd) => cmd.run(&mut ctx).await,
        Commands::Delete(cmd) => cmd.run(&mut ctx).await,
        Commands::DeleteFast(cmd) => cmd.run(&mut ctx).await,
        Commands::Details => commands::report::details(&mut ctx).await,
    }
}
