//! Batch deletion from a collected report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use runner_audit::delete::{
    AssumeYes, ConfirmPolicy, Confirmation, DeletableStatus, DeletionPlan, PromptPolicy,
};
use runner_audit::render;
use runner_audit::ui;

use super::RunContext;

/// Delete pending or failed runners after one confirmation for the whole batch.
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Runner state to delete.
    #[arg(value_enum)]
    pub status: DeletableStatus,

    /// Also write the planned delete commands to this shell script.
    #[arg(long, value_name = "FILE")]
    pub emit_script: Option<PathBuf>,

    /// Show the plan and exit without deleting.
    #[arg(long)]
    pub dry_run: bool,

    /// Confirm the plan without prompting.
    #[arg(short, long)]
    pub yes: bool,
}

impl DeleteCommand {
    pub async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let report = ctx.report().await?;
        let plan = DeletionPlan::from_report(&report, self.status, &ctx.org_filter());

        ui::print_section(&format!("Delete {:?} Runners", self.status));
        if plan.is_empty() {
            ui::print_info("No matching runners. Nothing to delete.");
            return Ok(());
        }
        print!("{}", render::plan_table(&plan));

        if let Some(path) = &self.emit_script {
            std::fs::write(path, plan.to_script())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            ui::print_kv("Delete script", &path.display().to_string());
        }

        if self.dry_run {
            ui::print_info("Dry run: no runners were deleted.");
            return Ok(());
        }

        let mut policy: Box<dyn ConfirmPolicy> = if self.yes {
            Box::new(AssumeYes)
        } else {
            Box::new(PromptPolicy)
        };

        match plan.confirm(policy.as_mut())? {
            Confirmation::Cancelled => {
                println!("{}", "Skipping deletion. No runners were deleted.".yellow());
            }
            Confirmation::Confirmed(confirmed) => {
                // Reuses the sessions from collection; only a stored report needs a login here.
                let sessions = ctx.sessions()?;
                ui::print_section("Executing delete commands");
                let result = confirmed.execute(sessions).await;

                if result.failed.is_empty() {
                    ui::print_success(&render::execution_summary(&result));
                } else {
                    ui::print_warning(&render::execution_summary(&result));
                    for failure in &result.failed {
                        ui::print_list_item(&format!("{}: {}", failure.action, failure.error));
                    }
                }
            }
        }

        Ok(())
    }
}
