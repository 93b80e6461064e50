//! Live deletion with a confirmation per runner.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use runner_audit::collector::Collector;
use runner_audit::delete::{delete_live, DeletableStatus, LiveSelection, PendingRule, PromptPolicy};
use runner_audit::render;
use runner_audit::ui;

use super::RunContext;

/// Re-query clusters and delete matching runners one prompt at a time.
#[derive(Args, Debug)]
pub struct DeleteFastCommand {
    /// Runner state to delete.
    #[arg(value_enum)]
    pub status: DeletableStatus,

    /// What counts as pending when deleting pending runners.
    #[arg(long, value_enum, default_value_t = PendingRule::NotReady)]
    pub pending_rule: PendingRule,
}

impl DeleteFastCommand {
    pub async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let groups = ctx.groups()?;
        let collector = Collector::new(&ctx.settings());
        let selection = LiveSelection {
            status: self.status,
            pending_rule: self.pending_rule,
            org: ctx.org_filter(),
        };

        let result = delete_live(
            ctx.sessions()?,
            &groups,
            &collector,
            &selection,
            &mut PromptPolicy,
            Utc::now(),
        )
        .await?;

        println!();
        if result.failed.is_empty() {
            ui::print_success(&render::execution_summary(&result));
        } else {
            ui::print_warning(&render::execution_summary(&result));
        }
        Ok(())
    }
}
