//! Read-only report views: summary, list, and details.

use anyhow::Result;
use clap::Args;

use runner_audit::render;
use runner_audit::report::RunnerFilter;
use runner_audit::status::RunnerStatus;
use runner_audit::ui;

use super::RunContext;

/// Show per-org runner counts.
pub async fn summary(ctx: &mut RunContext) -> Result<()> {
    let report = ctx.report().await?;
    ui::print_section("Runner Summary");
    if let Some(at) = report.collected_at() {
        ui::print_kv("Collected at", &at.format("%Y-%m-%d %H:%M UTC").to_string());
        println!();
    }
    print!("{}", render::summary_table(&report.summary()));
    Ok(())
}

/// Show every runner grouped by cluster and namespace.
pub async fn details(ctx: &mut RunContext) -> Result<()> {
    let report = ctx.report().await?;
    ui::print_section("Runner Details");
    print!("{}", render::details_table(&report.details()));
    Ok(())
}

/// List runners in one state.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Runner state to list.
    #[arg(value_enum)]
    pub status: RunnerStatus,
}

impl ListCommand {
    pub async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let report = ctx.report().await?;
        let rows = report.filter(&RunnerFilter::new(self.status, ctx.org_filter()));

        ui::print_section(&format!("{} Runners", self.status));
        print!("{}", render::runner_table(&rows));
        Ok(())
    }
}
