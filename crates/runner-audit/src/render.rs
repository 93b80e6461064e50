//! Plain-text tables for the report views.

use std::fmt::Write;

use crate::delete::{DeletionPlan, ExecutionReport};
use crate::report::{ClusterDetails, Summary};
use crate::runner::RunnerRecord;

const RULE_WIDTH: usize = 90;

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Per-org status counts followed by a totals row.
pub fn summary_table(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<35} {:>10} {:>10} {:>10} {:>10}",
        "Org Name", "Running", "Failed", "Pending", "Total"
    );
    let _ = writeln!(out, "{}", rule());
    for org in &summary.orgs {
        let name = if org.org.is_empty() { "-" } else { &org.org };
        let c = org.counts;
        let _ = writeln!(
            out,
            "{:<35} {:>10} {:>10} {:>10} {:>10}",
            name, c.running, c.failed, c.pending, c.total
        );
    }
    let _ = writeln!(out, "{}", rule());
    let t = summary.totals;
    let _ = writeln!(
        out,
        "{:<35} {:>10} {:>10} {:>10} {:>10}",
        "Total", t.running, t.failed, t.pending, t.total
    );
    out
}

/// Rows grouped by org (case-insensitively), with per-org and grand totals.
pub fn runner_table(rows: &[&RunnerRecord]) -> String {
    let mut groups: Vec<(String, Vec<&RunnerRecord>)> = Vec::new();
    for &row in rows {
        let key = row.org.to_lowercase();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "{:<40} {:<25} {:<12} {:>10}",
        "Runner Name", "Org Name", "Age", "Count"
    );
    let _ = writeln!(out, "{}", rule());
    for (_, members) in &groups {
        for row in members {
            let _ = writeln!(
                out,
                "{:<40} {:<25} {:<12} {:>10}",
                row.name,
                row.org,
                row.age.to_string(),
                ""
            );
        }
        let _ = writeln!(out, "{:<79} {:>10}", "Total", members.len());
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{:<79} {:>10}", "Grand Total", rows.len());
    out
}

/// Everything a batch deletion would do, shown before confirmation.
pub fn plan_table(plan: &DeletionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<35} {:<20} {:<25} {:<10}",
        "Runner Name", "Cluster", "Namespace", "Age"
    );
    let _ = writeln!(out, "{}", rule());
    for action in plan.actions() {
        let _ = writeln!(
            out,
            "{:<35} {:<20} {:<25} {:<10}",
            action.runner, action.target.cluster, action.namespace, action.age
        );
    }
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{:<79} {:>10}", "Grand Total", plan.len());
    out
}

/// Per-cluster, per-namespace listing with a cluster summary.
pub fn details_table(clusters: &[ClusterDetails<'_>]) -> String {
    let mut out = String::new();
    for cluster in clusters {
        let _ = writeln!(out, "=========================");
        let _ = writeln!(out, "Cluster: {}", cluster.cluster);
        let _ = writeln!(out, "API:     {}", cluster.api_endpoint);
        let _ = writeln!(out, "=========================");

        for (namespace, rows) in &cluster.namespaces {
            let _ = writeln!(out, "\nNamespace: {namespace}");
            let _ = writeln!(
                out,
                "{:<30} {:<40} {:<20} {:<10} {:<8} {:<10}",
                "Runner_Name", "Config_URL", "Org_Name", "Runner_ID", "Age", "Status"
            );
            let _ = writeln!(out, "{}", "-".repeat(120));
            for row in rows {
                let _ = writeln!(
                    out,
                    "{:<30} {:<40} {:<20} {:<10} {:<8} {:<10}",
                    row.name,
                    row.config_url,
                    row.org,
                    row.runner_id,
                    row.age.to_string(),
                    row.status.to_string()
                );
            }
        }

        let counts = cluster.counts();
        let _ = writeln!(out, "\n----- Cluster Summary -----");
        let _ = writeln!(out, "Namespaces with runners: {}", cluster.namespaces.len());
        let _ = writeln!(out, "Total runners: {}", counts.total);
        let _ = writeln!(out, "Running: {}", counts.running);
        let _ = writeln!(out, "Not running: {}", counts.total - counts.running);
        let _ = writeln!(out, "---------------------------\n");
    }
    out
}

/// One-line outcome of a deletion run.
pub fn execution_summary(report: &ExecutionReport) -> String {
    let mut line = format!(
        "{} deleted, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    if !report.declined.is_empty() {
        let _ = write!(line, ", {} skipped", report.declined.len());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::Age;
    use crate::delete::{DeletableStatus, DeleteAction, FailedAction};
    use crate::report::{OrgFilter, Report};
    use crate::status::RunnerStatus;

    fn report() -> Report {
        let row = |name: &str, org: &str, status| RunnerRecord {
            cluster: "c1".into(),
            api_endpoint: "https://api.c1".into(),
            namespace: "ns-a".into(),
            org: org.into(),
            name: name.into(),
            config_url: String::new(),
            runner_id: "1".into(),
            age: Age::Minutes(5),
            status,
        };
        Report::from_rows(vec![
            row("r1", "Acme", RunnerStatus::Pending),
            row("r2", "other", RunnerStatus::Pending),
            row("r3", "ACME", RunnerStatus::Pending),
            row("r4", "Acme", RunnerStatus::Running),
        ])
    }

    #[test]
    fn test_summary_table_has_totals_row() {
        let table = summary_table(&report().summary());
        let last = table.lines().last().unwrap();
        assert!(last.starts_with("Total"));
        assert!(last.trim_end().ends_with('4'));
        assert!(table.contains("Acme"));
    }

    #[test]
    fn test_runner_table_groups_orgs_case_insensitively() {
        let report = report();
        let rows = report.filter(&crate::report::RunnerFilter::new(
            RunnerStatus::Pending,
            OrgFilter::All,
        ));
        let table = runner_table(&rows);

        let totals: Vec<_> = table
            .lines()
            .filter(|l| l.starts_with("Total"))
            .map(|l| l.split_whitespace().last().unwrap().to_string())
            .collect();
        assert_eq!(totals, vec!["2", "1"]);
        assert!(table.lines().last().unwrap().ends_with('3'));
    }

    #[test]
    fn test_plan_table_lists_actions() {
        let plan =
            DeletionPlan::from_report(&report(), DeletableStatus::Pending, &OrgFilter::All);
        let table = plan_table(&plan);
        assert!(table.contains("r1"));
        assert!(table.contains("r3"));
        assert!(!table.contains("r4"));
    }

    #[test]
    fn test_details_table() {
        let report = report();
        let table = details_table(&report.details());
        assert!(table.contains("Cluster: c1"));
        assert!(table.contains("Namespace: ns-a"));
        assert!(table.contains("Total runners: 4"));
        assert!(table.contains("Not running: 3"));
    }

    #[test]
    fn test_execution_summary() {
        let action = DeleteAction::from_record(&report().rows()[0]);
        let result = ExecutionReport {
            succeeded: vec![action.clone()],
            failed: vec![FailedAction {
                action: action.clone(),
                error: "boom".into(),
            }],
            declined: vec![action],
        };
        assert_eq!(execution_summary(&result), "1 deleted, 1 failed, 1 skipped");
    }
}
