//! Sequential walk over every namespace group in the inventory.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::collector::Collector;
use crate::config::{ClusterTarget, NamespaceGroup};
use crate::report::Report;
use crate::source::{Authenticator, SessionCache};
use crate::ui;

/// Result of collecting across all clusters.
#[derive(Debug, Default)]
pub struct FleetRun {
    pub report: Report,
    /// Clusters skipped because authentication failed, in first-seen order.
    pub skipped: Vec<ClusterTarget>,
}

/// Collect runners from every group, one group at a time.
///
/// Each cluster is authenticated through `sessions` before any of its
/// namespaces are queried, so later phases of the run reuse the same
/// sessions. A cluster that fails authentication is skipped entirely and
/// the run continues with the next group.
pub async fn collect_fleet<A: Authenticator>(
    sessions: &mut SessionCache<A>,
    groups: &[NamespaceGroup],
    collector: &Collector,
    now: DateTime<Utc>,
) -> FleetRun {
    let mut run = FleetRun {
        report: Report::new(now),
        skipped: Vec::new(),
    };

    for group in groups {
        ui::print_cluster_header(&group.target, group.org.as_deref());

        let Some(session) = sessions.session(&group.target).await else {
            if !run.skipped.contains(&group.target) {
                run.skipped.push(group.target.clone());
            }
            continue;
        };

        let rows = collector.collect_group(session, group, now).await;
        info!(
            cluster = %group.target.cluster,
            org = group.org.as_deref().unwrap_or("-"),
            namespaces = group.namespaces.len(),
            runners = rows.len(),
            "Collected group"
        );
        run.report.extend(rows);
    }

    run
}
