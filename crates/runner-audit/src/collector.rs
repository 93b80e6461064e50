//! Bounded-concurrency collection of runners across the namespaces of one group.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::{CollectSettings, NamespaceGroup, OrgSource};
use crate::error::SourceError;
use crate::runner::{RecordContext, RunnerRecord};
use crate::source::ClusterSession;

/// Runs one namespace worker per namespace, never more than
/// `max_parallel` at a time.
#[derive(Debug, Clone)]
pub struct Collector {
    max_parallel: usize,
    query_timeout: Duration,
    org_source: OrgSource,
    show_progress: bool,
}

impl Collector {
    pub fn new(settings: &CollectSettings) -> Self {
        Self {
            max_parallel: settings.max_parallel,
            query_timeout: settings.query_timeout,
            org_source: settings.org_source,
            show_progress: settings.show_progress,
        }
    }

    /// Number of permits for the group semaphore.
    fn permits(&self) -> usize {
        if self.max_parallel == 0 {
            Semaphore::MAX_PERMITS
        } else {
            self.max_parallel
        }
    }

    /// Collect every runner in `group`.
    ///
    /// A namespace that fails, times out, or panics contributes zero rows
    /// without affecting its siblings. Rows come back in namespace order
    /// regardless of completion order.
    pub async fn collect_group<S>(
        &self,
        session: Arc<S>,
        group: &NamespaceGroup,
        now: DateTime<Utc>,
    ) -> Vec<RunnerRecord>
    where
        S: ClusterSession + 'static,
    {
        let ctx = Arc::new(RecordContext {
            target: group.target.clone(),
            org: group.org.clone(),
            org_source: self.org_source,
            now,
        });
        let progress = self.progress_bar(group);
        let semaphore = Arc::new(Semaphore::new(self.permits()));
        let mut tasks = JoinSet::new();

        for (idx, namespace) in group.namespaces.iter().enumerate() {
            // Blocks here while the ceiling is saturated.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let session = Arc::clone(&session);
            let ctx = Arc::clone(&ctx);
            let namespace = namespace.clone();
            let timeout = self.query_timeout;

            tasks.spawn(async move {
                let rows = namespace_worker(session.as_ref(), &ctx, &namespace, timeout).await;
                drop(permit);
                (idx, rows)
            });
        }

        let mut buffers: Vec<Vec<RunnerRecord>> = vec![Vec::new(); group.namespaces.len()];
        while let Some(joined) = tasks.join_next().await {
            progress.inc(1);
            match joined {
                Ok((idx, rows)) => buffers[idx] = rows,
                Err(e) => warn!(cluster = %group.target.cluster, error = %e, "Namespace worker panicked"),
            }
        }
        progress.finish_and_clear();

        buffers.into_iter().flatten().collect()
    }

    fn progress_bar(&self, group: &NamespaceGroup) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(group.namespaces.len() as u64);
        let style = ProgressStyle::with_template("  {spinner} [{bar:30}] {pos}/{len} namespaces {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(group.target.cluster.clone());
        bar
    }
}

/// Query one namespace and turn every runner found into a report row.
///
/// An empty namespace is a normal outcome. Query errors and timeouts are
/// logged and also produce zero rows.
pub async fn namespace_worker<S>(
    session: &S,
    ctx: &RecordContext,
    namespace: &str,
    timeout: Duration,
) -> Vec<RunnerRecord>
where
    S: ClusterSession + ?Sized,
{
    let result = match tokio::time::timeout(timeout, session.list_runners(namespace)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout {
            namespace: namespace.to_string(),
            secs: timeout.as_secs(),
        }),
    };

    match result {
        Ok(raws) => {
            debug!(cluster = %ctx.target.cluster, namespace, count = raws.len(), "Listed runners");
            raws.into_iter()
                .map(|raw| RunnerRecord::from_raw(ctx, namespace, raw))
                .collect()
        }
        Err(e) => {
            warn!(cluster = %ctx.target.cluster, namespace, error = %e, "Skipping namespace");
            Vec::new()
        }
    }
}
