//! Deleting stuck runners.
//!
//! Batch mode builds a [`DeletionPlan`] from a collected report. The plan
//! has to be confirmed as a whole before anything is deleted:
//! `Planned -> Confirmed -> Executed`, or `Planned -> Cancelled`.
//!
//! Live mode skips the stored report. It re-queries each group and asks
//! for confirmation runner by runner, deleting as it goes.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use tracing::{info, warn};

use crate::collector::Collector;
use crate::config::{ClusterTarget, NamespaceGroup};
use crate::error::AuditError;
use crate::report::{OrgFilter, Report, RunnerFilter};
use crate::runner::RunnerRecord;
use crate::source::{Authenticator, ClusterSession, SessionCache};
use crate::status::RunnerStatus;
use crate::ui;

/// Statuses that may be deleted. Running runners never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeletableStatus {
    Pending,
    Failed,
}

impl From<DeletableStatus> for RunnerStatus {
    fn from(status: DeletableStatus) -> Self {
        match status {
            DeletableStatus::Pending => Self::Pending,
            DeletableStatus::Failed => Self::Failed,
        }
    }
}

/// What live deletion treats as a pending runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PendingRule {
    /// Runners classified `Pending` (not all replicas ready).
    #[default]
    NotReady,
    /// Runners reporting exactly zero ready replicas. This is the same set
    /// that is classified `Failed`.
    ZeroReady,
}

/// One runner to delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteAction {
    pub target: ClusterTarget,
    pub namespace: String,
    pub runner: String,
    pub org: String,
    pub age: String,
}

impl DeleteAction {
    pub fn from_record(row: &RunnerRecord) -> Self {
        Self {
            target: row.target(),
            namespace: row.namespace.clone(),
            runner: row.name.clone(),
            org: row.org.clone(),
            age: row.age.to_string(),
        }
    }

    /// Equivalent shell command for the operator's records.
    pub fn command(&self) -> String {
        format!(
            "tkgi get-kubeconfig {} -a {} && kubectl -n {} delete ephemeralrunner {}",
            self.target.cluster, self.target.api_endpoint, self.namespace, self.runner
        )
    }
}

impl fmt::Display for DeleteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.target.cluster, self.namespace, self.runner
        )
    }
}

/// Decides whether destructive actions go ahead.
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmPolicy {
    /// Approve or decline an entire batch plan.
    fn confirm_plan(&mut self, plan: &DeletionPlan) -> Result<bool, AuditError>;

    /// Approve or decline a single live deletion.
    fn confirm_runner(&mut self, action: &DeleteAction) -> Result<bool, AuditError>;
}

/// Asks the operator on the terminal. Anything but yes declines.
#[derive(Debug, Default)]
pub struct PromptPolicy;

impl ConfirmPolicy for PromptPolicy {
    fn confirm_plan(&mut self, plan: &DeletionPlan) -> Result<bool, AuditError> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete these {} runners?", plan.len()))
            .default(false)
            .interact()?)
    }

    fn confirm_runner(&mut self, action: &DeleteAction) -> Result<bool, AuditError> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete {}?", action))
            .default(false)
            .interact()?)
    }
}

/// Approves everything without asking (`--yes`).
#[derive(Debug, Default)]
pub struct AssumeYes;

impl ConfirmPolicy for AssumeYes {
    fn confirm_plan(&mut self, _plan: &DeletionPlan) -> Result<bool, AuditError> {
        Ok(true)
    }

    fn confirm_runner(&mut self, _action: &DeleteAction) -> Result<bool, AuditError> {
        Ok(true)
    }
}

/// A planned, not yet confirmed, batch deletion.
#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    actions: Vec<DeleteAction>,
}

/// Outcome of asking for confirmation.
#[derive(Debug)]
pub enum Confirmation {
    Confirmed(ConfirmedPlan),
    Cancelled,
}

impl DeletionPlan {
    /// Plan the deletion of every `status` runner in `report` that passes `org`.
    pub fn from_report(report: &Report, status: DeletableStatus, org: &OrgFilter) -> Self {
        let filter = RunnerFilter::new(status.into(), org.clone());
        Self::from_rows(&report.filter(&filter))
    }

    pub fn from_rows(rows: &[&RunnerRecord]) -> Self {
        Self {
            actions: rows.iter().map(|row| DeleteAction::from_record(row)).collect(),
        }
    }

    pub fn actions(&self) -> &[DeleteAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Shell script with one delete command per action.
    pub fn to_script(&self) -> String {
        let mut script = String::from("#!/usr/bin/env bash\n");
        for action in &self.actions {
            script.push_str(&action.command());
            script.push('\n');
        }
        script
    }

    /// Ask `policy` to approve the whole plan. Declining drops the plan.
    pub fn confirm(self, policy: &mut dyn ConfirmPolicy) -> Result<Confirmation, AuditError> {
        if self.is_empty() {
            return Ok(Confirmation::Cancelled);
        }
        if policy.confirm_plan(&self)? {
            info!(actions = self.len(), "Deletion plan confirmed");
            Ok(Confirmation::Confirmed(ConfirmedPlan { plan: self }))
        } else {
            info!(actions = self.len(), "Deletion plan cancelled");
            Ok(Confirmation::Cancelled)
        }
    }
}

/// A plan the operator approved. Executing consumes it.
#[derive(Debug)]
pub struct ConfirmedPlan {
    plan: DeletionPlan,
}

impl ConfirmedPlan {
    pub fn actions(&self) -> &[DeleteAction] {
        self.plan.actions()
    }

    /// Attempt every action in order. A failed action is recorded and the
    /// rest still run; nothing is rolled back.
    ///
    /// Clusters already authenticated through `sessions` are not
    /// authenticated again.
    pub async fn execute<A: Authenticator>(self, sessions: &mut SessionCache<A>) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for action in self.plan.actions {
            match sessions.session(&action.target).await {
                Some(session) => delete_one(session.as_ref(), action, &mut report).await,
                None => report.record_failure(action, "authentication failed".to_string()),
            }
        }

        report
    }
}

/// Which runners live deletion offers for removal.
#[derive(Debug, Clone)]
pub struct LiveSelection {
    pub status: DeletableStatus,
    pub pending_rule: PendingRule,
    pub org: OrgFilter,
}

impl LiveSelection {
    pub fn matches(&self, row: &RunnerRecord) -> bool {
        let wanted = match (self.status, self.pending_rule) {
            (DeletableStatus::Pending, PendingRule::NotReady) => RunnerStatus::Pending,
            (DeletableStatus::Pending, PendingRule::ZeroReady) | (DeletableStatus::Failed, _) => {
                RunnerStatus::Failed
            }
        };
        row.status == wanted && self.org.matches(&row.org)
    }
}

/// Re-query each group and delete matching runners one confirmation at a time.
///
/// Groups run in order, and each cluster is authenticated once. A failed
/// prompt aborts the run. Failed deletions do not.
pub async fn delete_live<A: Authenticator>(
    sessions: &mut SessionCache<A>,
    groups: &[NamespaceGroup],
    collector: &Collector,
    selection: &LiveSelection,
    policy: &mut dyn ConfirmPolicy,
    now: DateTime<Utc>,
) -> Result<ExecutionReport, AuditError> {
    let mut report = ExecutionReport::default();
    let mut seen: HashSet<DeleteAction> = HashSet::new();

    for group in groups {
        ui::print_cluster_header(&group.target, group.org.as_deref());
        let Some(session) = sessions.session(&group.target).await else {
            continue;
        };

        let rows = collector.collect_group(session.clone(), group, now).await;
        let candidates: Vec<_> = rows.iter().filter(|row| selection.matches(row)).collect();
        if candidates.is_empty() {
            ui::print_info("No matching runners.");
            continue;
        }

        for row in candidates {
            let action = DeleteAction::from_record(row);
            if !seen.insert(action.clone()) {
                continue;
            }
            ui::print_runner_candidate(&action.runner, &action.org, &action.age, row.status);
            if policy.confirm_runner(&action)? {
                delete_one(session.as_ref(), action, &mut report).await;
            } else {
                report.declined.push(action);
            }
        }
    }

    Ok(report)
}

async fn delete_one<S>(session: &S, action: DeleteAction, report: &mut ExecutionReport)
where
    S: ClusterSession + ?Sized,
{
    match session.delete_runner(&action.namespace, &action.runner).await {
        Ok(()) => {
            info!(runner = %action, "Deleted runner");
            ui::print_success(&format!("Deleted {action}"));
            report.succeeded.push(action);
        }
        Err(e) => {
            warn!(runner = %action, error = %e, "Delete failed");
            ui::print_error(&format!("Failed to delete {action}: {e}"));
            report.record_failure(action, e.to_string());
        }
    }
}

/// A deletion that did not go through.
#[derive(Debug, Clone)]
pub struct FailedAction {
    pub action: DeleteAction,
    pub error: String,
}

/// What happened to each action of a deletion run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub succeeded: Vec<DeleteAction>,
    pub failed: Vec<FailedAction>,
    /// Live mode only: runners the operator chose to keep.
    pub declined: Vec<DeleteAction>,
}

impl ExecutionReport {
    fn record_failure(&mut self, action: DeleteAction, error: String) {
        self.failed.push(FailedAction { action, error });
    }

    /// Deletions actually sent to a cluster or abandoned for lack of a session.
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::Age;
    use crate::config::{CollectSettings, Credentials};
    use crate::error::SourceError;
    use crate::fleet::collect_fleet;
    use crate::runner::RawRunner;
    use crate::source::MockClusterSession;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn row(cluster: &str, name: &str, status: RunnerStatus) -> RunnerRecord {
        RunnerRecord {
            cluster: cluster.into(),
            api_endpoint: format!("https://api.{cluster}"),
            namespace: "ns-a".into(),
            org: "acme".into(),
            name: name.into(),
            config_url: "https://github.com/acme".into(),
            runner_id: "1".into(),
            age: Age::Minutes(90),
            status,
        }
    }

    fn pending_report() -> Report {
        Report::from_rows(vec![
            row("c1", "r1", RunnerStatus::Pending),
            row("c1", "r2", RunnerStatus::Pending),
            row("c1", "ok", RunnerStatus::Running),
            row("c1", "r3", RunnerStatus::Pending),
        ])
    }

    /// Shares one pre-built session with every cluster.
    struct SharedAuth {
        session: Arc<Mutex<Option<MockClusterSession>>>,
        deny: Option<&'static str>,
    }

    impl SharedAuth {
        fn new(session: MockClusterSession) -> Self {
            Self {
                session: Arc::new(Mutex::new(Some(session))),
                deny: None,
            }
        }
    }

    fn cache(auth: SharedAuth) -> SessionCache<SharedAuth> {
        SessionCache::new(auth, Credentials::new("u", "p"))
    }

    #[async_trait]
    impl Authenticator for SharedAuth {
        type Session = MockClusterSession;

        async fn authenticate(
            &self,
            target: &ClusterTarget,
            _credentials: &Credentials,
        ) -> Result<Self::Session, SourceError> {
            if self.deny == Some(target.cluster.as_str()) {
                return Err(SourceError::Auth {
                    cluster: target.cluster.clone(),
                    message: "denied".into(),
                });
            }
            self.session
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| SourceError::Auth {
                    cluster: target.cluster.clone(),
                    message: "authenticated twice".into(),
                })
        }
    }

    #[test]
    fn test_plan_selects_only_requested_status() {
        let plan = DeletionPlan::from_report(
            &pending_report(),
            DeletableStatus::Pending,
            &OrgFilter::All,
        );
        let names: Vec<_> = plan.actions().iter().map(|a| a.runner.as_str()).collect();
        assert_eq!(names, vec!["r1", "r2", "r3"]);

        let none = DeletionPlan::from_report(
            &pending_report(),
            DeletableStatus::Pending,
            &OrgFilter::from_options(Some("other"), false),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_script_lists_every_action() {
        let plan = DeletionPlan::from_report(
            &pending_report(),
            DeletableStatus::Pending,
            &OrgFilter::All,
        );
        let script = plan.to_script();
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert_eq!(script.lines().count(), 4);
        assert!(script.contains(
            "tkgi get-kubeconfig c1 -a https://api.c1 && kubectl -n ns-a delete ephemeralrunner r2"
        ));
    }

    #[tokio::test]
    async fn test_declined_plan_deletes_nothing() {
        let plan = DeletionPlan::from_report(
            &pending_report(),
            DeletableStatus::Pending,
            &OrgFilter::All,
        );
        assert_eq!(plan.len(), 3);

        let mut policy = MockConfirmPolicy::new();
        policy.expect_confirm_plan().times(1).returning(|_| Ok(false));
        policy.expect_confirm_runner().never();

        let outcome = plan.confirm(&mut policy).unwrap();
        assert!(matches!(outcome, Confirmation::Cancelled));
    }

    #[tokio::test]
    async fn test_confirmed_plan_continues_past_failures() {
        let plan = DeletionPlan::from_report(
            &pending_report(),
            DeletableStatus::Pending,
            &OrgFilter::All,
        );

        let mut policy = MockConfirmPolicy::new();
        policy.expect_confirm_plan().times(1).returning(|_| Ok(true));

        let mut session = MockClusterSession::new();
        session
            .expect_delete_runner()
            .times(3)
            .returning(|ns, name| {
                if name == "r2" {
                    Err(SourceError::Delete {
                        namespace: ns.to_string(),
                        name: name.to_string(),
                        message: "conflict".into(),
                    })
                } else {
                    Ok(())
                }
            });
        let auth = SharedAuth::new(session);

        let Confirmation::Confirmed(confirmed) = plan.confirm(&mut policy).unwrap() else {
            panic!("plan should be confirmed");
        };
        let result = confirmed.execute(&mut cache(auth)).await;

        assert_eq!(result.attempted(), 3);
        assert_eq!(result.succeeded.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].action.runner, "r2");
    }

    #[tokio::test]
    async fn test_auth_failure_fails_only_that_clusters_actions() {
        let report = Report::from_rows(vec![
            row("denied", "d1", RunnerStatus::Failed),
            row("c1", "f1", RunnerStatus::Failed),
        ]);
        let plan = DeletionPlan::from_report(&report, DeletableStatus::Failed, &OrgFilter::All);

        let mut session = MockClusterSession::new();
        session.expect_delete_runner().times(1).returning(|_, _| Ok(()));
        let auth = SharedAuth {
            deny: Some("denied"),
            ..SharedAuth::new(session)
        };

        let Confirmation::Confirmed(confirmed) = plan.confirm(&mut AssumeYes).unwrap() else {
            panic!("plan should be confirmed");
        };
        let result = confirmed.execute(&mut cache(auth)).await;

        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.succeeded[0].runner, "f1");
        assert_eq!(result.failed[0].action.runner, "d1");
    }

    #[tokio::test]
    async fn test_execute_reuses_sessions_from_collection() {
        let mut session = MockClusterSession::new();
        session.expect_list_runners().returning(|_| {
            Ok(vec![RawRunner {
                name: "stuck".into(),
                ready: Some("1".into()),
                total: Some("2".into()),
                ..RawRunner::default()
            }])
        });
        session
            .expect_delete_runner()
            .times(1)
            .returning(|_, _| Ok(()));
        // A second authentication of c1 would fail: the session is handed out once.
        let mut sessions = cache(SharedAuth::new(session));
        let groups = vec![NamespaceGroup {
            target: ClusterTarget::new("c1", "https://api.c1"),
            org: Some("acme".into()),
            namespaces: vec!["ns-a".into()],
        }];

        let run = collect_fleet(
            &mut sessions,
            &groups,
            &Collector::new(&CollectSettings::default()),
            Utc::now(),
        )
        .await;
        let plan = DeletionPlan::from_report(&run.report, DeletableStatus::Pending, &OrgFilter::All);
        let Confirmation::Confirmed(confirmed) = plan.confirm(&mut AssumeYes).unwrap() else {
            panic!("plan should be confirmed");
        };
        let result = confirmed.execute(&mut sessions).await;

        assert!(result.failed.is_empty(), "{:?}", result.failed);
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.succeeded[0].runner, "stuck");
    }

    #[test]
    fn test_empty_plan_is_cancelled_without_prompt() {
        let mut policy = MockConfirmPolicy::new();
        policy.expect_confirm_plan().never();
        let outcome = DeletionPlan::default().confirm(&mut policy).unwrap();
        assert!(matches!(outcome, Confirmation::Cancelled));
    }

    #[test]
    fn test_live_selection_rules() {
        let pending = row("c1", "p", RunnerStatus::Pending);
        let failed = row("c1", "f", RunnerStatus::Failed);

        let not_ready = LiveSelection {
            status: DeletableStatus::Pending,
            pending_rule: PendingRule::NotReady,
            org: OrgFilter::All,
        };
        assert!(not_ready.matches(&pending));
        assert!(!not_ready.matches(&failed));

        let zero_ready = LiveSelection {
            pending_rule: PendingRule::ZeroReady,
            ..not_ready.clone()
        };
        assert!(!zero_ready.matches(&pending));
        assert!(zero_ready.matches(&failed));

        let failed_sel = LiveSelection {
            status: DeletableStatus::Failed,
            ..not_ready
        };
        assert!(failed_sel.matches(&failed));
    }

    #[tokio::test]
    async fn test_live_mode_prompts_per_runner() {
        let mut session = MockClusterSession::new();
        session.expect_list_runners().returning(|_| {
            Ok(vec![
                RawRunner {
                    name: "keep".into(),
                    ready: Some("1".into()),
                    total: Some("2".into()),
                    ..RawRunner::default()
                },
                RawRunner {
                    name: "drop".into(),
                    ready: Some("1".into()),
                    total: Some("3".into()),
                    ..RawRunner::default()
                },
                RawRunner {
                    name: "healthy".into(),
                    ready: Some("1".into()),
                    total: Some("1".into()),
                    ..RawRunner::default()
                },
            ])
        });
        session
            .expect_delete_runner()
            .withf(|_, name| name == "drop")
            .times(1)
            .returning(|_, _| Ok(()));
        let auth = SharedAuth::new(session);

        let mut policy = MockConfirmPolicy::new();
        policy.expect_confirm_plan().never();
        policy
            .expect_confirm_runner()
            .times(2)
            .returning(|action| Ok(action.runner == "drop"));

        let groups = vec![NamespaceGroup {
            target: ClusterTarget::new("c1", "https://api.c1"),
            org: Some("acme".into()),
            namespaces: vec!["ns-a".into()],
        }];
        let selection = LiveSelection {
            status: DeletableStatus::Pending,
            pending_rule: PendingRule::NotReady,
            org: OrgFilter::All,
        };

        let result = delete_live(
            &mut cache(auth),
            &groups,
            &Collector::new(&CollectSettings::default()),
            &selection,
            &mut policy,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.declined.len(), 1);
        assert_eq!(result.declined[0].runner, "keep");
    }
}
