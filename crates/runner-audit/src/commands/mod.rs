//! Command implementations and the options they share.

pub mod delete;
pub mod delete_fast;
pub mod report;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::info;

use runner_audit::cluster::TkgiAuthenticator;
use runner_audit::collector::Collector;
use runner_audit::config::{
    CollectSettings, Credentials, Grouping, Inventory, NamespaceGroup, OrgSource,
    DEFAULT_INVENTORY, DEFAULT_MAX_PARALLEL, DEFAULT_QUERY_TIMEOUT_SECS,
};
use runner_audit::fleet::collect_fleet;
use runner_audit::report::{OrgFilter, Report};
use runner_audit::source::SessionCache;
use runner_audit::ui;

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Inventory CSV: cluster,api_endpoint,namespace[,org] per line.
    #[arg(long, env = "RUNNER_AUDIT_INVENTORY", default_value = DEFAULT_INVENTORY, global = true)]
    pub inventory: PathBuf,

    /// Username for cluster authentication (prompted if missing).
    #[arg(short, long, env = "RUNNER_AUDIT_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for cluster authentication (prompted if missing).
    #[arg(long, env = "RUNNER_AUDIT_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Maximum namespaces queried at once per cluster (0 = unbounded).
    #[arg(long, default_value_t = DEFAULT_MAX_PARALLEL, global = true)]
    pub max_parallel: usize,

    /// Seconds before a namespace query is abandoned.
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, global = true)]
    pub query_timeout: u64,

    /// Where runner org names come from.
    #[arg(long, value_enum, default_value_t = OrgSource::Inventory, global = true)]
    pub org_source: OrgSource,

    /// Which inventory columns make up a collection group.
    #[arg(long, value_enum, default_value_t = Grouping::ClusterOrg, global = true)]
    pub grouping: Grouping,

    /// Directory for report files.
    #[arg(long, default_value = ".", global = true)]
    pub output_dir: PathBuf,

    /// Use a previously written report instead of querying clusters.
    #[arg(long, value_name = "FILE", global = true)]
    pub from_report: Option<PathBuf>,

    /// Only include runners of this organization (case-insensitive).
    #[arg(long, global = true)]
    pub org: Option<String>,

    /// Include all organizations (overrides --org).
    #[arg(long, global = true)]
    pub all_orgs: bool,

    /// tkgi binary used for authentication.
    #[arg(long, default_value = "tkgi", global = true)]
    pub tkgi: String,

    /// Kubeconfig that tkgi writes to and runner queries read from.
    /// Without it, the standard `KUBECONFIG` lookup applies.
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Hide namespace progress bars.
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// Resolved state shared by the commands of one invocation.
pub struct RunContext {
    args: GlobalArgs,
    sessions: Option<SessionCache<TkgiAuthenticator>>,
}

impl RunContext {
    pub fn new(args: GlobalArgs) -> Self {
        Self {
            args,
            sessions: None,
        }
    }

    pub fn settings(&self) -> CollectSettings {
        CollectSettings {
            max_parallel: self.args.max_parallel,
            query_timeout: Duration::from_secs(self.args.query_timeout),
            org_source: self.args.org_source,
            grouping: self.args.grouping,
            show_progress: !self.args.no_progress,
        }
    }

    pub fn org_filter(&self) -> OrgFilter {
        OrgFilter::from_options(self.args.org.as_deref(), self.args.all_orgs)
    }

    fn authenticator(&self) -> TkgiAuthenticator {
        TkgiAuthenticator {
            binary: self.args.tkgi.clone(),
            kubeconfig: self.args.kubeconfig.clone(),
            ..TkgiAuthenticator::default()
        }
    }

    /// Load the inventory and build collection groups.
    pub fn groups(&self) -> Result<Vec<NamespaceGroup>> {
        let inventory = Inventory::load(&self.args.inventory)?;
        if inventory.is_empty() {
            anyhow::bail!("Inventory {} has no entries", self.args.inventory.display());
        }
        Ok(inventory.groups(&self.settings())?)
    }

    /// Cluster sessions for the whole invocation.
    ///
    /// Credentials come from options, environment, or a prompt, and are
    /// asked for on first use only. Collection and deletion share the
    /// returned cache, so no cluster is authenticated twice.
    pub fn sessions(&mut self) -> Result<&mut SessionCache<TkgiAuthenticator>> {
        let sessions = match self.sessions.take() {
            Some(sessions) => sessions,
            None => {
                let credentials =
                    Credentials::resolve(self.args.username.clone(), self.args.password.clone())
                        .context("Failed to read credentials")?;
                SessionCache::new(self.authenticator(), credentials)
            }
        };
        Ok(self.sessions.insert(sessions))
    }

    /// The report to work from: a stored file if `--from-report` was given,
    /// otherwise a fresh collection across the inventory.
    pub async fn report(&mut self) -> Result<Report> {
        if let Some(path) = &self.args.from_report {
            let report = Report::read_csv(path)
                .with_context(|| format!("Failed to load report {}", path.display()))?;
            info!(path = %path.display(), rows = report.len(), "Loaded stored report");
            return Ok(report);
        }

        let groups = self.groups()?;
        let collector = Collector::new(&self.settings());
        let now = Utc::now();

        let run = collect_fleet(self.sessions()?, &groups, &collector, now).await;

        let path = run
            .report
            .persist(&self.args.output_dir, now)
            .context("Failed to write report")?;

        println!();
        ui::print_success("Data collection complete");
        ui::print_kv("Runners", &run.report.len().to_string());
        ui::print_kv("Report", &path.display().to_string());
        if !run.skipped.is_empty() {
            ui::print_warning(&format!(
                "{} cluster(s) skipped after authentication failure:",
                run.skipped.len()
            ));
            for target in &run.skipped {
                ui::print_list_item(&target.to_string());
            }
        }

        Ok(run.report)
    }
}
