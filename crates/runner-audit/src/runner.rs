//! Runner data as queried from a cluster and as stored in the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::age::Age;
use crate::config::{ClusterTarget, OrgSource};
use crate::status::{classify, RunnerStatus};

/// Status fields of one runner resource, exactly as the cluster reports them.
///
/// Every field except the name may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRunner {
    pub name: String,
    pub config_url: Option<String>,
    pub runner_id: Option<String>,
    pub ready: Option<String>,
    pub total: Option<String>,
    pub created_at: Option<String>,
}

/// One discovered runner, one row of the report.
///
/// Field order matches the report file columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerRecord {
    #[serde(rename = "Cluster")]
    pub cluster: String,
    #[serde(rename = "API_Endpoint")]
    pub api_endpoint: String,
    #[serde(rename = "Namespace")]
    pub namespace: String,
    #[serde(rename = "Org_Name")]
    pub org: String,
    #[serde(rename = "Runner_Name")]
    pub name: String,
    #[serde(rename = "Config_URL")]
    pub config_url: String,
    #[serde(rename = "Runner_ID")]
    pub runner_id: String,
    #[serde(rename = "Age")]
    pub age: Age,
    #[serde(rename = "Status")]
    pub status: RunnerStatus,
}

/// Context shared by every runner found in one namespace group.
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub target: ClusterTarget,
    /// Org of the enclosing group, if the group has one.
    pub org: Option<String>,
    pub org_source: OrgSource,
    /// Reference time for ages, fixed for the whole run.
    pub now: DateTime<Utc>,
}

impl RecordContext {
    /// Resolve the org for a runner under this context's org rule.
    pub fn org_for(&self, config_url: &str) -> String {
        match self.org_source {
            OrgSource::Inventory => self.org.clone().unwrap_or_default(),
            OrgSource::ConfigUrl => org_from_config_url(config_url),
        }
    }
}

impl RunnerRecord {
    /// Classify a raw runner into a report row.
    pub fn from_raw(ctx: &RecordContext, namespace: &str, raw: RawRunner) -> Self {
        let status = classify(raw.ready.as_deref(), raw.total.as_deref());
        let age = raw
            .created_at
            .as_deref()
            .map_or(Age::NotAvailable, |ts| Age::since(ts, ctx.now));
        let config_url = raw.config_url.unwrap_or_default();

        Self {
            cluster: ctx.target.cluster.clone(),
            api_endpoint: ctx.target.api_endpoint.clone(),
            namespace: namespace.to_string(),
            org: ctx.org_for(&config_url),
            name: raw.name,
            config_url,
            runner_id: raw.runner_id.unwrap_or_default(),
            age,
            status,
        }
    }

    pub fn target(&self) -> ClusterTarget {
        ClusterTarget::new(&self.cluster, &self.api_endpoint)
    }
}

/// Extract the org from a config URL such as `https://github.com/acme/repo`.
///
/// This is the fourth `/`-separated segment; empty when absent.
pub fn org_from_config_url(config_url: &str) -> String {
    config_url
        .split('/')
        .nth(3)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}
