//! Run configuration: the cluster/namespace inventory and collection settings.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Default inventory file name.
pub const DEFAULT_INVENTORY: &str = "cluster1_namespaces.csv";

/// Default ceiling on concurrent namespace queries.
pub const DEFAULT_MAX_PARALLEL: usize = 20;

/// Default per-namespace query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Where a runner's organization name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OrgSource {
    /// The org column of the inventory row.
    #[default]
    Inventory,
    /// The fourth `/`-separated segment of the runner's config URL.
    ConfigUrl,
}

/// Which inventory columns form a collection group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// One group per cluster, endpoint, and org.
    #[default]
    ClusterOrg,
    /// One group per cluster and endpoint.
    Cluster,
}

/// A cluster addressed by name and API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterTarget {
    pub cluster: String,
    pub api_endpoint: String,
}

impl ClusterTarget {
    pub fn new(cluster: impl Into<String>, api_endpoint: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            api_endpoint: api_endpoint.into(),
        }
    }
}

impl fmt::Display for ClusterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.cluster, self.api_endpoint)
    }
}

/// One row of the inventory file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// 1-based line in the inventory file.
    pub line: u64,
    pub cluster: String,
    pub api_endpoint: String,
    pub namespace: String,
    pub org: Option<String>,
}

/// All namespaces of one cluster (and, depending on grouping, one org).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceGroup {
    pub target: ClusterTarget,
    /// Set when grouping by org; `None` for cluster-only groups.
    pub org: Option<String>,
    pub namespaces: Vec<String>,
}

/// The parsed inventory file.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
}

impl Inventory {
    /// Load an inventory CSV (`cluster,api_endpoint,namespace[,org]`, no header).
    pub fn load(path: &Path) -> Result<Self, AuditError> {
        if !path.is_file() {
            return Err(AuditError::InventoryNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse inventory CSV content.
    pub fn parse(content: &str) -> Result<Self, AuditError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map_or(0, csv::Position::line);

            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.len() < 3 {
                return Err(AuditError::InvalidInventory {
                    line,
                    message: format!(
                        "expected cluster,api_endpoint,namespace[,org], got {} field(s)",
                        record.len()
                    ),
                });
            }

            let field = |i: usize| record.get(i).unwrap_or_default().to_string();
            let (cluster, api_endpoint, namespace) = (field(0), field(1), field(2));
            if cluster.is_empty() || api_endpoint.is_empty() || namespace.is_empty() {
                return Err(AuditError::InvalidInventory {
                    line,
                    message: "cluster, api_endpoint and namespace must not be empty".into(),
                });
            }
            let org = record
                .get(3)
                .filter(|org| !org.is_empty())
                .map(ToString::to_string);

            entries.push(InventoryEntry {
                line,
                cluster,
                api_endpoint,
                namespace,
                org,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build namespace groups in first-seen order.
    ///
    /// Namespaces inside a group are deduplicated and keep first-seen order.
    pub fn groups(&self, settings: &CollectSettings) -> Result<Vec<NamespaceGroup>, AuditError> {
        settings.validate()?;

        let mut groups: Vec<NamespaceGroup> = Vec::new();
        let mut index: HashMap<(ClusterTarget, Option<String>), usize> = HashMap::new();

        for entry in &self.entries {
            let org = match settings.grouping {
                Grouping::ClusterOrg => match (&entry.org, settings.org_source) {
                    (Some(org), _) => Some(org.clone()),
                    (None, OrgSource::ConfigUrl) => None,
                    (None, OrgSource::Inventory) => {
                        return Err(AuditError::InvalidInventory {
                            line: entry.line,
                            message: format!(
                                "namespace {} has no org column (required with --org-source inventory)",
                                entry.namespace
                            ),
                        });
                    }
                },
                Grouping::Cluster => None,
            };

            let target = ClusterTarget::new(&entry.cluster, &entry.api_endpoint);
            let key = (target.clone(), org.clone());
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(NamespaceGroup {
                    target,
                    org,
                    namespaces: Vec::new(),
                });
                groups.len() - 1
            });

            let namespaces = &mut groups[slot].namespaces;
            if !namespaces.contains(&entry.namespace) {
                namespaces.push(entry.namespace.clone());
            }
        }

        Ok(groups)
    }
}

/// Settings for one collection run.
#[derive(Debug, Clone)]
pub struct CollectSettings {
    /// Ceiling on in-flight namespace queries; 0 means unbounded.
    pub max_parallel: usize,
    pub query_timeout: Duration,
    pub org_source: OrgSource,
    pub grouping: Grouping,
    pub show_progress: bool,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            org_source: OrgSource::default(),
            grouping: Grouping::default(),
            show_progress: false,
        }
    }
}

impl CollectSettings {
    /// Reject option combinations that would make org derivation ambiguous.
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.grouping == Grouping::Cluster && self.org_source == OrgSource::Inventory {
            return Err(AuditError::Config(
                "--grouping cluster drops the org column; use --org-source config-url".into(),
            ));
        }
        if self.query_timeout.is_zero() {
            return Err(AuditError::Config(
                "--query-timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Credentials used to authenticate against every cluster in a run.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Use the given values, prompting for whatever is missing.
    pub fn resolve(username: Option<String>, password: Option<String>) -> Result<Self, AuditError> {
        let username = match username.filter(|u| !u.trim().is_empty()) {
            Some(u) => u.trim().to_string(),
            None => Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("Enter username")
                .validate_with(|input: &String| {
                    if input.trim().is_empty() {
                        Err("Username is required. Please try again.")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?
                .trim()
                .to_string(),
        };

        let password = match password {
            Some(p) => p,
            None => Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Enter password")
                .allow_empty_password(true)
                .interact()?,
        };

        Ok(Self { username, password })
    }
}
