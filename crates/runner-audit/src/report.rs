//! The consolidated runner report and the read-only views built over it.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::AuditError;
use crate::runner::RunnerRecord;
use crate::status::RunnerStatus;

/// Column header of the report file. Downstream tooling depends on this order.
pub const REPORT_HEADER: [&str; 9] = [
    "Cluster",
    "API_Endpoint",
    "Namespace",
    "Org_Name",
    "Runner_Name",
    "Config_URL",
    "Runner_ID",
    "Age",
    "Status",
];

/// Name of the stable copy of the most recent report.
pub const LATEST_REPORT: &str = "ephemeral_runners_report.csv";

/// All runners discovered in one run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    rows: Vec<RunnerRecord>,
    collected_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn new(collected_at: DateTime<Utc>) -> Self {
        Self {
            rows: Vec::new(),
            collected_at: Some(collected_at),
        }
    }

    pub fn from_rows(rows: Vec<RunnerRecord>) -> Self {
        Self {
            rows,
            collected_at: None,
        }
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = RunnerRecord>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[RunnerRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// When the rows were collected; unknown for reports loaded from disk.
    pub fn collected_at(&self) -> Option<DateTime<Utc>> {
        self.collected_at
    }

    /// Per-org status counts plus grand totals.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        let mut index: HashMap<OrgKey, usize> = HashMap::new();

        for row in &self.rows {
            let key = OrgKey::new(&row.org);
            let slot = *index.entry(key).or_insert_with(|| {
                summary.orgs.push(OrgSummary {
                    org: row.org.clone(),
                    counts: StatusCounts::default(),
                });
                summary.orgs.len() - 1
            });
            summary.orgs[slot].counts.add(row.status);
            summary.totals.add(row.status);
        }

        summary
    }

    /// Rows matching `filter`, in report order.
    pub fn filter(&self, filter: &RunnerFilter) -> Vec<&RunnerRecord> {
        self.rows.iter().filter(|row| filter.matches(row)).collect()
    }

    /// Rows grouped by cluster, then namespace, in first-seen order.
    pub fn details(&self) -> Vec<ClusterDetails<'_>> {
        let mut clusters: Vec<ClusterDetails<'_>> = Vec::new();

        for row in &self.rows {
            let found = clusters
                .iter()
                .position(|c| c.cluster == row.cluster && c.api_endpoint == row.api_endpoint);
            let pos = match found {
                Some(pos) => pos,
                None => {
                    clusters.push(ClusterDetails {
                        cluster: row.cluster.clone(),
                        api_endpoint: row.api_endpoint.clone(),
                        namespaces: Vec::new(),
                    });
                    clusters.len() - 1
                }
            };
            let cluster = &mut clusters[pos];

            match cluster
                .namespaces
                .iter_mut()
                .find(|(ns, _)| *ns == row.namespace)
            {
                Some((_, rows)) => rows.push(row),
                None => cluster.namespaces.push((row.namespace.clone(), vec![row])),
            }
        }

        clusters
    }

    /// Serialize the report as CSV with the fixed header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), AuditError> {
        let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        csv.write_record(REPORT_HEADER)?;
        for row in &self.rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Load a report previously written by [`Report::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self, AuditError> {
        let invalid = |message: String| AuditError::InvalidReport {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        if !headers.iter().eq(REPORT_HEADER) {
            return Err(invalid(format!(
                "unexpected header: {}",
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }

        let mut rows = Vec::new();
        for record in reader.deserialize::<RunnerRecord>() {
            rows.push(record.map_err(|e| invalid(e.to_string()))?);
        }
        Ok(Self::from_rows(rows))
    }

    /// Write the report into `dir` as a timestamped file, then refresh the
    /// stable latest-report copy. Returns the timestamped path.
    ///
    /// Each file is written to a temporary file in the same directory and
    /// renamed into place, so readers never see a partial report.
    pub fn persist(&self, dir: &Path, stamp: DateTime<Utc>) -> Result<PathBuf, AuditError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(report_file_name(stamp));

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.write_csv(tmp.as_file_mut())?;
        tmp.persist(&path).map_err(|e| AuditError::Io(e.error))?;

        let mut latest = tempfile::NamedTempFile::new_in(dir)?;
        latest.write_all(&fs::read(&path)?)?;
        latest
            .persist(dir.join(LATEST_REPORT))
            .map_err(|e| AuditError::Io(e.error))?;

        info!(path = %path.display(), rows = self.rows.len(), "Report written");
        Ok(path)
    }
}

/// `ephemeral_runner_report_<YYYYmmdd_HHMM>.csv`
pub fn report_file_name(stamp: DateTime<Utc>) -> String {
    format!("ephemeral_runner_report_{}.csv", stamp.format("%Y%m%d_%H%M"))
}

/// Case-insensitive org identity used for grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgKey(String);

impl OrgKey {
    pub fn new(org: &str) -> Self {
        Self(org.trim().to_lowercase())
    }
}

/// Running/failed/pending/total counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub running: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
}

impl StatusCounts {
    fn add(&mut self, status: RunnerStatus) {
        match status {
            RunnerStatus::Running => self.running += 1,
            RunnerStatus::Failed => self.failed += 1,
            RunnerStatus::Pending => self.pending += 1,
        }
        self.total += 1;
    }
}

/// Counts for one org, displayed under the first spelling encountered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrgSummary {
    pub org: String,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub orgs: Vec<OrgSummary>,
    pub totals: StatusCounts,
}

/// Which orgs a filtered view includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgFilter {
    All,
    Only(OrgKey),
}

impl OrgFilter {
    /// `--all-orgs` wins over `--org`; neither means all orgs.
    pub fn from_options(org: Option<&str>, all_orgs: bool) -> Self {
        match org.map(str::trim).filter(|o| !o.is_empty()) {
            Some(org) if !all_orgs => Self::Only(OrgKey::new(org)),
            _ => Self::All,
        }
    }

    pub fn matches(&self, org: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(key) => *key == OrgKey::new(org),
        }
    }
}

/// Selects rows by status and org.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerFilter {
    pub status: RunnerStatus,
    pub org: OrgFilter,
}

impl RunnerFilter {
    pub fn new(status: RunnerStatus, org: OrgFilter) -> Self {
        Self { status, org }
    }

    pub fn matches(&self, row: &RunnerRecord) -> bool {
        row.status == self.status && self.org.matches(&row.org)
    }
}

/// Rows of one cluster grouped by namespace.
#[derive(Debug)]
pub struct ClusterDetails<'a> {
    pub cluster: String,
    pub api_endpoint: String,
    pub namespaces: Vec<(String, Vec<&'a RunnerRecord>)>,
}

impl ClusterDetails<'_> {
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for (_, rows) in &self.namespaces {
            for row in rows {
                counts.add(row.status);
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::Age;
    use chrono::TimeZone;

    fn row(cluster: &str, ns: &str, org: &str, name: &str, status: RunnerStatus) -> RunnerRecord {
        RunnerRecord {
            cluster: cluster.into(),
            api_endpoint: format!("https://api.{cluster}"),
            namespace: ns.into(),
            org: org.into(),
            name: name.into(),
            config_url: format!("https://github.com/{org}"),
            runner_id: "7".into(),
            age: Age::Minutes(3),
            status,
        }
    }

    fn sample() -> Report {
        use RunnerStatus::{Failed, Pending, Running};
        Report::from_rows(vec![
            row("c1", "ns-a", "Acme", "r1", Running),
            row("c1", "ns-a", "acme", "r2", Pending),
            row("c1", "ns-b", "ACME", "r3", Failed),
            row("c2", "ns-a", "Other", "r4", Pending),
            row("c2", "ns-a", "Other", "r5", Running),
            row("c2", "ns-c", "", "r6", Pending),
        ])
    }

    #[test]
    fn test_summary_normalizes_org_case() {
        let summary = sample().summary();

        assert_eq!(summary.orgs.len(), 3);
        assert_eq!(summary.orgs[0].org, "Acme");
        assert_eq!(
            summary.orgs[0].counts,
            StatusCounts {
                running: 1,
                failed: 1,
                pending: 1,
                total: 3
            }
        );
        assert_eq!(summary.orgs[1].org, "Other");
        assert_eq!(summary.orgs[2].org, "");
    }

    #[test]
    fn test_summary_is_an_exact_partition() {
        let report = sample();
        let summary = report.summary();

        let per_org: usize = summary
            .orgs
            .iter()
            .map(|o| o.counts.running + o.counts.failed + o.counts.pending)
            .sum();
        assert_eq!(per_org, report.len());
        assert_eq!(summary.totals.total, report.len());
        assert_eq!(
            summary.totals.running + summary.totals.failed + summary.totals.pending,
            report.len()
        );
    }

    #[test]
    fn test_summary_is_idempotent() {
        let report = sample();
        assert_eq!(report.summary(), report.summary());
    }

    #[test]
    fn test_filter_by_status_and_org() {
        let report = sample();

        let pending_all = report.filter(&RunnerFilter::new(RunnerStatus::Pending, OrgFilter::All));
        assert_eq!(pending_all.len(), 3);

        let acme = OrgFilter::from_options(Some("aCmE"), false);
        let pending_acme = report.filter(&RunnerFilter::new(RunnerStatus::Pending, acme));
        assert_eq!(pending_acme.len(), 1);
        assert_eq!(pending_acme[0].name, "r2");
    }

    #[test]
    fn test_org_filter_options() {
        assert_eq!(OrgFilter::from_options(None, false), OrgFilter::All);
        assert_eq!(OrgFilter::from_options(Some("acme"), true), OrgFilter::All);
        assert_eq!(OrgFilter::from_options(Some("  "), false), OrgFilter::All);
        assert!(OrgFilter::from_options(Some("Acme"), false).matches("ACME"));
        assert!(!OrgFilter::from_options(Some("Acme"), false).matches("Acme2"));
    }

    #[test]
    fn test_details_grouping() {
        let report = sample();
        let details = report.details();

        assert_eq!(details.len(), 2);
        assert_eq!(details[0].cluster, "c1");
        assert_eq!(details[0].namespaces.len(), 2);
        assert_eq!(details[0].namespaces[0].1.len(), 2);
        assert_eq!(details[0].counts().running, 1);
        assert_eq!(details[1].counts().total, 3);
    }

    #[test]
    fn test_csv_header_and_reload() {
        let report = sample();
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            "Cluster,API_Endpoint,Namespace,Org_Name,Runner_Name,Config_URL,Runner_ID,Age,Status"
        );
        assert!(text.contains("c1,https://api.c1,ns-a,Acme,r1,https://github.com/Acme,7,3m,Running"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        fs::write(&path, &text).unwrap();
        let loaded = Report::read_csv(&path).unwrap();
        assert_eq!(loaded.rows(), report.rows());
    }

    #[test]
    fn test_read_rejects_foreign_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
        assert!(matches!(
            Report::read_csv(&path),
            Err(AuditError::InvalidReport { .. })
        ));
    }

    #[test]
    fn test_persist_writes_timestamped_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = Utc.with_ymd_and_hms(2024, 5, 1, 9, 7, 0).unwrap();

        let path = sample().persist(dir.path(), stamp).unwrap();

        assert_eq!(
            path.file_name().unwrap(),
            "ephemeral_runner_report_20240501_0907.csv"
        );
        let written = fs::read_to_string(&path).unwrap();
        let latest = fs::read_to_string(dir.path().join(LATEST_REPORT)).unwrap();
        assert_eq!(written, latest);
        assert_eq!(written.lines().count(), 7);
    }
}
