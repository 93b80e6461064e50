//! Runner lifecycle classification.
//!
//! The upstream status fields are replica counts that may be missing,
//! empty, or not numbers at all. Classification never fails: anything
//! that is neither clearly running nor clearly failed is pending.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a runner, derived from its ready/total counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum RunnerStatus {
    /// All desired replicas are ready.
    Running,
    /// Anything that is neither running nor failed.
    Pending,
    /// Zero replicas are ready.
    Failed,
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Pending => write!(f, "Pending"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for RunnerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            other => Err(format!(
                "Unknown runner status: {other}. Supported: running, pending, failed"
            )),
        }
    }
}

/// Classify a runner from its raw ready and total replica counts.
///
/// Precedence:
/// 1. `Failed` when ready is exactly `"0"`.
/// 2. `Running` when both counts are non-negative integers, equal, and non-zero.
/// 3. `Pending` for everything else, including missing or non-numeric fields.
pub fn classify(ready: Option<&str>, total: Option<&str>) -> RunnerStatus {
    let ready = ready.map(str::trim).filter(|v| !v.is_empty());
    let total = total.map(str::trim).filter(|v| !v.is_empty());

    if ready == Some("0") {
        return RunnerStatus::Failed;
    }

    let ready_count = ready.and_then(|v| v.parse::<u64>().ok());
    let total_count = total.and_then(|v| v.parse::<u64>().ok());

    match (ready_count, total_count) {
        (Some(r), Some(t)) if r == t && r != 0 => RunnerStatus::Running,
        _ => RunnerStatus::Pending,
    }
}
