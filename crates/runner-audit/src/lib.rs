//! Ephemeral runner discovery, reporting, and cleanup.
//!
//! The pieces, leaf first:
//! - [`status`] and [`age`] turn raw upstream fields into a lifecycle
//!   state and an age.
//! - [`collector`] queries every namespace of a group under a concurrency
//!   ceiling.
//! - [`fleet`] walks the groups cluster by cluster, authenticating once per
//!   cluster.
//! - [`report`] aggregates and filters the result.
//! - [`delete`] plans and executes confirmed deletions.
//!
//! # Example
//!
//! ```ignore
//! use runner_audit::{collect_fleet, Collector, CollectSettings, Credentials, Inventory, SessionCache};
//! use runner_audit::cluster::TkgiAuthenticator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = CollectSettings::default();
//!     let groups = Inventory::load("clusters.csv".as_ref())?.groups(&settings)?;
//!     let mut sessions =
//!         SessionCache::new(TkgiAuthenticator::default(), Credentials::resolve(None, None)?);
//!     let run = collect_fleet(
//!         &mut sessions,
//!         &groups,
//!         &Collector::new(&settings),
//!         chrono::Utc::now(),
//!     )
//!     .await;
//!     println!("{} runners", run.report.len());
//!     Ok(())
//! }
//! ```

pub mod age;
pub mod cluster;
pub mod collector;
pub mod config;
pub mod delete;
pub mod error;
pub mod fleet;
pub mod render;
pub mod report;
pub mod runner;
pub mod source;
pub mod status;
pub mod ui;

// Re-export commonly used types at the crate root
pub use collector::Collector;
pub use config::{ClusterTarget, CollectSettings, Credentials, Inventory, NamespaceGroup};
pub use error::{AuditError, SourceError};
pub use fleet::{collect_fleet, FleetRun};
pub use report::Report;
pub use runner::{RawRunner, RunnerRecord};
pub use source::{Authenticator, ClusterSession, SessionCache};
pub use status::{classify, RunnerStatus};
