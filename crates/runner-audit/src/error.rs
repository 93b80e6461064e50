//! Error types for runner discovery, reporting, and cleanup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run before (or instead of) any cluster work.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The inventory file does not exist.
    #[error("Inventory file not found: {0}")]
    InventoryNotFound(PathBuf),

    /// A row of the inventory file could not be used.
    #[error("Invalid inventory row at line {line}: {message}")]
    InvalidInventory { line: u64, message: String },

    /// Options that cannot be combined, or other invalid settings.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A stored report could not be read back.
    #[error("Invalid report file {path}: {message}")]
    InvalidReport { path: PathBuf, message: String },

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Interactive prompt failed (no terminal, interrupted).
    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Errors raised while talking to a cluster.
///
/// None of these abort a run: authentication failures skip a cluster,
/// query failures yield zero rows for a namespace, and deletion failures
/// are recorded against the single action that failed.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credential exchange with the cluster's API endpoint failed.
    #[error("Authentication failed for {cluster}: {message}")]
    Auth { cluster: String, message: String },

    /// Listing runners in a namespace failed.
    #[error("Query failed in namespace {namespace}: {message}")]
    Query { namespace: String, message: String },

    /// Listing runners did not finish in time.
    #[error("Query in namespace {namespace} timed out after {secs}s")]
    Timeout { namespace: String, secs: u64 },

    /// Deleting a runner failed.
    #[error("Failed to delete {name} in namespace {namespace}: {message}")]
    Delete {
        namespace: String,
        name: String,
        message: String,
    },

    /// Kubernetes client error.
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}
