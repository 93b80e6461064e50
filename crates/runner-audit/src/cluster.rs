//! Kubernetes-backed cluster access.
//!
//! Authentication shells out to `tkgi get-kubeconfig`, which writes a
//! context named after the cluster into the user's kubeconfig. Runner
//! listing and deletion then go through the Kubernetes API directly.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::SecondsFormat;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{ClusterTarget, Credentials};
use crate::error::SourceError;
use crate::runner::RawRunner;
use crate::source::{Authenticator, ClusterSession};

/// Actions Runner Controller `EphemeralRunner` API resource definition.
fn ephemeral_runner_api() -> ApiResource {
    ApiResource {
        group: "actions.github.com".to_string(),
        version: "v1alpha1".to_string(),
        api_version: "actions.github.com/v1alpha1".to_string(),
        kind: "EphemeralRunner".to_string(),
        plural: "ephemeralrunners".to_string(),
    }
}

/// Authenticates through the `tkgi` CLI.
#[derive(Debug, Clone)]
pub struct TkgiAuthenticator {
    /// Path or name of the tkgi binary.
    pub binary: String,
    /// Pass `-k` to skip TLS verification of the API endpoint.
    pub skip_tls_verify: bool,
    /// Kubeconfig to read after login; defaults to the standard location.
    /// May list several files joined like `KUBECONFIG`.
    pub kubeconfig: Option<PathBuf>,
}

impl Default for TkgiAuthenticator {
    fn default() -> Self {
        Self {
            binary: "tkgi".to_string(),
            skip_tls_verify: true,
            kubeconfig: None,
        }
    }
}

impl TkgiAuthenticator {
    async fn login(
        &self,
        target: &ClusterTarget,
        credentials: &Credentials,
    ) -> Result<(), SourceError> {
        let auth_err = |message: String| SourceError::Auth {
            cluster: target.cluster.clone(),
            message,
        };

        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "get-kubeconfig",
            target.cluster.as_str(),
            "-u",
            credentials.username.as_str(),
            "-a",
            target.api_endpoint.as_str(),
        ]);
        if self.skip_tls_verify {
            cmd.arg("-k");
        }
        if let Some(path) = &self.kubeconfig {
            cmd.env("KUBECONFIG", path);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| auth_err(format!("failed to run {}: {e}", self.binary)))?;

        // Password goes over stdin so it never shows up in the process list.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(format!("{}\n", credentials.password).as_bytes())
                .await
                .map_err(|e| auth_err(format!("failed to send password: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| auth_err(format!("failed to wait for {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(auth_err(stderr.trim().to_string()));
        }
        Ok(())
    }

    async fn client_for(&self, target: &ClusterTarget) -> Result<Client, SourceError> {
        let kubeconfig =
            load_kubeconfig(self.kubeconfig.as_deref()).map_err(|e| SourceError::Auth {
                cluster: target.cluster.clone(),
                message: format!("failed to read kubeconfig: {e}"),
            })?;

        let options = KubeConfigOptions {
            context: Some(target.cluster.clone()),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| SourceError::Auth {
                cluster: target.cluster.clone(),
                message: format!("failed to load context {}: {e}", target.cluster),
            })?;

        Ok(Client::try_from(config)?)
    }
}

/// Read the kubeconfig at `path`, or the default one (`KUBECONFIG`, then
/// `~/.kube/config`) when no path is given.
///
/// `path` may be a list of files joined with the platform path separator.
/// They are merged in order and the first definition of a name wins.
fn load_kubeconfig(path: Option<&Path>) -> Result<Kubeconfig, KubeconfigError> {
    let Some(path) = path else {
        return Kubeconfig::read();
    };

    let mut merged: Option<Kubeconfig> = None;
    for file in std::env::split_paths(path).filter(|p| !p.as_os_str().is_empty()) {
        let next = Kubeconfig::read_from(&file)?;
        merged = Some(match merged {
            Some(config) => config.merge(next)?,
            None => next,
        });
    }

    match merged {
        Some(config) => Ok(config),
        None => Kubeconfig::read(),
    }
}

#[async_trait]
impl Authenticator for TkgiAuthenticator {
    type Session = KubeSession;

    async fn authenticate(
        &self,
        target: &ClusterTarget,
        credentials: &Credentials,
    ) -> Result<Self::Session, SourceError> {
        info!(cluster = %target.cluster, api = %target.api_endpoint, "Fetching kubeconfig");
        self.login(target, credentials).await?;
        let client = self.client_for(target).await?;
        Ok(KubeSession::new(client))
    }
}

/// Runner access through an authenticated Kubernetes client.
#[derive(Clone)]
pub struct KubeSession {
    client: Client,
    resource: ApiResource,
}

impl KubeSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: ephemeral_runner_api(),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }
}

#[async_trait]
impl ClusterSession for KubeSession {
    async fn list_runners(&self, namespace: &str) -> Result<Vec<RawRunner>, SourceError> {
        let list = match self.api(namespace).list(&ListParams::default()).await {
            Ok(list) => list,
            // CRD not installed or namespace gone: nothing to report
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(namespace, "No ephemeral runner resources");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SourceError::Query {
                    namespace: namespace.to_string(),
                    message: e.to_string(),
                })
            }
        };

        Ok(list.items.iter().map(raw_runner).collect())
    }

    async fn delete_runner(&self, namespace: &str, name: &str) -> Result<(), SourceError> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| SourceError::Delete {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Pull the status fields out of an `EphemeralRunner` object.
fn raw_runner(obj: &DynamicObject) -> RawRunner {
    let field = |section: &str, key: &str| {
        obj.data
            .get(section)
            .and_then(|s| s.get(key))
            .and_then(value_text)
    };

    RawRunner {
        name: obj.metadata.name.clone().unwrap_or_default(),
        config_url: field("spec", "githubConfigUrl"),
        runner_id: field("status", "runnerId"),
        ready: field("status", "readyReplicas"),
        total: field("status", "replicas"),
        created_at: obj
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|ts| ts.0.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

/// Render a scalar JSON value as text; anything else counts as missing.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
