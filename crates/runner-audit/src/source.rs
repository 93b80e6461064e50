//! Seams to the outside world: authenticating against a cluster, listing
//! runners in a namespace, and deleting a runner.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{ClusterTarget, Credentials};
use crate::error::SourceError;
use crate::runner::RawRunner;
use crate::ui;

/// An authenticated connection to one cluster.
///
/// Shared read-only by every worker that queries the cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterSession: Send + Sync {
    /// List all runners in a namespace. An empty namespace is `Ok(vec![])`.
    async fn list_runners(&self, namespace: &str) -> Result<Vec<RawRunner>, SourceError>;

    /// Delete one runner by name.
    async fn delete_runner(&self, namespace: &str, name: &str) -> Result<(), SourceError>;
}

/// Exchanges credentials for a [`ClusterSession`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    type Session: ClusterSession + 'static;

    async fn authenticate(
        &self,
        target: &ClusterTarget,
        credentials: &Credentials,
    ) -> Result<Self::Session, SourceError>;
}

/// Authenticates each cluster at most once per run.
///
/// One cache is shared by every phase of a run (collection, then deletion).
/// Failures are remembered too, so a cluster that rejected the credentials
/// is skipped for the rest of the run without another attempt.
pub struct SessionCache<A: Authenticator> {
    authenticator: A,
    credentials: Credentials,
    sessions: HashMap<ClusterTarget, Option<Arc<A::Session>>>,
}

impl<A: Authenticator> SessionCache<A> {
    pub fn new(authenticator: A, credentials: Credentials) -> Self {
        Self {
            authenticator,
            credentials,
            sessions: HashMap::new(),
        }
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Session for `target`, authenticating on first use.
    ///
    /// Returns `None` when authentication failed (now or earlier in the run).
    pub async fn session(&mut self, target: &ClusterTarget) -> Option<Arc<A::Session>> {
        if let Some(cached) = self.sessions.get(target) {
            return cached.clone();
        }

        let session = match self
            .authenticator
            .authenticate(target, &self.credentials)
            .await
        {
            Ok(session) => {
                info!(cluster = %target.cluster, api = %target.api_endpoint, "Authenticated");
                Some(Arc::new(session))
            }
            Err(e) => {
                warn!(cluster = %target.cluster, error = %e, "Authentication failed, skipping cluster");
                ui::print_warning(&format!(
                    "Authentication failed for {}. Skipping.",
                    target.cluster
                ));
                None
            }
        };

        self.sessions.insert(target.clone(), session.clone());
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuth {
        calls: AtomicUsize,
        reject: &'static str,
    }

    #[async_trait]
    impl Authenticator for CountingAuth {
        type Session = MockClusterSession;

        async fn authenticate(
            &self,
            target: &ClusterTarget,
            _credentials: &Credentials,
        ) -> Result<Self::Session, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if target.cluster == self.reject {
                return Err(SourceError::Auth {
                    cluster: target.cluster.clone(),
                    message: "bad credentials".into(),
                });
            }
            Ok(MockClusterSession::new())
        }
    }

    #[tokio::test]
    async fn test_authenticates_once_per_cluster() {
        let auth = CountingAuth {
            calls: AtomicUsize::new(0),
            reject: "bad",
        };
        let mut cache = SessionCache::new(auth, Credentials::new("u", "p"));

        let good = ClusterTarget::new("good", "https://api.good");
        let bad = ClusterTarget::new("bad", "https://api.bad");

        assert!(cache.session(&good).await.is_some());
        assert!(cache.session(&good).await.is_some());
        assert!(cache.session(&bad).await.is_none());
        assert!(cache.session(&bad).await.is_none());

        assert_eq!(cache.authenticator().calls.load(Ordering::SeqCst), 2);
    }
}
