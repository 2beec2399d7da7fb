use std::sync::Arc;
use std::time::Duration;

use sovereign_gate::{Canonicalizer, GatedKey};
use sovereign_types::{GovernanceError, GovernanceResult};
use tokio::sync::watch;
use tracing::{info, warn};

/// Publishes the identity table exactly once.
///
/// Consumed by [`TablePublisher::publish`], so the table can never be
/// replaced after inputs have started flowing.
#[derive(Debug)]
pub struct TablePublisher {
    tx: watch::Sender<Option<Arc<Canonicalizer>>>,
}

impl TablePublisher {
    pub fn publish(self, table: Canonicalizer) {
        info!(identities = table.len(), "Identity table published");
        // Receivers may already be gone; a later admit then just times out.
        let _ = self.tx.send(Some(Arc::new(table)));
    }
}

/// Admission point for external identifiers.
///
/// An identifier that arrives before the identity table is ready waits at
/// most the configured timeout and is then rejected as unknown. It is never
/// forwarded uncanonicalized.
#[derive(Clone, Debug)]
pub struct Ingress {
    rx: watch::Receiver<Option<Arc<Canonicalizer>>>,
    timeout: Duration,
}

impl Ingress {
    pub fn channel(timeout: Duration) -> (TablePublisher, Ingress) {
        let (tx, rx) = watch::channel(None);
        (TablePublisher { tx }, Ingress { rx, timeout })
    }

    /// An ingress over a table that is already available.
    pub fn ready(table: Arc<Canonicalizer>, timeout: Duration) -> Self {
        let (_tx, rx) = watch::channel(Some(table));
        Self { rx, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Canonicalize `identifier`, waiting for the table if needed.
    pub async fn admit(&self, identifier: &str) -> GovernanceResult<GatedKey> {
        let table = self.table().await.ok_or_else(|| {
            warn!(identifier, timeout_ms = self.timeout.as_millis() as u64, "Identity table not ready");
            GovernanceError::UnknownIdentifier(identifier.to_string())
        })?;
        table.resolve(identifier)
    }

    async fn table(&self) -> Option<Arc<Canonicalizer>> {
        let mut rx = self.rx.clone();
        // A table published before the sender dropped is still seen here.
        let table = match tokio::time::timeout(self.timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(table)) => (*table).clone(),
            Ok(Err(_)) | Err(_) => None,
        };
        table
    }
}
