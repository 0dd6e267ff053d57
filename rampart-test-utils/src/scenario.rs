use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rampart_broker::{MarketSnapshotProvider, ProviderError, ProviderErrorKind, ProviderResult};
use rampart_core::MarketSnapshot;
use tokio::sync::Mutex;

/// Scripted behavior for one `fetch` call.
#[derive(Clone, Debug)]
pub enum ScriptedResponse {
    Snapshots(Vec<MarketSnapshot>),
    Fail {
        kind: ProviderErrorKind,
        reason: String,
    },
    /// Wait before producing the inner response.
    Delay {
        after: Duration,
        then: Box<ScriptedResponse>,
    },
}

impl ScriptedResponse {
    /// Utility constructor for transient transport failures.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Fail {
            kind: ProviderErrorKind::Transport,
            reason: reason.into(),
        }
    }

    pub fn fail(kind: ProviderErrorKind, reason: impl Into<String>) -> Self {
        Self::Fail {
            kind,
            reason: reason.into(),
        }
    }

    pub fn delayed(after: Duration, then: ScriptedResponse) -> Self {
        Self::Delay {
            after,
            then: Box::new(then),
        }
    }
}

/// Snapshot provider that replays a queue of scripted responses.
///
/// Once the queue is drained every call produces the default response.
#[derive(Clone)]
pub struct ScriptedSnapshotProvider {
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    default: ScriptedResponse,
    calls: Arc<AtomicUsize>,
    name: String,
}

impl ScriptedSnapshotProvider {
    #[must_use]
    pub fn new(default: ScriptedResponse) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default,
            calls: Arc::new(AtomicUsize::new(0)),
            name: "scripted".to_string(),
        }
    }

    /// Provider that answers every call with the same snapshots.
    #[must_use]
    pub fn serving(snapshots: Vec<MarketSnapshot>) -> Self {
        Self::new(ScriptedResponse::Snapshots(snapshots))
    }

    /// Provider whose every call fails transiently.
    #[must_use]
    pub fn always_failing() -> Self {
        Self::new(ScriptedResponse::transient("scripted outage"))
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pushes a response to the back of the queue.
    pub async fn push(&self, response: ScriptedResponse) {
        self.script.lock().await.push_back(response);
    }

    /// Number of `fetch` calls observed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketSnapshotProvider for ScriptedSnapshotProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _quote_currency: &str) -> ProviderResult<Vec<MarketSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut response = {
            let mut guard = self.script.lock().await;
            guard.pop_front().unwrap_or_else(|| self.default.clone())
        };
        loop {
            match response {
                ScriptedResponse::Snapshots(snapshots) => return Ok(snapshots),
                ScriptedResponse::Fail { kind, reason } => {
                    return Err(ProviderError::from_display(reason, kind))
                }
                ScriptedResponse::Delay { after, then } => {
                    tokio::time::sleep(after).await;
                    response = *then;
                }
            }
        }
    }
}
