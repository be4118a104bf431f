//! Manager state machine — in-flight bookkeeping, release stack, and
//! the close-once drain.

use std::mem;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use crate::action::{IntoAcquire, IntoRelease};
use crate::config::ManagerConfig;
use crate::deadline;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Manager lifecycle state.
///
/// Transitions strictly `Open -> Closing -> Closed`, each exactly once.
/// The first `close` call performs the `Open -> Closing` transition;
/// `Closing -> Closed` happens once the drain loop has attempted every
/// registered release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Accepting `add` and `close`.
    #[default]
    Open,
    /// The first `close` is waiting out in-flight acquisitions or
    /// draining the release stack. New registrations are rejected.
    Closing,
    /// Terminal: the release stack has been fully drained.
    Closed,
}

impl Lifecycle {
    /// Whether this state accepts new registrations.
    #[must_use]
    pub fn accepts_add(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether this is the terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Point-in-time counters for a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    /// Current lifecycle state.
    pub lifecycle: Lifecycle,
    /// Release actions currently registered and not yet drained.
    pub registered: usize,
    /// Acquisitions currently in flight.
    pub pending: usize,
    /// Release actions attempted so far, successful or not.
    pub released: u64,
}

// ---------------------------------------------------------------------------
// Manager internals
// ---------------------------------------------------------------------------

/// A registered release action, bound to its resource and wrapped with
/// the configured deadline. Lazy until the drain polls it.
type ReleaseAction = BoxFuture<'static, Result<()>>;

/// Mutable state. The mutex around it is only ever held for field
/// access, never across a suspension point.
struct State {
    lifecycle: Lifecycle,
    /// Release actions in acquisition-completion order; push on add,
    /// pop on drain.
    releases: Vec<ReleaseAction>,
    /// One receiver per in-flight acquisition. The paired sender is
    /// dropped when the acquisition settles, whatever the outcome, so
    /// a drain can wait for the set without caring how it settles.
    pending: Vec<oneshot::Receiver<()>>,
    released: u64,
}

struct Inner {
    config: ManagerConfig,
    state: Mutex<State>,
    /// Terminal outcome broadcast: `None` until the first `close`
    /// finishes draining, then `Some` forever. Late and concurrent
    /// `close` callers clone the stored outcome from here.
    outcome_tx: watch::Sender<Option<Result<()>>>,
    outcome_rx: watch::Receiver<Option<Result<()>>>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Tracks externally-acquired resources and tears every one of them
/// down exactly once, in reverse acquisition-completion order, when
/// [`close`](Manager::close) runs or an acquisition fails.
///
/// Cloning is cheap and shares the underlying state.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<Inner>,
}

impl Manager {
    /// Create a manager with the default configuration (no deadlines).
    #[must_use]
    pub fn new() -> Self {
        Self::build(ManagerConfig::default())
    }

    /// Create a manager with the given configuration.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid.
    pub fn with_config(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ManagerConfig) -> Self {
        let (outcome_tx, outcome_rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    lifecycle: Lifecycle::Open,
                    releases: Vec::new(),
                    pending: Vec::new(),
                    released: 0,
                }),
                outcome_tx,
                outcome_rx,
            }),
        }
    }

    /// Acquire a resource and register its release.
    ///
    /// `acquire` may be a ready future or a zero-argument closure
    /// producing one; `release` may be an async closure or a plain
    /// closure returning `Result` (see [`IntoAcquire`] and
    /// [`IntoRelease`]). When the acquisition completes, the release is
    /// bound to the produced resource and pushed onto the stack, and
    /// the resource is returned shared between the caller and the
    /// pending teardown.
    ///
    /// On acquisition failure everything registered so far is torn
    /// down before the failure is surfaced; if that teardown fails as
    /// well, its aggregated failure is attached via
    /// [`Error::teardown_failure`] while the acquisition failure stays
    /// primary.
    ///
    /// # Errors
    /// Fails with a closed or closing error — without invoking either
    /// action — once `close` has been called, with a timeout error when
    /// `acquire_timeout` expires, and with an acquire error when the
    /// action itself fails.
    pub async fn add<T, A, R, SA, SR>(&self, acquire: A, release: R) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        A: IntoAcquire<T, SA>,
        R: IntoRelease<T, SR>,
    {
        let acquire = acquire.into_acquire();

        // Lifecycle check and pending registration are one critical
        // section: once a drain decides what to wait for, no new
        // acquisition can slip past it.
        let settled = {
            let mut state = self.inner.state.lock();
            match state.lifecycle {
                Lifecycle::Open => {}
                Lifecycle::Closing => return Err(Error::closing()),
                Lifecycle::Closed => return Err(Error::closed()),
            }
            let (tx, rx) = oneshot::channel();
            state.pending.push(rx);
            tx
        };

        let outcome = deadline::maybe_within(self.inner.config.acquire_timeout, acquire).await;

        let resource = match outcome {
            Ok(Ok(resource)) => Arc::new(resource),
            Ok(Err(source)) => {
                return self.acquisition_failed(Error::acquire(source), settled).await;
            }
            Err(timeout) => {
                return self.acquisition_failed(timeout, settled).await;
            }
        };

        // Bind the release now so the stack entry owns everything it
        // needs; the entry stays lazy until the drain polls it.
        let bound = release.into_release(Arc::clone(&resource));
        let limit = self.inner.config.release_timeout;
        let entry: ReleaseAction = async move {
            match deadline::maybe_within(limit, bound).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(Error::release(source)),
                Err(timeout) => Err(timeout),
            }
        }
        .boxed();

        {
            let mut state = self.inner.state.lock();
            state.releases.push(entry);
            tracing::debug!(depth = state.releases.len(), "registered release");
        }

        // Settle only after the push: a drain waiting on this
        // acquisition must observe the stack entry.
        self.settle(settled);

        Ok(resource)
    }

    /// Mark one acquisition as settled and drop settled entries from
    /// the pending set. A drain that already snapshotted the set sees
    /// the settlement through the dropped sender instead.
    fn settle(&self, tx: oneshot::Sender<()>) {
        drop(tx);
        let mut state = self.inner.state.lock();
        state
            .pending
            .retain_mut(|rx| matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
    }

    /// Failed-acquire path: settle the pending slot, cascade a full
    /// teardown, and attach its failure (if any) to `err`.
    async fn acquisition_failed<T>(&self, err: Error, settled: oneshot::Sender<()>) -> Result<T> {
        self.settle(settled);
        tracing::warn!(error = %err, "acquisition failed; tearing down");
        match self.close().await {
            Ok(()) => Err(err),
            Err(teardown) => Err(err.with_teardown(teardown)),
        }
    }

    /// Tear down every registered resource, most recent first.
    ///
    /// Only the first invocation drains; every caller — first, later,
    /// or concurrent — resolves to the same outcome. Draining waits for
    /// in-flight acquisitions to settle first, so a resource whose
    /// acquisition completes concurrently with the close is still torn
    /// down, never lost.
    ///
    /// # Errors
    /// If any release fails, the first failure in drain order is
    /// returned with the remaining ones attached in order via
    /// [`Error::secondary`]. Every registered release is attempted
    /// regardless.
    pub async fn close(&self) -> Result<()> {
        let drainer = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Open {
                state.lifecycle = Lifecycle::Closing;
                true
            } else {
                false
            }
        };

        if !drainer {
            return self.wait_outcome().await;
        }

        let outcome = self.drain().await;
        // Nobody listening is fine; the value stays stored for late
        // callers either way.
        let _ = self.inner.outcome_tx.send(Some(outcome.clone()));
        outcome
    }

    /// Await the outcome stored by the draining `close` caller.
    async fn wait_outcome(&self) -> Result<()> {
        let mut rx = self.inner.outcome_rx.clone();
        let stored = rx
            .wait_for(Option::is_some)
            .await
            .expect("outcome sender dropped while manager alive");
        (*stored)
            .clone()
            .expect("wait_for yielded without a stored outcome")
    }

    /// Drain the release stack after waiting out in-flight
    /// acquisitions. Runs in exactly one `close` caller.
    async fn drain(&self) -> Result<()> {
        // Snapshot the pending set. New adds are already rejected, so
        // from here the set can only settle.
        let pending = {
            let mut state = self.inner.state.lock();
            mem::take(&mut state.pending)
        };
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "waiting for in-flight acquisitions");
            // A dropped sender counts as settled; the acquisition
            // outcome itself does not matter here.
            join_all(pending).await;
        }

        tracing::debug!(
            depth = self.inner.state.lock().releases.len(),
            "draining release stack"
        );

        let mut failures: Vec<Error> = Vec::new();
        loop {
            let Some(release) = self.inner.state.lock().releases.pop() else {
                break;
            };
            let result = release.await;
            self.inner.state.lock().released += 1;
            if let Err(err) = result {
                tracing::warn!(error = %err, "release failed; continuing drain");
                failures.push(err);
            }
        }

        self.inner.state.lock().lifecycle = Lifecycle::Closed;
        tracing::debug!(failures = failures.len(), "drain complete");

        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some(primary) => Err(primary.with_other(failures.collect())),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    /// Whether the manager reached its terminal state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle().is_terminal()
    }

    /// Point-in-time counters.
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        let state = self.inner.state.lock();
        ManagerStats {
            lifecycle: state.lifecycle,
            registered: state.releases.len(),
            pending: state.pending.len(),
            released: state.released,
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Manager")
            .field("lifecycle", &state.lifecycle)
            .field("registered", &state.releases.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
