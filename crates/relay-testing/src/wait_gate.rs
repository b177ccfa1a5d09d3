//! Cross-thread pass/fail gate with a bounded wait.
//!
//! A [`WaitGate`] lets a test thread block until some asynchronous callback
//! reports success or failure:
//!
//! ```rust,ignore
//! let gate = Arc::new(WaitGate::new());
//! let pass = gate.pass_handler();
//! let _ = conn.subscribe_once(|_: &Pong| true, move |_, _| pass(&()));
//! conn_peer.send(ping)?;
//! gate.wait(Duration::from_millis(500))?;
//! ```
//!
//! ## Resolution
//!
//! The gate holds a single atomic state, `Pending`, `Passed` or `Failed`.
//! Reports move it out of `Pending` with a compare-and-set, so the first
//! report wins and later ones are ignored. A pass report whose data the
//! gate's predicate rejects counts as a failure.
//!
//! ## Waiting
//!
//! [`wait`](WaitGate::wait) sleeps in short ticks and re-checks the state
//! until it resolves or the timeout elapses. The check looks for `Failed`
//! before `Passed`. There is no cancellation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::errors::{Result, WaitError};

const PENDING: u8 = 0;
const PASSED: u8 = 1;
const FAILED: u8 = 2;

/// Observed state of a [`WaitGate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// Nothing reported yet.
    Pending,
    /// A pass was reported and accepted.
    Passed,
    /// A failure was reported, or a pass was rejected.
    Failed,
}

type Predicate<D> = Box<dyn Fn(&D) -> bool + Send + Sync>;

/// Pass/fail signal shared between reporting threads and one waiter.
pub struct WaitGate<D = ()> {
    state: AtomicU8,
    accept: Predicate<D>,
    poll_interval: Duration,
}

impl<D> WaitGate<D> {
    /// A gate that accepts every pass report.
    pub fn new() -> Self {
        Self::with_predicate(|_| true)
    }

    /// A gate that accepts a pass report only if `accept` returns `true`
    /// for its data.
    pub fn with_predicate<P>(accept: P) -> Self
    where
        P: Fn(&D) -> bool + Send + Sync + 'static,
    {
        let settings = &relay_settings::get_settings().wait_gate;
        Self {
            state: AtomicU8::new(PENDING),
            accept: Box::new(accept),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
        }
    }

    /// Override how long [`wait`](Self::wait) sleeps between checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(WaitError::InvalidArgument(
                "poll interval must be non-zero".into(),
            ));
        }
        self.poll_interval = interval;
        Ok(self)
    }

    /// Report success. Resolves to `Failed` instead if the predicate rejects
    /// `data`.
    ///
    /// Returns `true` if this call resolved the gate.
    pub fn report_pass(&self, data: &D) -> bool {
        let target = if (self.accept)(data) { PASSED } else { FAILED };
        self.resolve(target)
    }

    /// Report failure.
    ///
    /// Returns `true` if this call resolved the gate.
    pub fn report_fail(&self, _data: &D) -> bool {
        self.resolve(FAILED)
    }

    fn resolve(&self, target: u8) -> bool {
        let won = self
            .state
            .compare_exchange(PENDING, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            debug!(outcome = ?decode(target), "wait gate resolved");
        }
        won
    }

    /// Current state, without waiting.
    pub fn outcome(&self) -> GateOutcome {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Block the calling thread until the gate resolves or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if let Some(result) = self.poll(start.elapsed(), timeout) {
                return result;
            }
            std::thread::sleep(self.next_tick(start.elapsed(), timeout));
        }
    }

    /// [`wait`](Self::wait) with a timeout in milliseconds.
    pub fn wait_ms(&self, timeout_ms: u64) -> Result<()> {
        self.wait(Duration::from_millis(timeout_ms))
    }

    /// [`wait`](Self::wait) with the configured default timeout.
    pub fn wait_default(&self) -> Result<()> {
        self.wait_ms(relay_settings::get_settings().wait_gate.default_timeout_ms)
    }

    /// Async counterpart of [`wait`](Self::wait) for tokio tests, sleeping
    /// on the runtime timer instead of the thread.
    pub async fn wait_async(&self, timeout: Duration) -> Result<()> {
        let start = tokio::time::Instant::now();
        loop {
            if let Some(result) = self.poll(start.elapsed(), timeout) {
                return result;
            }
            tokio::time::sleep(self.next_tick(start.elapsed(), timeout)).await;
        }
    }

    /// One poll interval, cut short so the last sleep ends at the deadline.
    fn next_tick(&self, elapsed: Duration, timeout: Duration) -> Duration {
        self.poll_interval.min(timeout.saturating_sub(elapsed))
    }

    fn poll(&self, elapsed: Duration, timeout: Duration) -> Option<Result<()>> {
        match self.outcome() {
            GateOutcome::Failed => Some(Err(WaitError::AssertionFailed)),
            GateOutcome::Passed => Some(Ok(())),
            GateOutcome::Pending if elapsed >= timeout => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                debug!(timeout_ms, "wait gate timed out");
                Some(Err(WaitError::Timeout { timeout_ms }))
            }
            GateOutcome::Pending => None,
        }
    }
}

impl<D: 'static> WaitGate<D> {
    /// A callback that calls [`report_pass`](Self::report_pass) on this gate.
    pub fn pass_handler(self: &Arc<Self>) -> impl Fn(&D) + Send + Sync + use<D> {
        let gate = Arc::clone(self);
        move |data: &D| {
            let _ = gate.report_pass(data);
        }
    }

    /// A callback that calls [`report_fail`](Self::report_fail) on this gate.
    pub fn fail_handler(self: &Arc<Self>) -> impl Fn(&D) + Send + Sync + use<D> {
        let gate = Arc::clone(self);
        move |data: &D| {
            let _ = gate.report_fail(data);
        }
    }
}

fn decode(state: u8) -> GateOutcome {
    match state {
        PASSED => GateOutcome::Passed,
        FAILED => GateOutcome::Failed,
        _ => GateOutcome::Pending,
    }
}

impl<D> Default for WaitGate<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for WaitGate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitGate")
            .field("outcome", &self.outcome())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
