use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The two live-update loops a page can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollKind {
    ScanStatus,
    ResultStatus,
}

impl fmt::Display for PollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollKind::ScanStatus => f.write_str("scan status"),
            PollKind::ResultStatus => f.write_str("result status"),
        }
    }
}

/// Produces ticks for a loop until its token is cancelled.
///
/// Ticks are only signals; whoever consumes them calls
/// [`crate::controller::Controller::on_tick`].
pub trait TickSource {
    fn spawn(&self, kind: PollKind, every: Duration, cancel: CancellationToken);
}

/// Timer-backed ticks delivered over a channel to the console loop.
pub struct IntervalTicks {
    tx: mpsc::UnboundedSender<PollKind>,
}

impl IntervalTicks {
    pub fn new(tx: mpsc::UnboundedSender<PollKind>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PollKind>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl TickSource for IntervalTicks {
    fn spawn(&self, kind: PollKind, every: Duration, cancel: CancellationToken) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // First tick one period after start, like setInterval.
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("{} loop cancelled", kind);
                        break;
                    }
                    _ = interval.tick() => {
                        if tx.send(kind).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

struct PollHandle {
    cancel: CancellationToken,
}

/// Registry of running poll loops, at most one per [`PollKind`].
pub struct Poller {
    source: Box<dyn TickSource>,
    loops: HashMap<PollKind, PollHandle>,
}

impl Poller {
    pub fn new(source: Box<dyn TickSource>) -> Self {
        Self {
            source,
            loops: HashMap::new(),
        }
    }

    /// Starts a loop unless one of that kind already runs. Returns whether a
    /// new loop was spawned.
    pub fn start(&mut self, kind: PollKind, every: Duration) -> bool {
        if self.loops.contains_key(&kind) {
            return false;
        }
        let cancel = CancellationToken::new();
        self.source.spawn(kind, every, cancel.clone());
        self.loops.insert(kind, PollHandle { cancel });
        tracing::info!("started {} loop every {:?}", kind, every);
        true
    }

    /// Cancels a loop. Returns whether one was running.
    pub fn stop(&mut self, kind: PollKind) -> bool {
        match self.loops.remove(&kind) {
            Some(handle) => {
                handle.cancel.cancel();
                tracing::info!("stopped {} loop", kind);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, kind: PollKind) -> bool {
        self.loops.contains_key(&kind)
    }

    pub fn stop_all(&mut self) {
        for (kind, handle) in self.loops.drain() {
            handle.cancel.cancel();
            tracing::debug!("stopped {} loop", kind);
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop_all();
    }
}
