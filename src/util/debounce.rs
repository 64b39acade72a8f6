use std::time::Duration;
use tokio::time::Instant;

/// A debounced action: the latest triggered value fires once the quiet period
/// has elapsed without a further trigger.
///
/// The primitive never schedules anything itself. Owners call [`trigger`] on
/// every change and [`poll`] when the runtime wakes up; [`deadline`] tells the
/// runtime when that should be. A later trigger always supersedes the pending
/// one, so at most one value fires per quiet period and it is the last one.
///
/// [`trigger`]: Debounced::trigger
/// [`poll`]: Debounced::poll
/// [`deadline`]: Debounced::deadline
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounced<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Record `value` and restart the quiet period from `now`.
    pub fn trigger(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.quiet));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Take the pending value if its quiet period has elapsed at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if *at <= now => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Drop the pending value without firing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}
