use jiff::{SignedDuration, Timestamp};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Source of wall-clock time for a generator.
///
/// Readings are not required to be monotonic; the generator tolerates small
/// regressions and rejects large ones.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
    /// Returns once `now` would report `target` or later.
    fn wait_until(&self, target: Timestamp);
}

/// The operating system's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn wait_until(&self, target: Timestamp) {
        // Re-poll after every sleep or yield: the clock may be stepped while
        // we wait, and a sequence overflow must not park longer than a tick.
        loop {
            let now = Timestamp::now();
            if now >= target {
                return;
            }
            let remaining = now.duration_until(target);
            if remaining > SignedDuration::from_millis(1) {
                let remaining = Duration::try_from(remaining).unwrap_or(Duration::from_millis(1));
                std::thread::sleep(remaining);
            } else {
                std::thread::yield_now();
            }
        }
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep a handle while
/// the generator owns another. `wait_until` jumps straight to the target
/// instead of blocking.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            inner: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock to `to`, forwards or backwards.
    pub fn set(&self, to: Timestamp) {
        *self.lock() = to;
    }

    /// Moves the clock by `by`, which may be negative.
    pub fn advance(&self, by: SignedDuration) {
        let mut now = self.lock();
        *now = now.checked_add(by).unwrap_or(*now);
    }

    fn lock(&self) -> MutexGuard<'_, Timestamp> {
        // A panic while holding this lock cannot leave the timestamp half
        // written, so the poisoned value is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.lock()
    }

    fn wait_until(&self, target: Timestamp) {
        let mut now = self.lock();
        if target > *now {
            *now = target;
        }
    }
}
