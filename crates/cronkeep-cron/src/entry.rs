//! A single registered job and the capabilities a trigger engine drives.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::pattern::Pattern;
use crate::status::{LifecycleState, Status};

/// Job body invoked each time an entry fires.
pub type Job = Arc<dyn Fn() + Send + Sync>;

/// Configuration applied to an entry before it is published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryOptions {
    pub singleton: bool,
    /// `None` runs forever.
    pub times: Option<u64>,
}

/// Result of asking an entry to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job body ran.
    Executed,
    /// Entry is stopped.
    Stopped,
    /// Entry is closed, by removal or because its runs are used up.
    Closed,
    /// Singleton entry whose previous execution has not finished.
    InFlight,
}

pub struct Entry {
    id: i64,
    name: String,
    pattern: Pattern,
    job: Job,
    registered_at: DateTime<Utc>,
    status: LifecycleState,
    singleton: AtomicBool,
    /// Whether `remaining` applies at all.
    limited: AtomicBool,
    remaining: AtomicU64,
    in_flight: AtomicBool,
}

impl Entry {
    pub(crate) fn new(
        id: i64,
        name: String,
        pattern: Pattern,
        job: Job,
        options: EntryOptions,
    ) -> Self {
        Self {
            id,
            name,
            pattern,
            job,
            registered_at: Utc::now(),
            status: LifecycleState::new(Status::Ready),
            singleton: AtomicBool::new(options.singleton),
            limited: AtomicBool::new(options.times.is_some()),
            remaining: AtomicU64::new(options.times.unwrap_or(0)),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Resume firing. No effect on a closed entry.
    pub fn start(&self) {
        if self.status.transition(Status::Stopped, Status::Ready) {
            debug!(name = %self.name, "cron entry started");
        }
    }

    /// Suspend firing until [`Entry::start`]. No effect on a closed entry.
    pub fn stop(&self) {
        if matches!(self.status.set(Status::Stopped), Some(prev) if prev != Status::Stopped) {
            debug!(name = %self.name, "cron entry stopped");
        }
    }

    /// Permanently deactivate the entry.
    pub fn close(&self) {
        if let Some(prev) = self.status.set(Status::Closed) {
            debug!(name = %self.name, from = %prev, "cron entry closed");
        }
    }

    pub fn set_singleton(&self, singleton: bool) {
        self.singleton.store(singleton, Ordering::Release);
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton.load(Ordering::Acquire)
    }

    /// Limit the entry to `times` more runs.
    pub fn set_times(&self, times: u64) {
        self.remaining.store(times, Ordering::Release);
        self.limited.store(true, Ordering::Release);
    }

    /// Runs left, or `None` when unlimited.
    pub fn times(&self) -> Option<u64> {
        self.limited
            .load(Ordering::Acquire)
            .then(|| self.remaining.load(Ordering::Acquire))
    }

    #[cfg(test)]
    pub(crate) fn registered_at_for_test(mut self, at: DateTime<Utc>) -> Self {
        self.registered_at = at;
        self
    }

    /// Fire the entry once.
    ///
    /// Called by the trigger engine whenever the pattern says the job is due.
    /// The run that uses up the last remaining run closes the entry and still
    /// executes.
    pub fn run(&self) -> RunOutcome {
        match self.status.get() {
            Status::Stopped => return RunOutcome::Stopped,
            Status::Closed => return RunOutcome::Closed,
            Status::Ready | Status::Running => {}
        }

        let _guard = if self.is_singleton() {
            if self.in_flight.swap(true, Ordering::AcqRel) {
                return RunOutcome::InFlight;
            }
            Some(InFlightGuard(&self.in_flight))
        } else {
            None
        };

        if self.limited.load(Ordering::Acquire) {
            match self.take_run() {
                Some(0) => self.close(),
                Some(_) => {}
                None => {
                    self.close();
                    return RunOutcome::Closed;
                }
            }
        }

        let entered = self.status.transition(Status::Ready, Status::Running);
        (self.job)();
        if entered {
            self.status.transition(Status::Running, Status::Ready);
        }
        RunOutcome::Executed
    }

    /// Consume one run. `Some(left)` on success, `None` if none were left.
    fn take_run(&self) -> Option<u64> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|prev| prev - 1)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("registered_at", &self.registered_at)
            .field("status", &self.status())
            .field("singleton", &self.is_singleton())
            .field("times", &self.times())
            .finish()
    }
}

/// Clears the singleton in-flight flag, including when the job panics.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
