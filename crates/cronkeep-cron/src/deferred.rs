//! Deferred registration through the one-shot timer.
//!
//! A deferred `add` that fails when the timer fires panics on the timer's
//! execution context; the error is never returned or retried.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::entry::{EntryOptions, Job};
use crate::error::DeferredRegistrationFault;
use crate::registry::CronManager;
use crate::timer::{Timer, TokioTimer};

impl CronManager {
    /// [`CronManager::add`] after `delay`.
    pub fn delay_add<F>(
        self: &Arc<Self>,
        delay: Duration,
        pattern: &str,
        job: F,
        name: Option<&str>,
    ) where
        F: Fn() + Send + Sync + 'static,
    {
        self.defer(delay, pattern, Arc::new(job), name, EntryOptions::default());
    }

    /// [`CronManager::add_singleton`] after `delay`.
    pub fn delay_add_singleton<F>(
        self: &Arc<Self>,
        delay: Duration,
        pattern: &str,
        job: F,
        name: Option<&str>,
    ) where
        F: Fn() + Send + Sync + 'static,
    {
        let options = EntryOptions {
            singleton: true,
            ..EntryOptions::default()
        };
        self.defer(delay, pattern, Arc::new(job), name, options);
    }

    /// [`CronManager::add_once`] after `delay`.
    pub fn delay_add_once<F>(
        self: &Arc<Self>,
        delay: Duration,
        pattern: &str,
        job: F,
        name: Option<&str>,
    ) where
        F: Fn() + Send + Sync + 'static,
    {
        self.delay_add_times(delay, pattern, 1, job, name);
    }

    /// [`CronManager::add_times`] after `delay`.
    pub fn delay_add_times<F>(
        self: &Arc<Self>,
        delay: Duration,
        pattern: &str,
        times: u64,
        job: F,
        name: Option<&str>,
    ) where
        F: Fn() + Send + Sync + 'static,
    {
        let options = EntryOptions {
            times: Some(times),
            ..EntryOptions::default()
        };
        self.defer(delay, pattern, Arc::new(job), name, options);
    }

    fn defer(
        self: &Arc<Self>,
        delay: Duration,
        pattern: &str,
        job: Job,
        name: Option<&str>,
        options: EntryOptions,
    ) {
        let cron = Arc::clone(self);
        let pattern = pattern.to_string();
        let name = name.map(str::to_string);

        debug!(name = ?name, %pattern, ?delay, "deferred cron registration scheduled");
        self.deferral_timer().schedule_once(
            delay,
            Box::new(move || {
                if let Err(source) = cron.add_entry(&pattern, job, name.as_deref(), options) {
                    let fault = DeferredRegistrationFault { name, source };
                    error!(error = %fault, "deferred cron registration failed");
                    panic!("{fault}");
                }
            }),
        );
    }

    fn deferral_timer(&self) -> Arc<dyn Timer> {
        if let Some(timer) = &self.timer {
            return Arc::clone(timer);
        }
        match TokioTimer::try_current() {
            Some(timer) => Arc::new(timer),
            None => panic!(
                "deferred cron registration needs a tokio runtime or a timer given to CronManager::with_timer"
            ),
        }
    }
}
