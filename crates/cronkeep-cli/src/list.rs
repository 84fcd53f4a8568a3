//! `cronkeep list`: register configured jobs and print the registry.

use std::fmt::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use cronkeep_config::CronKeepConfig;
use cronkeep_cron::{CronManager, Entry, Timer, TimerCallback};
use cronkeep_types::{JobMode, JobSpec};
use tokio::task::JoinHandle;
use tracing::info;

/// Tokio timer that keeps its tasks so the caller can wait for them and
/// see which callbacks panicked.
#[derive(Default)]
struct TrackedTimer {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Timer for TrackedTimer {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
    }
}

impl TrackedTimer {
    /// Wait for every scheduled callback. Fails on the first one that panicked.
    async fn join_all(&self) -> anyhow::Result<()> {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    bail!("{}", panic_message(e.into_panic()));
                }
                bail!("deferred registration task failed: {e}");
            }
        }
        Ok(())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "deferred registration panicked".to_string(), |s| s.to_string()),
    }
}

/// Build a registry from `config` and return its ordered snapshot once every
/// deferred job has been registered.
///
/// A deferred registration that fails when it fires is returned as an error.
pub async fn run_list(config: &CronKeepConfig) -> anyhow::Result<Vec<Arc<Entry>>> {
    let timer = Arc::new(TrackedTimer::default());
    let cron = Arc::new(CronManager::with_timer(timer.clone()));
    if let Some(path) = &config.log.path {
        cron.set_log_path(path);
    }
    cron.set_log_level(config.log.level_filter()?);

    let mut longest: Option<Duration> = None;
    for spec in &config.jobs {
        match spec.delay_secs {
            Some(secs) => {
                let delay = Duration::from_secs(secs);
                register_later(&cron, spec, delay);
                longest = longest.max(Some(delay));
            }
            None => register(&cron, spec)?,
        }
    }

    if let Some(delay) = longest {
        info!(?delay, "waiting for deferred jobs");
    }
    timer.join_all().await?;
    Ok(cron.entries())
}

fn job_for(label: String, message: String) -> impl Fn() + Send + Sync + 'static {
    move || info!(job = %label, %message, "cron job fired")
}

fn register(cron: &CronManager, spec: &JobSpec) -> anyhow::Result<()> {
    let name = spec.name.as_deref();
    let job = job_for(spec.name.clone().unwrap_or_default(), spec.message.clone());
    match spec.mode {
        JobMode::Normal => cron.add(&spec.pattern, job, name)?,
        JobMode::Singleton => cron.add_singleton(&spec.pattern, job, name)?,
        JobMode::Once => cron.add_once(&spec.pattern, job, name)?,
        JobMode::Times { times } => cron.add_times(&spec.pattern, times, job, name)?,
    };
    Ok(())
}

fn register_later(cron: &Arc<CronManager>, spec: &JobSpec, delay: Duration) {
    let name = spec.name.as_deref();
    let job = job_for(spec.name.clone().unwrap_or_default(), spec.message.clone());
    match spec.mode {
        JobMode::Normal => cron.delay_add(delay, &spec.pattern, job, name),
        JobMode::Singleton => cron.delay_add_singleton(delay, &spec.pattern, job, name),
        JobMode::Once => cron.delay_add_once(delay, &spec.pattern, job, name),
        JobMode::Times { times } => cron.delay_add_times(delay, &spec.pattern, times, job, name),
    }
}

/// Tabular listing, one entry per line.
pub fn render(entries: &[Arc<Entry>]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<20} {:<10} {:<10} {:<8} REGISTERED",
        "NAME", "PATTERN", "SINGLETON", "REMAINING", "STATUS"
    );
    for entry in entries {
        let remaining = entry
            .times()
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let _ = writeln!(
            out,
            "{:<20} {:<20} {:<10} {:<10} {:<8} {}",
            entry.name(),
            entry.pattern().as_str(),
            entry.is_singleton(),
            remaining,
            entry.status(),
            entry.registered_at().format("%Y-%m-%d %H:%M:%S%.3f"),
        );
    }
    out
}
