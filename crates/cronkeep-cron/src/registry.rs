//! Named job registry.

use std::collections::HashMap;
use std::collections::hash_map::Entry as Slot;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};

use crate::entry::{Entry, EntryOptions, Job};
use crate::error::{CronError, Result};
use crate::id::{GENERATED_NAME_PREFIX, IdGenerator, generated_name, is_reserved_name};
use crate::pattern::Pattern;
use crate::status::{LifecycleState, Status};
use crate::timer::{Timer, TokioTimer};

/// Tracks cron entries by unique name and holds the registry-wide status.
///
/// Construct one per scheduler and share it by `Arc`; registries are fully
/// independent of each other.
pub struct CronManager {
    ids: IdGenerator,
    status: LifecycleState,
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    pub(crate) timer: Option<Arc<dyn Timer>>,
    log_path: RwLock<Option<PathBuf>>,
    log_level: RwLock<LevelFilter>,
}

impl CronManager {
    /// Create an empty registry in the `Running` state.
    ///
    /// Deferred registrations use the tokio runtime this is called from, if
    /// there is one, and otherwise the runtime current when they are requested.
    pub fn new() -> Self {
        Self::build(TokioTimer::try_current().map(|t| Arc::new(t) as Arc<dyn Timer>))
    }

    /// Create a registry whose deferred registrations go through `timer`.
    pub fn with_timer(timer: Arc<dyn Timer>) -> Self {
        Self::build(Some(timer))
    }

    fn build(timer: Option<Arc<dyn Timer>>) -> Self {
        Self {
            ids: IdGenerator::new(),
            status: LifecycleState::new(Status::Running),
            entries: RwLock::new(HashMap::new()),
            timer,
            log_path: RwLock::new(None),
            log_level: RwLock::new(LevelFilter::INFO),
        }
    }

    pub fn set_log_path(&self, path: impl Into<PathBuf>) {
        *write(&self.log_path) = Some(path.into());
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        read(&self.log_path).clone()
    }

    pub fn set_log_level(&self, level: LevelFilter) {
        *write(&self.log_level) = level;
    }

    pub fn log_level(&self) -> LevelFilter {
        *read(&self.log_level)
    }

    /// Register a job that fires on every match of `pattern`.
    ///
    /// Without a `name` one is generated from the id counter.
    pub fn add<F>(&self, pattern: &str, job: F, name: Option<&str>) -> Result<Arc<Entry>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_entry(pattern, Arc::new(job), name, EntryOptions::default())
    }

    /// Register a job that never overlaps with its own previous execution.
    pub fn add_singleton<F>(&self, pattern: &str, job: F, name: Option<&str>) -> Result<Arc<Entry>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let options = EntryOptions {
            singleton: true,
            ..EntryOptions::default()
        };
        self.add_entry(pattern, Arc::new(job), name, options)
    }

    /// Register a job that runs a single time.
    pub fn add_once<F>(&self, pattern: &str, job: F, name: Option<&str>) -> Result<Arc<Entry>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_times(pattern, 1, job, name)
    }

    /// Register a job that runs `times` times.
    pub fn add_times<F>(
        &self,
        pattern: &str,
        times: u64,
        job: F,
        name: Option<&str>,
    ) -> Result<Arc<Entry>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let options = EntryOptions {
            times: Some(times),
            ..EntryOptions::default()
        };
        self.add_entry(pattern, Arc::new(job), name, options)
    }

    /// Validate, configure and publish a new entry.
    ///
    /// The entry is fully configured before it becomes visible in the map.
    pub(crate) fn add_entry(
        &self,
        pattern: &str,
        job: Job,
        name: Option<&str>,
        options: EntryOptions,
    ) -> Result<Arc<Entry>> {
        if let Some(name) = name {
            if is_reserved_name(name) {
                warn!(%name, "rejected cron job name in reserved namespace");
                return Err(CronError::ReservedName {
                    name: name.to_string(),
                    prefix: GENERATED_NAME_PREFIX,
                });
            }
            if read(&self.entries).contains_key(name) {
                warn!(%name, "cron job already exists");
                return Err(duplicate(name));
            }
        }

        let pattern = Pattern::parse(pattern)?;
        let id = self.ids.next();
        let name = name.map_or_else(|| generated_name(id), str::to_string);
        let entry = Arc::new(Entry::new(id, name, pattern, job, options));

        match write(&self.entries).entry(entry.name().to_string()) {
            Slot::Occupied(_) => {
                warn!(name = %entry.name(), "cron job already exists");
                return Err(duplicate(entry.name()));
            }
            Slot::Vacant(slot) => {
                slot.insert(entry.clone());
            }
        }

        info!(
            name = %entry.name(),
            pattern = %entry.pattern(),
            singleton = options.singleton,
            times = ?options.times,
            "cron job added"
        );
        Ok(entry)
    }

    pub fn search(&self, name: &str) -> Option<Arc<Entry>> {
        read(&self.entries).get(name).cloned()
    }

    /// Start the named entries, or mark the whole registry `Ready` when no
    /// names are given. Unknown names are ignored.
    pub fn start(&self, names: &[&str]) {
        if names.is_empty() {
            self.set_status(Status::Ready);
            return;
        }
        for name in names {
            if let Some(entry) = self.search(name) {
                entry.start();
                info!(%name, "cron job started");
            }
        }
    }

    /// Stop the named entries, or mark the whole registry `Stopped` when no
    /// names are given. Unknown names are ignored.
    pub fn stop(&self, names: &[&str]) {
        if names.is_empty() {
            self.set_status(Status::Stopped);
            return;
        }
        for name in names {
            if let Some(entry) = self.search(name) {
                entry.stop();
                info!(%name, "cron job stopped");
            }
        }
    }

    /// Mark the registry closed. Entries are left untouched.
    pub fn close(&self) {
        self.set_status(Status::Closed);
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    fn set_status(&self, next: Status) {
        match self.status.set(next) {
            Some(prev) => debug!(from = %prev, to = %next, "cron registry status changed"),
            None => warn!(to = %next, "cron registry is closed, status unchanged"),
        }
    }

    /// Close the entry and stop tracking it.
    ///
    /// Returns the removed entry so callers can observe its closed state.
    pub fn remove(&self, name: &str) -> Option<Arc<Entry>> {
        let entry = write(&self.entries).remove(name)?;
        entry.close();
        info!(%name, "cron job removed");
        Some(entry)
    }

    /// Stop tracking entries that closed on their own, e.g. after using up
    /// their runs. Returns how many were evicted.
    pub fn purge_closed(&self) -> usize {
        let mut entries = write(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_closed());
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged closed cron jobs");
        }
        purged
    }

    /// Number of tracked entries, closed ones included until purged.
    pub fn size(&self) -> usize {
        read(&self.entries).len()
    }

    /// Snapshot of all entries, oldest registration first.
    pub fn entries(&self) -> Vec<Arc<Entry>> {
        let mut snapshot: Vec<Arc<Entry>> = read(&self.entries).values().cloned().collect();
        sort_by_registration(&mut snapshot);
        snapshot
    }
}

impl Default for CronManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Order by registration time, then by id. Ids are unique, so ties on the
/// timestamp still get a total order.
fn sort_by_registration(entries: &mut [Arc<Entry>]) {
    entries.sort_by(|a, b| {
        a.registered_at()
            .cmp(&b.registered_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

fn duplicate(name: &str) -> CronError {
    CronError::DuplicateName {
        name: name.to_string(),
    }
}

// Job bodies never run under these locks, so a poisoned lock still holds
// consistent data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::RunOutcome;
    use std::collections::HashSet;
    use std::sync::Barrier;

    const EVERY_SECOND: &str = "* * * * * *";

    fn noop() {}

    #[test]
    fn test_add_without_name() {
        let cron = CronManager::new();
        assert_eq!(cron.status(), Status::Running);

        let entry = cron.add(EVERY_SECOND, noop, None).unwrap();
        assert!(entry.name().starts_with(GENERATED_NAME_PREFIX));
        assert_eq!(entry.name(), format!("cron-{}", entry.id()));
        assert_eq!(entry.times(), None);
        assert!(!entry.is_singleton());
        assert_eq!(cron.size(), 1);
        assert!(Arc::ptr_eq(&cron.search(entry.name()).unwrap(), &entry));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let cron = CronManager::new();
        cron.add(EVERY_SECOND, noop, None).unwrap();
        let first = cron.add(EVERY_SECOND, noop, Some("E1")).unwrap();

        let err = cron.add(EVERY_SECOND, noop, Some("E1")).unwrap_err();
        assert_eq!(err, CronError::DuplicateName { name: "E1".into() });
        assert_eq!(cron.size(), 2);
        assert!(Arc::ptr_eq(&cron.search("E1").unwrap(), &first));

        // Variants share the same uniqueness check.
        assert!(cron.add_singleton(EVERY_SECOND, noop, Some("E1")).is_err());
        assert!(cron.add_once(EVERY_SECOND, noop, Some("E1")).is_err());
        assert!(cron.add_times(EVERY_SECOND, 3, noop, Some("E1")).is_err());
        assert_eq!(cron.size(), 2);
    }

    #[test]
    fn test_duplicate_checked_before_pattern() {
        let cron = CronManager::new();
        cron.add(EVERY_SECOND, noop, Some("job")).unwrap();
        let err = cron.add("not a pattern", noop, Some("job")).unwrap_err();
        assert!(matches!(err, CronError::DuplicateName { .. }));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let cron = CronManager::new();
        let err = cron.add(EVERY_SECOND, noop, Some("cron-1")).unwrap_err();
        assert!(matches!(err, CronError::ReservedName { .. }));
        assert_eq!(cron.size(), 0);

        // Only the generated shape is reserved.
        cron.add(EVERY_SECOND, noop, Some("cron-backup")).unwrap();
        cron.add(EVERY_SECOND, noop, Some("cron-")).unwrap();
        assert_eq!(cron.size(), 2);

        let entry = cron.add(EVERY_SECOND, noop, None).unwrap();
        assert_eq!(entry.name(), "cron-3");
    }

    #[test]
    fn test_invalid_pattern_inserts_nothing() {
        let cron = CronManager::new();
        let err = cron.add("* * *", noop, Some("broken")).unwrap_err();
        assert!(matches!(err, CronError::InvalidPattern { .. }));
        assert_eq!(cron.size(), 0);
        assert!(cron.search("broken").is_none());
    }

    #[test]
    fn test_failed_add_does_not_reuse_ids() {
        let cron = CronManager::new();
        let a = cron.add(EVERY_SECOND, noop, None).unwrap();
        cron.add(EVERY_SECOND, noop, Some(a.name())).unwrap_err();
        let b = cron.add(EVERY_SECOND, noop, None).unwrap();
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_concurrent_unnamed_adds_are_distinct() {
        let cron = Arc::new(CronManager::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cron = cron.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| cron.add(EVERY_SECOND, noop, None).unwrap().name().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut names = HashSet::new();
        for handle in handles {
            names.extend(handle.join().unwrap());
        }
        assert_eq!(names.len(), 800);
        assert_eq!(cron.size(), 800);
    }

    #[test]
    fn test_concurrent_same_name_single_winner() {
        let cron = Arc::new(CronManager::new());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cron = cron.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cron.add(EVERY_SECOND, noop, Some("contended")).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(cron.size(), 1);
    }

    #[test]
    fn test_variants_are_configured_on_return() {
        let cron = CronManager::new();

        let single = cron.add_singleton(EVERY_SECOND, noop, Some("single")).unwrap();
        assert!(single.is_singleton());
        assert_eq!(single.times(), None);

        let once = cron.add_once(EVERY_SECOND, noop, Some("once")).unwrap();
        assert_eq!(once.times(), Some(1));
        assert!(!once.is_singleton());

        let thrice = cron.add_times(EVERY_SECOND, 3, noop, Some("thrice")).unwrap();
        assert_eq!(thrice.times(), Some(3));

        let huge = cron.add_times(EVERY_SECOND, u64::MAX, noop, Some("huge")).unwrap();
        assert_eq!(huge.times(), Some(u64::MAX));

        // Whatever is visible through the map is already configured.
        assert_eq!(cron.search("once").unwrap().times(), Some(1));
        assert!(cron.search("single").unwrap().is_singleton());
    }

    #[test]
    fn test_add_once_exhausts_after_one_fire() {
        let cron = CronManager::new();
        let once = cron.add_once(EVERY_SECOND, noop, Some("once1")).unwrap();
        assert_eq!(once.times(), Some(1));

        // Stand-in for the trigger engine firing the entry.
        assert_eq!(once.run(), RunOutcome::Executed);
        assert!(once.is_closed());
        assert_eq!(once.run(), RunOutcome::Closed);

        // Exhausted entries stay tracked until purged.
        assert_eq!(cron.size(), 1);
        assert_eq!(cron.purge_closed(), 1);
        assert_eq!(cron.size(), 0);
        assert!(cron.search("once1").is_none());
    }

    #[test]
    fn test_start_stop_without_names_changes_registry_status_only() {
        let cron = CronManager::new();
        let entry = cron.add(EVERY_SECOND, noop, Some("a")).unwrap();

        cron.stop(&[]);
        assert_eq!(cron.status(), Status::Stopped);
        assert_eq!(entry.status(), Status::Ready);

        cron.start(&[]);
        assert_eq!(cron.status(), Status::Ready);
        assert_eq!(entry.status(), Status::Ready);
    }

    #[test]
    fn test_stop_named_ignores_unknown() {
        let cron = CronManager::new();
        let a = cron.add(EVERY_SECOND, noop, Some("a")).unwrap();

        cron.stop(&["a", "b"]);
        assert_eq!(a.status(), Status::Stopped);
        assert_eq!(cron.status(), Status::Running);
        assert!(cron.search("b").is_none());

        cron.start(&["a", "b"]);
        assert_eq!(a.status(), Status::Ready);
    }

    #[test]
    fn test_closed_registry_stays_closed() {
        let cron = CronManager::new();
        let entry = cron.add(EVERY_SECOND, noop, Some("a")).unwrap();

        cron.close();
        assert_eq!(cron.status(), Status::Closed);
        cron.start(&[]);
        cron.stop(&[]);
        assert_eq!(cron.status(), Status::Closed);

        // Entries are not affected by the registry flag.
        assert_eq!(entry.status(), Status::Ready);
        cron.stop(&["a"]);
        assert_eq!(entry.status(), Status::Stopped);
    }

    #[test]
    fn test_remove_closes_and_evicts() {
        let cron = CronManager::new();
        let x = cron.add(EVERY_SECOND, noop, Some("x")).unwrap();
        cron.add(EVERY_SECOND, noop, Some("y")).unwrap();

        let removed = cron.remove("x").unwrap();
        assert!(Arc::ptr_eq(&removed, &x));
        assert!(x.is_closed());
        assert_eq!(x.run(), RunOutcome::Closed);
        assert!(cron.search("x").is_none());
        assert_eq!(cron.size(), 1);

        assert!(cron.remove("x").is_none());
        assert!(cron.remove("missing").is_none());

        // The name is free again.
        cron.add(EVERY_SECOND, noop, Some("x")).unwrap();
        assert_eq!(cron.size(), 2);
    }

    #[test]
    fn test_entries_ordered_by_registration() {
        let cron = CronManager::new();
        for name in ["first", "second", "third", "fourth"] {
            cron.add(EVERY_SECOND, noop, Some(name)).unwrap();
        }

        let names: Vec<_> = cron.entries().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, ["first", "second", "third", "fourth"]);

        let snapshot = cron.entries();
        cron.remove("first");
        assert_eq!(snapshot.len(), 4);
        assert_eq!(cron.entries().len(), 3);
    }

    #[test]
    fn test_sort_breaks_timestamp_ties_by_id() {
        let job: Job = Arc::new(noop);
        let at = chrono::Utc::now();
        let make = |id: i64, offset_ms: i64| {
            Arc::new(
                Entry::new(
                    id,
                    format!("e{id}"),
                    Pattern::parse(EVERY_SECOND).unwrap(),
                    job.clone(),
                    EntryOptions::default(),
                )
                .registered_at_for_test(at + chrono::Duration::milliseconds(offset_ms)),
            )
        };

        let mut entries = vec![make(4, 10), make(3, 0), make(1, 0), make(2, 0), make(0, -5)];
        sort_by_registration(&mut entries);
        let ids: Vec<_> = entries.iter().map(|e| e.id()).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_log_settings_passthrough() {
        let cron = CronManager::new();
        assert_eq!(cron.log_path(), None);
        assert_eq!(cron.log_level(), LevelFilter::INFO);

        cron.set_log_path("/tmp/cron.log");
        cron.set_log_level(LevelFilter::DEBUG);
        assert_eq!(cron.log_path(), Some(PathBuf::from("/tmp/cron.log")));
        assert_eq!(cron.log_level(), LevelFilter::DEBUG);
        assert_eq!(cron.size(), 0);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = CronManager::new();
        let b = CronManager::new();
        a.add(EVERY_SECOND, noop, Some("shared")).unwrap();
        b.add(EVERY_SECOND, noop, Some("shared")).unwrap();
        a.close();

        assert_eq!(b.status(), Status::Running);
        let generated = b.add(EVERY_SECOND, noop, None).unwrap();
        assert_eq!(generated.name(), "cron-2");
    }
}
