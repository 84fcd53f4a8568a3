//! cronkeep-cron: named job registry for a recurring-task scheduler.
//!
//! [`CronManager`] tracks entries by unique name, owns the registry-wide
//! lifecycle flag and supports deferred registration through a one-shot
//! [`Timer`]. Deciding when an entry fires belongs to the trigger engine,
//! which drives entries through [`Entry::run`].

pub mod deferred;
pub mod entry;
pub mod error;
pub mod id;
pub mod pattern;
pub mod registry;
pub mod status;
pub mod timer;

pub use entry::{Entry, EntryOptions, Job, RunOutcome};
pub use error::{CronError, DeferredRegistrationFault, Result};
pub use id::{GENERATED_NAME_PREFIX, IdGenerator};
pub use pattern::Pattern;
pub use registry::CronManager;
pub use status::{LifecycleState, Status};
pub use timer::{Timer, TimerCallback, TokioTimer};
