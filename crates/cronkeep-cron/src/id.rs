//! Monotonic id source for entries and generated job names.

use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix reserved for names the registry generates itself.
pub const GENERATED_NAME_PREFIX: &str = "cron-";

/// Hands out strictly increasing ids, starting at 1. Ids are never reused.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id. Safe to call from any number of threads.
    pub fn next(&self) -> i64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Name given to a job registered without one.
pub fn generated_name(id: i64) -> String {
    format!("{GENERATED_NAME_PREFIX}{id}")
}

/// True for names shaped like a generated one: the prefix followed by digits.
pub fn is_reserved_name(name: &str) -> bool {
    name.strip_prefix(GENERATED_NAME_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}
