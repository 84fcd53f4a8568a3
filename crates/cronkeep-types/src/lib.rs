use serde::{Deserialize, Serialize};

// ──────────────────── Job Declarations ────────────────────

/// How a declared job is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobMode {
    /// Fire on every match, forever.
    #[default]
    Normal,
    /// Never overlap with the previous execution.
    Singleton,
    /// Fire once, then close.
    Once,
    /// Fire a fixed number of times.
    Times { times: u64 },
}

impl JobMode {
    /// Remaining-run limit this mode implies, `None` for unlimited.
    pub fn times(&self) -> Option<u64> {
        match self {
            JobMode::Normal | JobMode::Singleton => None,
            JobMode::Once => Some(1),
            JobMode::Times { times } => Some(*times),
        }
    }
}

impl std::fmt::Display for JobMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobMode::Normal => write!(f, "normal"),
            JobMode::Singleton => write!(f, "singleton"),
            JobMode::Once => write!(f, "once"),
            JobMode::Times { times } => write!(f, "times({times})"),
        }
    }
}

/// A job declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique job name (generated if None).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Schedule pattern (e.g. "0 */5 * * * *" or "@every 30s").
    pub pattern: String,
    #[serde(default)]
    pub mode: JobMode,
    /// Register only after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<u64>,
    /// Text logged each time the job fires.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}
