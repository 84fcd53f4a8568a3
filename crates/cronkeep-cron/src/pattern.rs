//! Schedule pattern validation.
//!
//! Accepts 5-field cron (seconds default to 0), 6- or 7-field cron with
//! seconds (and year), the `@yearly`-style shortcuts and `@every <duration>`.
//! Syntax checking is delegated to the `cron` crate; working out fire times
//! is left to whatever drives the entries.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use cron::Schedule;

use crate::error::{CronError, Result};

#[derive(Clone)]
enum Kind {
    Cron(Box<Schedule>),
    Every(Duration),
}

/// A validated schedule pattern.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    kind: Kind,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        let kind = if trimmed.starts_with('@') {
            parse_shortcut(pattern, trimmed)?
        } else {
            parse_cron(pattern, trimmed)?
        };
        Ok(Self {
            source: pattern.to_string(),
            kind,
        })
    }

    /// The pattern exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parsed cron schedule, unless this is an `@every` pattern.
    pub fn schedule(&self) -> Option<&Schedule> {
        match &self.kind {
            Kind::Cron(schedule) => Some(schedule),
            Kind::Every(_) => None,
        }
    }

    /// Fixed interval of an `@every` pattern.
    pub fn interval(&self) -> Option<Duration> {
        match self.kind {
            Kind::Every(every) => Some(every),
            Kind::Cron(_) => None,
        }
    }
}

impl FromStr for Pattern {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn invalid(pattern: &str, reason: impl Into<String>) -> CronError {
    CronError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

fn parse_shortcut(pattern: &str, trimmed: &str) -> Result<Kind> {
    let lower = trimmed.to_lowercase();
    match lower.as_str() {
        "@yearly" | "@annually" => parse_cron(pattern, "0 0 0 1 1 *"),
        "@monthly" => parse_cron(pattern, "0 0 0 1 * *"),
        "@weekly" => parse_cron(pattern, "0 0 0 * * SUN"),
        "@daily" | "@midnight" => parse_cron(pattern, "0 0 0 * * *"),
        "@hourly" => parse_cron(pattern, "0 0 * * * *"),
        s if s.starts_with("@every ") => parse_every(pattern, s["@every ".len()..].trim()),
        _ => Err(invalid(pattern, format!("unknown shortcut: {trimmed}"))),
    }
}

fn parse_cron(pattern: &str, expression: &str) -> Result<Kind> {
    let fields = expression.split_whitespace().count();
    let expression = match fields {
        5 => format!("0 {expression}"),
        6 | 7 => expression.to_string(),
        n => return Err(invalid(pattern, format!("expected 5 to 7 fields, got {n}"))),
    };

    let schedule = Schedule::from_str(&expression).map_err(|e| invalid(pattern, e.to_string()))?;
    Ok(Kind::Cron(Box::new(schedule)))
}

/// Durations like `30s`, `5m`, `1h30m`, `2d`.
fn parse_every(pattern: &str, spec: &str) -> Result<Kind> {
    let mut total: u64 = 0;
    let mut digits = String::new();

    for c in spec.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| invalid(pattern, format!("bad interval: {spec}")))?;
        digits.clear();
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            _ => return Err(invalid(pattern, format!("bad interval unit '{c}'"))),
        };
        total = n
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| invalid(pattern, "interval overflow"))?;
    }

    if !digits.is_empty() {
        return Err(invalid(pattern, format!("missing unit in interval: {spec}")));
    }
    if total == 0 {
        return Err(invalid(pattern, "interval must be positive"));
    }
    Ok(Kind::Every(Duration::from_secs(total)))
}
