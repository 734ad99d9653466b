//! Recurring job identifiers.
//!
//! A recurring job keeps its re-scheduling interval in its id:
//! `r:<intervalMillis>:<suffix>`. Plain ids may never start with the `r:`
//! prefix, so both kinds can share the `jobs` hash without colliding.

use crate::error::{QueueError, QueueResult};
use std::fmt;

/// Prefix reserved for recurring job ids.
pub const RESERVED_PREFIX: &str = "r:";

/// Separator between the parts of a recurring id.
pub const SEPARATOR: char = ':';

/// Decoded form of a recurring job id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringId {
    /// Re-scheduling interval in milliseconds
    pub interval_ms: u64,
    /// Producer-supplied suffix (may be empty)
    pub suffix: String,
}

impl RecurringId {
    /// Build a recurring id, rejecting suffixes that contain the separator.
    pub fn new(interval_ms: u64, suffix: impl Into<String>) -> QueueResult<Self> {
        let suffix = suffix.into();
        if suffix.contains(SEPARATOR) {
            return Err(QueueError::InvalidId(format!(
                "{suffix:?} contains '{SEPARATOR}' and cannot be made recurring"
            )));
        }
        if interval_ms == 0 {
            return Err(QueueError::InvalidInterval("0".to_string()));
        }
        Ok(Self { interval_ms, suffix })
    }

    /// Parse a recurring id. Returns `None` for plain ids.
    pub fn parse(id: &str) -> Option<Self> {
        let rest = id.strip_prefix(RESERVED_PREFIX)?;
        let (interval, suffix) = rest.split_once(SEPARATOR)?;
        if suffix.contains(SEPARATOR) {
            return None;
        }
        let interval_ms = interval.parse::<u64>().ok().filter(|ms| *ms > 0)?;
        Some(Self {
            interval_ms,
            suffix: suffix.to_string(),
        })
    }
}

impl fmt::Display for RecurringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{RESERVED_PREFIX}{}{SEPARATOR}{}", self.interval_ms, self.suffix)
    }
}

/// Whether an id lives in the reserved recurring namespace.
pub fn is_reserved(id: &str) -> bool {
    id.starts_with(RESERVED_PREFIX)
}

/// Values accepted as a recurrence interval.
///
/// Numbers are milliseconds. Strings are `<number><unit>` with unit one of
/// `s`, `m`, `h`, `d`; a bare numeric string is milliseconds.
pub trait IntoInterval {
    /// Resolve to a positive whole number of milliseconds.
    fn into_interval_ms(self) -> QueueResult<u64>;
}

impl IntoInterval for u64 {
    fn into_interval_ms(self) -> QueueResult<u64> {
        if self == 0 {
            return Err(QueueError::InvalidInterval(self.to_string()));
        }
        Ok(self)
    }
}

impl IntoInterval for i64 {
    fn into_interval_ms(self) -> QueueResult<u64> {
        u64::try_from(self)
            .map_err(|_| QueueError::InvalidInterval(self.to_string()))?
            .into_interval_ms()
    }
}

impl IntoInterval for i32 {
    fn into_interval_ms(self) -> QueueResult<u64> {
        i64::from(self).into_interval_ms()
    }
}

impl IntoInterval for f64 {
    fn into_interval_ms(self) -> QueueResult<u64> {
        whole_millis(self).ok_or_else(|| QueueError::InvalidInterval(self.to_string()))
    }
}

impl IntoInterval for std::time::Duration {
    fn into_interval_ms(self) -> QueueResult<u64> {
        u64::try_from(self.as_millis())
            .map_err(|_| QueueError::InvalidInterval(format!("{self:?}")))?
            .into_interval_ms()
    }
}

impl IntoInterval for &str {
    fn into_interval_ms(self) -> QueueResult<u64> {
        parse_interval(self)
    }
}

impl IntoInterval for String {
    fn into_interval_ms(self) -> QueueResult<u64> {
        parse_interval(&self)
    }
}

/// Milliseconds per interval unit.
fn unit_millis(unit: &str) -> Option<f64> {
    match unit {
        "" => Some(1.0),
        "s" => Some(1_000.0),
        "m" => Some(60_000.0),
        "h" => Some(3_600_000.0),
        "d" => Some(86_400_000.0),
        _ => None,
    }
}

fn parse_interval(expr: &str) -> QueueResult<u64> {
    let invalid = || QueueError::InvalidInterval(expr.to_string());

    let expr = expr.trim();
    let split = expr
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(expr.len());
    let (number, unit) = expr.split_at(split);

    let factor = unit_millis(unit).ok_or_else(invalid)?;
    let value: f64 = number.parse().map_err(|_| invalid())?;

    whole_millis(value * factor).ok_or_else(invalid)
}

fn whole_millis(value: f64) -> Option<u64> {
    if value.is_finite() && value > 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}
