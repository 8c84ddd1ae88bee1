//! Timestamp formatting for message bubbles.

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use std::fmt::Write;

/// 24-hour `HH:MM`, as shown under each bubble.
pub const DEFAULT_TIME_PATTERN: &str = "%H:%M";

pub trait TimestampFormatter {
    fn format(&self, at: &DateTime<Utc>) -> String;
}

impl<F> TimestampFormatter for F
where
    F: Fn(&DateTime<Utc>) -> String,
{
    fn format(&self, at: &DateTime<Utc>) -> String {
        self(at)
    }
}

/// Formats timestamps with a strftime pattern in a fixed UTC offset.
#[derive(Debug, Clone)]
pub struct ClockFormatter {
    pattern: String,
    offset: FixedOffset,
}

impl Default for ClockFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_PATTERN)
    }
}

impl ClockFormatter {
    /// Formatter rendering in UTC.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            offset: Utc.fix(),
        }
    }

    /// Formatter rendering in the machine's current local offset.
    pub fn local(pattern: impl Into<String>) -> Self {
        Self::new(pattern).with_offset(*Local::now().offset())
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }
}

impl TimestampFormatter for ClockFormatter {
    fn format(&self, at: &DateTime<Utc>) -> String {
        let mut out = String::new();
        if write!(out, "{}", at.with_timezone(&self.offset).format(&self.pattern)).is_err() {
            // Invalid pattern; chrono reports it as a fmt error.
            log::debug!("Invalid time pattern {:?}", self.pattern);
            return at.to_rfc3339();
        }
        out
    }
}
