//! Local time-of-day and daily time windows.
//!
//! Windows are half-open `[start, end)` in minutes since midnight and may
//! wrap across midnight (e.g. 22:00–06:00).

use serde::{Deserialize, Serialize};

/// Minutes in a day.
const DAY_MINUTES: u16 = 24 * 60;

/// A wall-clock time of day (local timezone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Build a time, rejecting out-of-range components.
    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// `true` if both components are in range. Deserialised values are not
    /// range-checked until this is called.
    pub const fn is_valid(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }

    pub const fn minutes_since_midnight(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl core::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A daily window `[start, end)`.
///
/// `start == end` is an empty window (never matches), which is how a window
/// is disabled from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    pub const fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Check whether `t` falls inside the window.
    pub fn contains(&self, t: TimeOfDay) -> bool {
        let s = self.start.minutes_since_midnight();
        let e = self.end.minutes_since_midnight();
        let m = t.minutes_since_midnight() % DAY_MINUTES;
        if s <= e {
            m >= s && m < e
        } else {
            // wraps midnight
            m >= s || m < e
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.start.is_valid() && self.end.is_valid()
    }
}

impl core::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
