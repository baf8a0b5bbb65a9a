//! Facility clock and curfew window
//!
//! Curfew evaluation never reads the system clock. Facility time is an
//! explicit (hour, minute) value set by an operator or simulator.

use chrono::{NaiveTime, Timelike};
use serde::Serialize;

/// Settable facility time with a fixed default used on startup and reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilityClock {
    now: NaiveTime,
    default: NaiveTime,
}

/// Wire form of the clock, `{hour, minute}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl FacilityClock {
    /// Create a clock starting at the default time. Out-of-range defaults fall back to midnight.
    pub fn new(default_hour: u32, default_minute: u32) -> Self {
        let default = NaiveTime::from_hms_opt(default_hour, default_minute, 0).unwrap_or_default();
        Self { now: default, default }
    }

    /// Set the facility time. Returns false (and leaves the clock unchanged)
    /// unless `hour < 24` and `minute < 60`.
    pub fn set(&mut self, hour: u32, minute: u32) -> bool {
        match NaiveTime::from_hms_opt(hour, minute, 0) {
            Some(t) => {
                self.now = t;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.now = self.default;
    }

    pub fn hour(&self) -> u32 {
        self.now.hour()
    }

    pub fn minute(&self) -> u32 {
        self.now.minute()
    }

    pub fn time(&self) -> ClockTime {
        ClockTime { hour: self.hour(), minute: self.minute() }
    }
}

/// Hours during which prisoners must be in the rest zone.
///
/// `start_hour` is inclusive, `end_hour` exclusive. A window with
/// `start_hour > end_hour` wraps midnight (e.g. 22..6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl NightWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl Default for NightWindow {
    fn default() -> Self {
        Self { start_hour: 0, end_hour: 6 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_reset() {
        let mut clock = FacilityClock::new(12, 0);
        assert_eq!(clock.time(), ClockTime { hour: 12, minute: 0 });

        assert!(clock.set(2, 30));
        assert_eq!(clock.hour(), 2);
        assert_eq!(clock.minute(), 30);

        clock.reset();
        assert_eq!(clock.time(), ClockTime { hour: 12, minute: 0 });
    }

    #[test]
    fn test_set_rejects_out_of_range() {
        let mut clock = FacilityClock::new(12, 0);
        assert!(!clock.set(24, 0));
        assert!(!clock.set(23, 60));
        assert_eq!(clock.hour(), 12);
        assert!(clock.set(23, 59));
        assert!(clock.set(0, 0));
    }

    #[test]
    fn test_invalid_default_falls_back_to_midnight() {
        let clock = FacilityClock::new(25, 0);
        assert_eq!(clock.time(), ClockTime { hour: 0, minute: 0 });
    }

    #[test]
    fn test_default_night_window_bounds() {
        let window = NightWindow::default();
        assert!(window.contains(0));
        assert!(window.contains(5));
        assert!(!window.contains(6));
        assert!(!window.contains(23));
        assert!(!window.contains(12));
    }

    #[test]
    fn test_wrapping_night_window() {
        let window = NightWindow::new(22, 6);
        assert!(window.contains(22));
        assert!(window.contains(23));
        assert!(window.contains(0));
        assert!(window.contains(5));
        assert!(!window.contains(6));
        assert!(!window.contains(21));
    }

    #[test]
    fn test_clock_time_json() {
        let json = serde_json::to_value(ClockTime { hour: 8, minute: 5 }).unwrap();
        assert_eq!(json, serde_json::json!({"hour": 8, "minute": 5}));
    }
}
