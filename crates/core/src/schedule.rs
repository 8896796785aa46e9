//! Daily invalidation schedule.
//!
//! The upstream ingestion job publishes one batch per day. Between
//! `invalidation_start` and `refresh_complete` the batch may be half-written, so
//! every cached page is treated as outdated while the window is open. After the
//! window closes, anything fetched before it closed belongs to the previous
//! batch and is outdated too.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Errors from building a [`SchedulePolicy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid time of day {0:?}: expected HH:MM")]
    InvalidTime(String),

    #[error("invalidation start {start} must be before refresh complete {complete}")]
    EmptyWindow { start: NaiveTime, complete: NaiveTime },
}

/// Pure staleness predicate over `(fetched_at, now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePolicy {
    invalidation_start: NaiveTime,
    refresh_complete: NaiveTime,
}

impl SchedulePolicy {
    pub fn new(invalidation_start: NaiveTime, refresh_complete: NaiveTime) -> Result<Self, ScheduleError> {
        if invalidation_start >= refresh_complete {
            return Err(ScheduleError::EmptyWindow { start: invalidation_start, complete: refresh_complete });
        }
        Ok(Self { invalidation_start, refresh_complete })
    }

    /// Build a policy from two `HH:MM` strings.
    pub fn parse(invalidation_start: &str, refresh_complete: &str) -> Result<Self, ScheduleError> {
        Self::new(parse_hhmm(invalidation_start)?, parse_hhmm(refresh_complete)?)
    }

    pub fn invalidation_start(&self) -> NaiveTime {
        self.invalidation_start
    }

    pub fn refresh_complete(&self) -> NaiveTime {
        self.refresh_complete
    }

    /// Whether `now` falls inside today's `[invalidation_start, refresh_complete]`.
    pub fn in_window(&self, now: NaiveDateTime) -> bool {
        let t = now.time();
        t >= self.invalidation_start && t <= self.refresh_complete
    }

    /// Whether an entry fetched at `fetched_at` must be refetched at `now`.
    ///
    /// An entry that was never fetched is stale. A fetch time later than `now`
    /// means the clock moved backward; such entries are stale as well.
    pub fn is_stale(&self, fetched_at: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
        let Some(fetched_at) = fetched_at else {
            return true;
        };

        if self.in_window(now) || fetched_at > now || fetched_at.date() != now.date() {
            return true;
        }

        // Outside the window and on the same day: once today's window has
        // opened, only fetches made after it closed see today's batch.
        now.time() > self.refresh_complete && fetched_at <= now.date().and_time(self.refresh_complete)
    }

    /// Staleness for state that tracks a single "last refresh" timestamp.
    ///
    /// True when the most recent window start at or before `now` is later than
    /// `last_refresh`. Unlike [`is_stale`](Self::is_stale) this fires once per
    /// day instead of on every call inside the window.
    pub fn needs_global_refresh(&self, last_refresh: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
        match last_refresh {
            None => true,
            Some(last) => last > now || last < self.latest_window_start(now),
        }
    }

    /// The most recent window start at or before `now`.
    pub fn latest_window_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        if now.time() >= self.invalidation_start {
            now.date().and_time(self.invalidation_start)
        } else {
            (now - TimeDelta::days(1)).date().and_time(self.invalidation_start)
        }
    }

    /// The next window start after `now`, or `None` while the window is open.
    pub fn next_invalidation(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.in_window(now) {
            return None;
        }
        if now.time() < self.invalidation_start {
            Some(now.date().and_time(self.invalidation_start))
        } else {
            Some((now + TimeDelta::days(1)).date().and_time(self.invalidation_start))
        }
    }
}

fn parse_hhmm(value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| ScheduleError::InvalidTime(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn policy() -> SchedulePolicy {
        SchedulePolicy::parse("05:00", "05:10").unwrap()
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(SchedulePolicy::parse("5am", "05:10"), Err(ScheduleError::InvalidTime(_))));
        assert!(matches!(SchedulePolicy::parse("05:10", "05:00"), Err(ScheduleError::EmptyWindow { .. })));
        assert!(matches!(SchedulePolicy::parse("05:00", "05:00"), Err(ScheduleError::EmptyWindow { .. })));
    }

    #[test]
    fn test_never_fetched_is_stale() {
        assert!(policy().is_stale(None, at(2, 12, 0)));
    }

    #[test]
    fn test_inside_window_always_stale() {
        let p = policy();
        assert!(p.is_stale(Some(at(2, 4, 0)), at(2, 5, 5)));
        assert!(p.is_stale(Some(at(2, 5, 4)), at(2, 5, 5)));
        assert!(p.is_stale(Some(at(2, 5, 0)), at(2, 5, 0)));
        assert!(p.is_stale(Some(at(2, 5, 0)), at(2, 5, 10)));
    }

    #[test]
    fn test_different_day_is_stale() {
        let p = policy();
        assert!(p.is_stale(Some(at(1, 23, 0)), at(2, 1, 0)));
        assert!(p.is_stale(Some(at(1, 12, 0)), at(2, 12, 0)));
    }

    #[test]
    fn test_same_day_before_window_is_fresh() {
        let p = policy();
        assert!(!p.is_stale(Some(at(2, 1, 0)), at(2, 4, 59)));
    }

    #[test]
    fn test_fetch_before_window_is_stale_after_it() {
        let p = policy();
        assert!(p.is_stale(Some(at(2, 4, 0)), at(2, 6, 0)));
        assert!(p.is_stale(Some(at(2, 5, 10)), at(2, 6, 0)));
    }

    #[test]
    fn test_fetch_after_window_is_fresh() {
        let p = policy();
        assert!(!p.is_stale(Some(at(2, 5, 11)), at(2, 23, 0)));
        assert!(!p.is_stale(Some(at(2, 12, 0)), at(2, 12, 0)));
    }

    #[test]
    fn test_backward_clock_is_stale() {
        assert!(policy().is_stale(Some(at(2, 12, 0)), at(2, 11, 0)));
    }

    #[test]
    fn test_is_stale_is_deterministic() {
        let p = policy();
        for _ in 0..3 {
            assert!(!p.is_stale(Some(at(2, 7, 0)), at(2, 8, 0)));
        }
    }

    #[test]
    fn test_global_refresh_fires_once_per_day() {
        let p = policy();
        assert!(p.needs_global_refresh(None, at(2, 12, 0)));
        assert!(p.needs_global_refresh(Some(at(1, 12, 0)), at(2, 5, 1)));
        assert!(!p.needs_global_refresh(Some(at(2, 5, 1)), at(2, 5, 8)));
        assert!(!p.needs_global_refresh(Some(at(2, 5, 1)), at(3, 4, 59)));
        assert!(p.needs_global_refresh(Some(at(2, 5, 1)), at(3, 5, 0)));
        // just after midnight the latest window start is yesterday's
        assert!(!p.needs_global_refresh(Some(at(1, 6, 0)), at(2, 0, 30)));
    }

    #[test]
    fn test_next_invalidation() {
        let p = policy();
        assert_eq!(p.next_invalidation(at(2, 3, 0)), Some(at(2, 5, 0)));
        assert_eq!(p.next_invalidation(at(2, 5, 3)), None);
        assert_eq!(p.next_invalidation(at(2, 18, 0)), Some(at(3, 5, 0)));
    }
}
