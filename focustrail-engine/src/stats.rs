//! Aggregation of closed focus sessions for reporting collaborators.
//!
//! Read-only: dashboards and history views consume these numbers; nothing
//! here feeds back into traversal state.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::session::{Session, SessionStatus};

/// Rolled-up view of a user's successful focus history.
///
/// Only sessions finalized with `SUCCESS` count; canceled attempts remain
/// visible in the raw history but earn no distance here. Calendar windows are
/// UTC, with the week starting on Sunday.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionStats {
    pub total_sessions: u32,
    pub total_focus_minutes: f64,
    pub total_distance_km: f64,
    pub today_distance_km: f64,
    pub week_distance_km: f64,
    pub month_distance_km: f64,
}

impl SessionStats {
    /// Aggregate `sessions` as of `now`.
    #[must_use]
    pub fn collect(sessions: &[Session], now: DateTime<Utc>) -> Self {
        let today_start = day_start(now);
        let week_start =
            today_start - Duration::days(i64::from(now.weekday().num_days_from_sunday()));
        let month_start = month_start(now).unwrap_or(today_start);

        let mut stats = Self::default();
        for session in sessions {
            if session.status != SessionStatus::Success {
                continue;
            }
            let distance = session.distance_earned_km.unwrap_or(0.0);
            stats.total_sessions = stats.total_sessions.saturating_add(1);
            stats.total_distance_km += distance;
            if let Some(end_at) = session.end_at {
                stats.total_focus_minutes +=
                    (end_at - session.start_at).num_seconds().max(0) as f64 / 60.0;
            }

            let stamped = session.start_at;
            if stamped >= today_start {
                stats.today_distance_km += distance;
            }
            if stamped >= week_start {
                stats.week_distance_km += distance;
            }
            if stamped >= month_start {
                stats.month_distance_km += distance;
            }
        }
        stats
    }
}

fn day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn month_start(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(
        at.date_naive()
            .with_day(1)?
            .and_time(NaiveTime::MIN)
            .and_utc(),
    )
}
