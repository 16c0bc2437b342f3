//! Focus session lifecycle: one timed attempt, converted to a distance claim
//! on completion, independent of where the user is on the map.
//!
//! The manager never measures time on its own. Every operation takes the
//! caller's `now`, so the component stays deterministic and is driven
//! entirely by external poll or timer events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{KM_PER_MINUTE, MILLIS_PER_SECOND, SECONDS_PER_MINUTE};
use crate::map::UserId;

/// Identifier of a focus session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Construct an id from a string slice, trimming whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state recorded on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Success,
    Canceled,
}

impl SessionStatus {
    /// Whether the session has been finalized.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Caller-chosen terminal state for [`SessionManager::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    Success,
    Canceled,
}

impl From<CloseStatus> for SessionStatus {
    fn from(value: CloseStatus) -> Self {
        match value {
            CloseStatus::Success => Self::Success,
            CloseStatus::Canceled => Self::Canceled,
        }
    }
}

/// One timed focus attempt. Created open, finalized exactly once, immutable
/// afterward as a historical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub distance_earned_km: Option<f64>,
}

/// Errors raised when the session state machine contract is violated.
/// These indicate caller bugs and are never retried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("a focus session is already running")]
    AlreadyActive,
    #[error("no focus session is running")]
    NoActiveSession,
}

/// Finalized session data handed back to the caller so it can feed the
/// progress engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub session: Session,
    pub elapsed_minutes: f64,
    /// Distance credit applicable to traversal. Always zero for canceled
    /// sessions, whatever their elapsed time.
    pub creditable_km: f64,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    session: Session,
    preset_minutes: Option<u32>,
}

/// Explicit per-user session state machine.
///
/// `Idle` (no open session) and `Running` (one open session) are the only
/// states; completion is terminal for the open session and returns the
/// manager to `Idle`.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    active: Option<ActiveSession>,
}

impl SessionManager {
    /// Fresh manager in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is currently open.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// The open session, if any.
    #[must_use]
    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref().map(|active| &active.session)
    }

    /// Open a new session for `user` at `now`, optionally bounded by a preset
    /// number of minutes. Free mode passes `None` and runs until completed
    /// manually.
    ///
    /// # Errors
    ///
    /// Fails with [`SessionError::AlreadyActive`] while a session is open.
    pub fn start(
        &mut self,
        user: &UserId,
        preset_minutes: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<&Session, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        let session = Session {
            id: SessionId::generate(),
            user_id: user.clone(),
            start_at: now,
            end_at: None,
            status: SessionStatus::InProgress,
            distance_earned_km: None,
        };
        let active = self.active.insert(ActiveSession {
            session,
            preset_minutes,
        });
        Ok(&active.session)
    }

    /// Read-only tick: whole seconds elapsed between the session start and
    /// `now`. Never mutates.
    ///
    /// # Errors
    ///
    /// Fails with [`SessionError::NoActiveSession`] while idle.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Result<i64, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok((now - active.session.start_at).num_seconds().max(0))
    }

    /// Whether the open session has reached its preset bound. Always false in
    /// free mode. The manager never completes itself; a true result is a cue
    /// for the caller to invoke [`SessionManager::complete`].
    ///
    /// # Errors
    ///
    /// Fails with [`SessionError::NoActiveSession`] while idle.
    pub fn preset_expired(&self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveSession)?;
        let Some(preset) = active.preset_minutes else {
            return Ok(false);
        };
        Ok(self.elapsed_seconds(now)? >= i64::from(preset) * 60)
    }

    /// Finalize the open session at `now` and return to idle.
    ///
    /// The historical record always stores the earned-distance number, but
    /// the report's `creditable_km` is zero for canceled sessions: a
    /// cancellation closes the record without yielding traversal credit.
    ///
    /// # Errors
    ///
    /// Fails with [`SessionError::NoActiveSession`] while idle, including on
    /// a second call for the same session. No double credit can occur.
    pub fn complete(
        &mut self,
        status: CloseStatus,
        now: DateTime<Utc>,
    ) -> Result<SessionReport, SessionError> {
        let Some(active) = self.active.take() else {
            return Err(SessionError::NoActiveSession);
        };
        let elapsed_minutes = minutes_between(active.session.start_at, now);
        let earned_km = distance_for_minutes(elapsed_minutes);

        let mut session = active.session;
        session.end_at = Some(now);
        session.status = status.into();
        session.distance_earned_km = Some(earned_km);

        let creditable_km = match status {
            CloseStatus::Success => earned_km,
            CloseStatus::Canceled => 0.0,
        };
        Ok(SessionReport {
            session,
            elapsed_minutes,
            creditable_km,
        })
    }

    /// Drop the open session without finalizing it. Used when persisting the
    /// freshly opened record fails and the start must be undone so the caller
    /// can retry.
    pub(crate) fn abandon(&mut self) -> Option<Session> {
        self.active.take().map(|active| active.session)
    }
}

/// Convert focus minutes into kilometers at the fixed system-wide rate.
/// Non-finite or negative input earns nothing.
#[must_use]
pub fn distance_for_minutes(minutes: f64) -> f64 {
    if minutes.is_finite() {
        minutes.max(0.0) * KM_PER_MINUTE
    } else {
        0.0
    }
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    #[allow(clippy::cast_precision_loss)]
    let seconds = millis as f64 / MILLIS_PER_SECOND;
    seconds / SECONDS_PER_MINUTE
}
