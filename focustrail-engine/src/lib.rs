//! Focustrail Journey Engine
//!
//! Platform-agnostic core logic for Focustrail: timed focus sessions earn
//! travel distance along a map of locations joined by fixed-length directed
//! paths. This crate provides the session lifecycle and traversal rules
//! without UI or platform-specific dependencies.

use std::collections::HashMap;

use log::{debug, info};
use thiserror::Error;

pub mod constants;
pub mod map;
pub mod progress;
pub mod session;
pub mod stats;
pub mod time;

// Re-export commonly used types
pub use constants::{KM_PER_MINUTE, PRESET_MINUTES};
pub use map::{
    Location, LocationId, MapError, OutgoingPaths, Path, PathId, TravelMap, UserId,
};
pub use progress::{ProgressEngine, ProgressError, TravelOutcome, UserProgress};
pub use session::{
    CloseStatus, Session, SessionError, SessionId, SessionManager, SessionReport, SessionStatus,
    distance_for_minutes,
};
pub use stats::SessionStats;
pub use time::Clock;

/// Trait for abstracting travel-map loading.
/// Platform-specific implementations should provide this.
pub trait MapLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load map reference data from the platform-specific source.
    ///
    /// # Errors
    ///
    /// Returns an error if the map data cannot be loaded.
    fn load_map(&self) -> Result<TravelMap, Self::Error>;
}

/// Trait for abstracting per-user progress and session persistence.
/// Each call is a single atomic per-record operation.
pub trait ProgressStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read a user's traversal record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn read_progress(&self, user: &UserId) -> Result<Option<UserProgress>, Self::Error>;

    /// Write a user's traversal record (last write wins).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn write_progress(&self, progress: &UserProgress) -> Result<(), Self::Error>;

    /// Read one session record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn read_session(&self, id: &SessionId) -> Result<Option<Session>, Self::Error>;

    /// Write one session record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn write_session(&self, session: &Session) -> Result<(), Self::Error>;

    /// All session records for one user, feeding the reporting layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn list_sessions(&self, user: &UserId) -> Result<Vec<Session>, Self::Error>;
}

/// Errors surfaced at the engine boundary.
///
/// Session, progress, and map kinds are contract violations: the caller did
/// something out of order and should not retry. `StoreUnavailable` is the
/// only retryable kind; retries must not re-apply an already-finalized
/// session's distance (the session id is the idempotency key).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
}

fn store_err<E>(err: E) -> EngineError
where
    E: std::error::Error + Send + Sync + 'static,
{
    EngineError::StoreUnavailable(err.into())
}

/// Combined result of completing a focus session.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusOutcome {
    pub report: SessionReport,
    /// Traversal result; `None` when the session was canceled.
    pub travel: Option<TravelOutcome>,
}

/// Main engine facade binding the map, the persistent store, and one session
/// manager per user.
///
/// The engine is the sole writer of progress and session records. Every
/// mutation is a single read-modify-write against the store and returns the
/// post-mutation state directly, so callers never refetch after writing.
pub struct JourneyEngine<S>
where
    S: ProgressStore,
{
    map: TravelMap,
    store: S,
    clock: Clock,
    sessions: HashMap<UserId, SessionManager>,
}

impl<S> JourneyEngine<S>
where
    S: ProgressStore,
{
    /// Create an engine over a validated map, reading real system time.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the map violates its invariants.
    pub fn new(map: TravelMap, store: S) -> Result<Self, MapError> {
        Self::with_clock(map, store, Clock::System)
    }

    /// Create an engine with an explicit clock (deterministic in tests).
    ///
    /// # Errors
    ///
    /// Returns a validation error when the map violates its invariants.
    pub fn with_clock(map: TravelMap, store: S, clock: Clock) -> Result<Self, MapError> {
        map.validate()?;
        Ok(Self {
            map,
            store,
            clock,
            sessions: HashMap::new(),
        })
    }

    /// Create an engine by loading the map through a [`MapLoader`].
    ///
    /// # Errors
    ///
    /// Returns the loader's error when the map cannot be loaded, or the
    /// validation error when the loaded map violates its invariants.
    pub fn from_loader<L>(loader: &L, store: S) -> Result<Self, anyhow::Error>
    where
        L: MapLoader,
    {
        let map = loader.load_map()?;
        Ok(Self::new(map, store)?)
    }

    /// The map reference data this engine resolves against.
    #[must_use]
    pub const fn map(&self) -> &TravelMap {
        &self.map
    }

    /// Mutable access to the engine clock, for deterministic drivers.
    pub const fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// A user's traversal record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` when the store cannot be reached.
    pub fn progress(&self, user: &UserId) -> Result<Option<UserProgress>, EngineError> {
        self.store.read_progress(user).map_err(store_err)
    }

    /// Place `user` at a start location with no active path and zero
    /// progress. Allowed until a path is selected; see
    /// [`ProgressEngine::set_start_location`].
    ///
    /// # Errors
    ///
    /// Returns progress contract violations or `StoreUnavailable`.
    pub fn set_start_location(
        &self,
        user: &UserId,
        location: &LocationId,
    ) -> Result<UserProgress, EngineError> {
        let existing = self.store.read_progress(user).map_err(store_err)?;
        let updated = ProgressEngine::new(&self.map).set_start_location(
            existing.as_ref(),
            user,
            location,
            self.clock.now(),
        )?;
        self.store.write_progress(&updated).map_err(store_err)?;
        debug!("{user} starts at {location}");
        Ok(updated)
    }

    /// Paths departing from the user's current location, for the
    /// path-selection picklist.
    ///
    /// # Errors
    ///
    /// Returns `NoStartLocation` before any start selection, or
    /// `StoreUnavailable`.
    pub fn outgoing_paths(&self, user: &UserId) -> Result<OutgoingPaths<'_>, EngineError> {
        let progress = self
            .store
            .read_progress(user)
            .map_err(store_err)?
            .ok_or(ProgressError::NoStartLocation)?;
        let at = progress
            .current_location_id
            .ok_or(ProgressError::NoStartLocation)?;
        Ok(self.map.outgoing(&at))
    }

    /// Activate a path departing from the user's current location.
    ///
    /// # Errors
    ///
    /// Returns progress contract violations or `StoreUnavailable`.
    pub fn select_path(&self, user: &UserId, path: &PathId) -> Result<UserProgress, EngineError> {
        let mut progress = self
            .store
            .read_progress(user)
            .map_err(store_err)?
            .ok_or(ProgressError::NoStartLocation)?;
        ProgressEngine::new(&self.map).select_path(&mut progress, path, self.clock.now())?;
        self.store.write_progress(&progress).map_err(store_err)?;
        debug!("{user} departs on {path}");
        Ok(progress)
    }

    /// Open a focus session for `user`, optionally bounded by a preset
    /// number of minutes, and persist the open record.
    ///
    /// # Errors
    ///
    /// Fails with `SessionError::AlreadyActive` while a session is open, or
    /// `StoreUnavailable` (the open session is rolled back so the start can
    /// be retried).
    pub fn start_session(
        &mut self,
        user: &UserId,
        preset_minutes: Option<u32>,
    ) -> Result<Session, EngineError> {
        let now = self.clock.now();
        let manager = self.sessions.entry(user.clone()).or_default();
        let session = manager.start(user, preset_minutes, now)?.clone();
        if let Err(err) = self.store.write_session(&session) {
            manager.abandon();
            return Err(store_err(err));
        }
        debug!("{user} opened session {}", session.id);
        Ok(session)
    }

    /// The open session for `user`, if any.
    #[must_use]
    pub fn active_session(&self, user: &UserId) -> Option<&Session> {
        self.sessions.get(user).and_then(SessionManager::active)
    }

    /// Read-only tick: whole seconds elapsed on the open session.
    ///
    /// # Errors
    ///
    /// Fails with `SessionError::NoActiveSession` while idle.
    pub fn elapsed_seconds(&self, user: &UserId) -> Result<i64, EngineError> {
        let manager = self.sessions.get(user).ok_or(SessionError::NoActiveSession)?;
        Ok(manager.elapsed_seconds(self.clock.now())?)
    }

    /// Whether the open session has reached its preset bound; a cue for the
    /// caller to complete it. The engine never completes sessions on its own.
    ///
    /// # Errors
    ///
    /// Fails with `SessionError::NoActiveSession` while idle.
    pub fn preset_expired(&self, user: &UserId) -> Result<bool, EngineError> {
        let manager = self.sessions.get(user).ok_or(SessionError::NoActiveSession)?;
        Ok(manager.preset_expired(self.clock.now())?)
    }

    /// Finalize the open session and, on success, apply the earned distance
    /// to the user's traversal record.
    ///
    /// The finalized session record is written before any distance is
    /// applied; the two writes never interleave for a single completion.
    /// Cancellation finalizes the record and leaves progress untouched.
    /// Distance earned with no path selected is dropped with a no-op travel
    /// outcome.
    ///
    /// # Errors
    ///
    /// Fails with `SessionError::NoActiveSession` while idle (including a
    /// repeated completion), progress reference violations, or
    /// `StoreUnavailable`.
    pub fn complete_session(
        &mut self,
        user: &UserId,
        status: CloseStatus,
    ) -> Result<FocusOutcome, EngineError> {
        let now = self.clock.now();
        let manager = self
            .sessions
            .get_mut(user)
            .ok_or(SessionError::NoActiveSession)?;
        let report = manager.complete(status, now)?;
        // Finalize the historical record before touching progress.
        self.store.write_session(&report.session).map_err(store_err)?;

        let travel = match status {
            CloseStatus::Canceled => None,
            CloseStatus::Success => {
                match self.store.read_progress(user).map_err(store_err)? {
                    None => None,
                    Some(mut progress) => {
                        let outcome = ProgressEngine::new(&self.map).apply_distance(
                            &mut progress,
                            report.creditable_km,
                            now,
                        )?;
                        self.store.write_progress(&progress).map_err(store_err)?;
                        if outcome.arrived {
                            if let Some(destination) = &outcome.new_location_id {
                                info!("{user} arrived at {destination}");
                            }
                        }
                        Some(outcome)
                    }
                }
            }
        };
        info!(
            "{user} closed session {} after {:.1} min ({:.2} km credited)",
            report.session.id, report.elapsed_minutes, report.creditable_km
        );
        Ok(FocusOutcome { report, travel })
    }

    /// Aggregate the user's session history as of now.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` when the store cannot be reached.
    pub fn stats(&self, user: &UserId) -> Result<SessionStats, EngineError> {
        let sessions = self.store.list_sessions(user).map_err(store_err)?;
        Ok(SessionStats::collect(&sessions, self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_clock, fixed_now};
    use chrono::Duration;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStore {
        progress: Rc<RefCell<HashMap<UserId, UserProgress>>>,
        sessions: Rc<RefCell<HashMap<SessionId, Session>>>,
    }

    impl ProgressStore for MemoryStore {
        type Error = Infallible;

        fn read_progress(&self, user: &UserId) -> Result<Option<UserProgress>, Self::Error> {
            Ok(self.progress.borrow().get(user).cloned())
        }

        fn write_progress(&self, progress: &UserProgress) -> Result<(), Self::Error> {
            self.progress
                .borrow_mut()
                .insert(progress.user_id.clone(), progress.clone());
            Ok(())
        }

        fn read_session(&self, id: &SessionId) -> Result<Option<Session>, Self::Error> {
            Ok(self.sessions.borrow().get(id).cloned())
        }

        fn write_session(&self, session: &Session) -> Result<(), Self::Error> {
            self.sessions
                .borrow_mut()
                .insert(session.id.clone(), session.clone());
            Ok(())
        }

        fn list_sessions(&self, user: &UserId) -> Result<Vec<Session>, Self::Error> {
            let mut sessions: Vec<Session> = self
                .sessions
                .borrow()
                .values()
                .filter(|session| &session.user_id == user)
                .cloned()
                .collect();
            sessions.sort_by_key(|session| session.start_at);
            Ok(sessions)
        }
    }

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl MapLoader for FixtureLoader {
        type Error = Infallible;

        fn load_map(&self) -> Result<TravelMap, Self::Error> {
            Ok(fixture_map())
        }
    }

    fn fixture_map() -> TravelMap {
        TravelMap::from_json(
            r#"{
                "locations": [
                    { "id": "a", "name": "A", "is_start": true },
                    { "id": "b", "name": "B" },
                    { "id": "c", "name": "C" }
                ],
                "paths": [
                    { "id": "a-b", "from_location_id": "a", "to_location_id": "b", "distance_km": 10.0 },
                    { "id": "b-c", "from_location_id": "b", "to_location_id": "c", "distance_km": 5.0 }
                ]
            }"#,
        )
        .expect("fixture parses")
    }

    fn engine() -> JourneyEngine<MemoryStore> {
        JourneyEngine::with_clock(fixture_map(), MemoryStore::default(), fixed_clock())
            .expect("fixture map validates")
    }

    fn user() -> UserId {
        UserId::new("traveler-1")
    }

    #[test]
    fn from_loader_builds_a_working_engine() {
        let engine = JourneyEngine::from_loader(&FixtureLoader, MemoryStore::default()).unwrap();
        assert_eq!(engine.map().locations.len(), 3);
    }

    #[test]
    fn engine_rejects_invalid_maps() {
        let mut map = fixture_map();
        map.paths[0].distance_km = -1.0;
        assert!(JourneyEngine::new(map, MemoryStore::default()).is_err());
    }

    #[test]
    fn start_location_and_path_selection_round_trip_through_the_store() {
        let engine = engine();
        let progress = engine.set_start_location(&user(), &LocationId::new("a")).unwrap();
        assert_eq!(progress.current_location_id, Some(LocationId::new("a")));

        let outgoing = engine.outgoing_paths(&user()).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].id, PathId::new("a-b"));

        let progress = engine.select_path(&user(), &PathId::new("a-b")).unwrap();
        assert!(progress.is_traversing());

        let stored = engine.progress(&user()).unwrap().unwrap();
        assert_eq!(stored, progress);
    }

    #[test]
    fn successful_session_advances_progress() {
        let mut engine = engine();
        engine.set_start_location(&user(), &LocationId::new("a")).unwrap();
        engine.select_path(&user(), &PathId::new("a-b")).unwrap();

        engine.start_session(&user(), Some(25)).unwrap();
        engine.clock_mut().advance(Duration::minutes(25));
        assert!(engine.preset_expired(&user()).unwrap());

        let outcome = engine.complete_session(&user(), CloseStatus::Success).unwrap();
        let travel = outcome.travel.expect("success applies distance");
        assert!(!travel.arrived);
        assert!((travel.earned_km - 6.25).abs() < 1e-9);

        let progress = engine.progress(&user()).unwrap().unwrap();
        assert!((progress.progress_km - 6.25).abs() < 1e-9);
    }

    #[test]
    fn canceled_session_leaves_progress_untouched() {
        let mut engine = engine();
        engine.set_start_location(&user(), &LocationId::new("a")).unwrap();
        engine.select_path(&user(), &PathId::new("a-b")).unwrap();
        let before = engine.progress(&user()).unwrap().unwrap();

        engine.start_session(&user(), None).unwrap();
        engine.clock_mut().advance(Duration::minutes(90));
        let outcome = engine.complete_session(&user(), CloseStatus::Canceled).unwrap();
        assert!(outcome.travel.is_none());
        assert_eq!(outcome.report.session.status, SessionStatus::Canceled);

        let after = engine.progress(&user()).unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn session_record_is_finalized_before_distance_lands() {
        let mut engine = engine();
        engine.set_start_location(&user(), &LocationId::new("a")).unwrap();
        engine.select_path(&user(), &PathId::new("a-b")).unwrap();

        let session = engine.start_session(&user(), Some(15)).unwrap();
        let open = engine.store.read_session(&session.id).unwrap().unwrap();
        assert_eq!(open.status, SessionStatus::InProgress);

        engine.clock_mut().advance(Duration::minutes(15));
        engine.complete_session(&user(), CloseStatus::Success).unwrap();
        let closed = engine.store.read_session(&session.id).unwrap().unwrap();
        assert_eq!(closed.status, SessionStatus::Success);
        assert_eq!(closed.end_at, Some(fixed_now() + Duration::minutes(15)));
    }

    #[test]
    fn double_start_and_double_complete_fail_fast() {
        let mut engine = engine();
        engine.set_start_location(&user(), &LocationId::new("a")).unwrap();
        engine.start_session(&user(), Some(25)).unwrap();
        assert!(matches!(
            engine.start_session(&user(), Some(25)),
            Err(EngineError::Session(SessionError::AlreadyActive))
        ));

        engine.complete_session(&user(), CloseStatus::Success).unwrap();
        assert!(matches!(
            engine.complete_session(&user(), CloseStatus::Success),
            Err(EngineError::Session(SessionError::NoActiveSession))
        ));
    }

    #[test]
    fn distance_without_a_selected_path_is_dropped() {
        let mut engine = engine();
        engine.set_start_location(&user(), &LocationId::new("a")).unwrap();

        engine.start_session(&user(), Some(25)).unwrap();
        engine.clock_mut().advance(Duration::minutes(25));
        let outcome = engine.complete_session(&user(), CloseStatus::Success).unwrap();
        let travel = outcome.travel.expect("progress record exists");
        assert!(!travel.arrived);
        assert_eq!(travel.new_location_id, None);

        let progress = engine.progress(&user()).unwrap().unwrap();
        assert!((progress.progress_km - 0.0).abs() < f64::EPSILON);
        assert!(!progress.is_traversing());
    }

    #[test]
    fn stats_aggregate_over_the_stored_history() {
        let mut engine = engine();
        engine.set_start_location(&user(), &LocationId::new("a")).unwrap();
        engine.select_path(&user(), &PathId::new("a-b")).unwrap();

        engine.start_session(&user(), Some(25)).unwrap();
        engine.clock_mut().advance(Duration::minutes(25));
        engine.complete_session(&user(), CloseStatus::Success).unwrap();

        engine.start_session(&user(), None).unwrap();
        engine.clock_mut().advance(Duration::minutes(10));
        engine.complete_session(&user(), CloseStatus::Canceled).unwrap();

        let stats = engine.stats(&user()).unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert!((stats.total_distance_km - 6.25).abs() < 1e-9);
        assert!((stats.total_focus_minutes - 25.0).abs() < 1e-9);
    }
}
