//! Traversal state and the rules that advance it.
//!
//! [`ProgressEngine`] is the sole writer of [`UserProgress`]. It applies
//! earned distance to the active path, resolves arrival when accumulated
//! progress meets or exceeds the path length, and keeps the remainder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{LOG_ARRIVED, LOG_NO_PATH, LOG_TRAVELED};
use crate::map::{LocationId, Path, PathId, TravelMap, UserId};

/// Per-user traversal record.
///
/// Invariant: `progress_km` is non-negative, and strictly less than the
/// active path's length whenever `current_path_id` is set. Reaching the
/// length triggers arrival and a state transition, never a stored overshoot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: UserId,
    #[serde(default)]
    pub current_location_id: Option<LocationId>,
    #[serde(default)]
    pub current_path_id: Option<PathId>,
    #[serde(default)]
    pub progress_km: f64,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    /// Whether the user is mid-edge rather than stationary at a location.
    #[must_use]
    pub const fn is_traversing(&self) -> bool {
        self.current_path_id.is_some()
    }

    /// Kilometers left on the active path, if one is set and resolvable.
    #[must_use]
    pub fn remaining_km(&self, map: &TravelMap) -> Option<f64> {
        let path = map.path(self.current_path_id.as_ref()?)?;
        Some((path.distance_km - self.progress_km).max(0.0))
    }
}

/// Result of one distance application.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelOutcome {
    /// Sanitized distance that was applied.
    pub earned_km: f64,
    /// True when the active path's end was reached (boundary inclusive).
    pub arrived: bool,
    /// Destination location on arrival, `None` otherwise.
    pub new_location_id: Option<LocationId>,
    /// i18n key describing the outcome for presentation layers.
    pub log_key: &'static str,
}

/// Errors raised on traversal contract or reference violations. These
/// indicate caller bugs or stale ids and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("location {0} is not on the map")]
    LocationNotFound(LocationId),
    #[error("path {0} is not on the map")]
    PathNotFound(PathId),
    #[error("path {path} does not depart from {location}")]
    InvalidPathSelection { path: PathId, location: LocationId },
    #[error("already traversing path {path}")]
    AlreadyTraversing { path: PathId },
    #[error("no start location has been selected")]
    NoStartLocation,
}

/// Applies traversal rules against one map. Borrows the map immutably; the
/// map is reference data and is never written through this type.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEngine<'m> {
    map: &'m TravelMap,
}

impl<'m> ProgressEngine<'m> {
    #[must_use]
    pub const fn new(map: &'m TravelMap) -> Self {
        Self { map }
    }

    /// Create or overwrite the traversal record, placing the user at
    /// `location` with no active path and zero progress. Re-selecting the
    /// start is allowed any time the user is not mid-edge.
    ///
    /// # Errors
    ///
    /// Fails with [`ProgressError::LocationNotFound`] for unknown ids and
    /// [`ProgressError::AlreadyTraversing`] while a path is active.
    pub fn set_start_location(
        &self,
        existing: Option<&UserProgress>,
        user: &UserId,
        location: &LocationId,
        now: DateTime<Utc>,
    ) -> Result<UserProgress, ProgressError> {
        if self.map.location(location).is_none() {
            return Err(ProgressError::LocationNotFound(location.clone()));
        }
        if let Some(progress) = existing {
            if let Some(path) = &progress.current_path_id {
                return Err(ProgressError::AlreadyTraversing { path: path.clone() });
            }
        }
        Ok(UserProgress {
            user_id: user.clone(),
            current_location_id: Some(location.clone()),
            current_path_id: None,
            progress_km: 0.0,
            updated_at: now,
        })
    }

    /// Activate a path departing from the user's current location and reset
    /// progress to zero.
    ///
    /// # Errors
    ///
    /// Fails with [`ProgressError::AlreadyTraversing`] mid-edge,
    /// [`ProgressError::PathNotFound`] for unknown ids,
    /// [`ProgressError::NoStartLocation`] before any start selection, and
    /// [`ProgressError::InvalidPathSelection`] when the path does not
    /// originate at the current location.
    pub fn select_path(
        &self,
        progress: &mut UserProgress,
        path_id: &PathId,
        now: DateTime<Utc>,
    ) -> Result<&'m Path, ProgressError> {
        if let Some(active) = &progress.current_path_id {
            return Err(ProgressError::AlreadyTraversing {
                path: active.clone(),
            });
        }
        let path = self
            .map
            .path(path_id)
            .ok_or_else(|| ProgressError::PathNotFound(path_id.clone()))?;
        let at = progress
            .current_location_id
            .as_ref()
            .ok_or(ProgressError::NoStartLocation)?;
        if &path.from_location_id != at {
            return Err(ProgressError::InvalidPathSelection {
                path: path_id.clone(),
                location: at.clone(),
            });
        }
        progress.current_path_id = Some(path.id.clone());
        progress.progress_km = 0.0;
        progress.updated_at = now;
        Ok(path)
    }

    /// Apply earned kilometers to the active path.
    ///
    /// Distance earned while stationary is dropped: without an active path
    /// the record is left untouched and a no-op outcome is returned. On the
    /// active path, accumulated progress below the path length is stored
    /// as-is; meeting or exceeding it (boundary inclusive) relocates the
    /// user to the path's destination, clears the path, and stores the
    /// remainder. Only a single edge is ever resolved per application; any
    /// remainder is forfeited when the next path selection resets progress.
    ///
    /// Non-finite or negative input is sanitized to zero, and zero distance
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// Fails with [`ProgressError::PathNotFound`] when the active path id no
    /// longer resolves against the map.
    pub fn apply_distance(
        &self,
        progress: &mut UserProgress,
        earned_km: f64,
        now: DateTime<Utc>,
    ) -> Result<TravelOutcome, ProgressError> {
        let earned = sanitize_km(earned_km);
        let Some(path_id) = progress.current_path_id.clone() else {
            return Ok(TravelOutcome {
                earned_km: earned,
                arrived: false,
                new_location_id: None,
                log_key: LOG_NO_PATH,
            });
        };
        if earned <= 0.0 {
            return Ok(TravelOutcome {
                earned_km: 0.0,
                arrived: false,
                new_location_id: None,
                log_key: LOG_TRAVELED,
            });
        }
        let path = self
            .map
            .path(&path_id)
            .ok_or(ProgressError::PathNotFound(path_id))?;

        let new_progress = progress.progress_km + earned;
        if new_progress >= path.distance_km {
            let overshoot = new_progress - path.distance_km;
            progress.current_location_id = Some(path.to_location_id.clone());
            progress.current_path_id = None;
            progress.progress_km = overshoot;
            progress.updated_at = now;
            Ok(TravelOutcome {
                earned_km: earned,
                arrived: true,
                new_location_id: Some(path.to_location_id.clone()),
                log_key: LOG_ARRIVED,
            })
        } else {
            progress.progress_km = new_progress;
            progress.updated_at = now;
            Ok(TravelOutcome {
                earned_km: earned,
                arrived: false,
                new_location_id: None,
                log_key: LOG_TRAVELED,
            })
        }
    }
}

const fn sanitize_km(km: f64) -> f64 {
    if km.is_finite() { km.max(0.0) } else { 0.0 }
}
