//! Static travel map: locations and the directed paths joining them.
//!
//! Reference data only. The engine reads it to resolve edges and validate
//! departures; nothing here is ever mutated by traversal.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

const DEFAULT_MAP_DATA: &str = include_str!("../assets/data/japan.json");

/// Identifier of a map location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub String);

impl LocationId {
    /// Construct an id from a string slice, trimming whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a directed path between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(pub String);

impl PathId {
    /// Construct an id from a string slice, trimming whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a traveling user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Construct an id from a string slice, trimming whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node the user can occupy. Display coordinates belong to the
/// presentation layer and are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Whether this location is a valid journey-start candidate.
    #[serde(default)]
    pub is_start: bool,
}

/// A directed, fixed-length edge between two locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub id: PathId,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub distance_km: f64,
}

/// Paths departing one location. Fan-out per node is small, so the list is
/// stored inline without additional allocations.
pub type OutgoingPaths<'a> = SmallVec<[&'a Path; 4]>;

/// Errors raised when map reference data violates its invariants.
#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("duplicate location id {0}")]
    DuplicateLocation(LocationId),
    #[error("duplicate path id {0}")]
    DuplicatePath(PathId),
    #[error("path {path} has non-positive distance {distance_km:.2}")]
    NonPositiveDistance { path: PathId, distance_km: f64 },
    #[error("path {path} references unknown location {location}")]
    UnknownEndpoint { path: PathId, location: LocationId },
}

/// Complete map data structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TravelMap {
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub paths: Vec<Path>,
}

impl TravelMap {
    /// Parse map data from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON does not match the map schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the embedded default map.
    ///
    /// # Panics
    ///
    /// Panics when the embedded asset is malformed or violates map
    /// invariants; the asset is fixed at compile time.
    #[must_use]
    pub fn load_from_static() -> Self {
        let map = Self::from_json(DEFAULT_MAP_DATA).expect("valid embedded map data");
        map.validate().expect("embedded map data upholds invariants");
        map
    }

    /// Validate referential integrity and distance positivity.
    ///
    /// # Errors
    ///
    /// Returns `MapError` for duplicate ids, non-positive or non-finite
    /// distances, and paths referencing unknown locations.
    pub fn validate(&self) -> Result<(), MapError> {
        let mut location_ids = HashSet::new();
        for location in &self.locations {
            if !location_ids.insert(&location.id) {
                return Err(MapError::DuplicateLocation(location.id.clone()));
            }
        }

        let mut path_ids = HashSet::new();
        for path in &self.paths {
            if !path_ids.insert(&path.id) {
                return Err(MapError::DuplicatePath(path.id.clone()));
            }
            if !path.distance_km.is_finite() || path.distance_km <= 0.0 {
                return Err(MapError::NonPositiveDistance {
                    path: path.id.clone(),
                    distance_km: path.distance_km,
                });
            }
            for endpoint in [&path.from_location_id, &path.to_location_id] {
                if !location_ids.contains(endpoint) {
                    return Err(MapError::UnknownEndpoint {
                        path: path.id.clone(),
                        location: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Look up a location by id.
    #[must_use]
    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        self.locations.iter().find(|location| &location.id == id)
    }

    /// Look up a path by id.
    #[must_use]
    pub fn path(&self, id: &PathId) -> Option<&Path> {
        self.paths.iter().find(|path| &path.id == id)
    }

    /// Paths departing from `location`, in asset order.
    #[must_use]
    pub fn outgoing(&self, location: &LocationId) -> OutgoingPaths<'_> {
        self.paths
            .iter()
            .filter(|path| &path.from_location_id == location)
            .collect()
    }

    /// Locations flagged as journey-start candidates.
    pub fn start_locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter().filter(|location| location.is_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_town_map() -> TravelMap {
        TravelMap::from_json(
            r#"{
                "locations": [
                    { "id": "a", "name": "A", "is_start": true },
                    { "id": "b", "name": "B" }
                ],
                "paths": [
                    { "id": "a-b", "from_location_id": "a", "to_location_id": "b", "distance_km": 5.0 }
                ]
            }"#,
        )
        .expect("fixture parses")
    }

    #[test]
    fn embedded_map_parses_and_validates() {
        let map = TravelMap::load_from_static();
        assert!(map.start_locations().count() >= 1);
        let start = map.start_locations().next().unwrap();
        assert!(
            !map.outgoing(&start.id).is_empty(),
            "start locations must have at least one departure"
        );
    }

    #[test]
    fn lookups_resolve_by_id() {
        let map = two_town_map();
        assert_eq!(map.location(&LocationId::new("a")).unwrap().name, "A");
        assert!(map.location(&LocationId::new("zz")).is_none());
        let path = map.path(&PathId::new("a-b")).unwrap();
        assert_eq!(path.to_location_id, LocationId::new("b"));
        assert!((path.distance_km - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn outgoing_filters_by_origin() {
        let map = two_town_map();
        assert_eq!(map.outgoing(&LocationId::new("a")).len(), 1);
        assert!(map.outgoing(&LocationId::new("b")).is_empty());
    }

    #[test]
    fn validate_rejects_non_positive_distance() {
        let mut map = two_town_map();
        map.paths[0].distance_km = 0.0;
        assert!(matches!(
            map.validate(),
            Err(MapError::NonPositiveDistance { .. })
        ));
    }

    #[test]
    fn validate_rejects_dangling_endpoint() {
        let mut map = two_town_map();
        map.paths[0].to_location_id = LocationId::new("ghost");
        assert!(matches!(
            map.validate(),
            Err(MapError::UnknownEndpoint { location, .. }) if location == LocationId::new("ghost")
        ));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut map = two_town_map();
        map.locations.push(map.locations[0].clone());
        assert!(matches!(
            map.validate(),
            Err(MapError::DuplicateLocation(id)) if id == LocationId::new("a")
        ));
    }
}
