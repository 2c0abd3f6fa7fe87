//! Location registry
//!
//! The registry turns a raw feed payload into named [`Entity`] values and
//! answers proximity queries against a fixed reference point.
//!
//! # Payload
//!
//! ```text
//! { "Users": [ { "lat": <number>, "lon": <number>, "name": <string> }, ... ] }
//! ```
//!
//! Parsing is all-or-nothing: one bad element rejects the whole payload and the
//! previously published entities stay in place.
//!
//! # Concurrency
//!
//! Each successful refresh builds a complete new [`RegistrySnapshot`] and swaps
//! it in under a write lock held only for the pointer swap. Readers clone the
//! `Arc` and never observe a half-applied refresh.
//!
//! # Distance caching
//!
//! An entity's distance is computed once, when the entity is created during a
//! refresh. Entities are treated as stationary for the lifetime of one
//! population and the value is never recomputed.

use crate::geo::{distance_km, format_distance, Coordinate, CoordinateError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by [`LocationRegistry::refresh`]
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not JSON, no `Users` array, or an element with a missing/mistyped field
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// An element's coordinates are outside the valid ranges
    #[error("user {index} ('{name}') has an invalid position: {source}")]
    InvalidPosition {
        index: usize,
        name: String,
        #[source]
        source: CoordinateError,
    },
}

/// Top-level feed document
#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(rename = "Users")]
    users: Vec<UserRecord>,
}

/// One element of the `Users` array
#[derive(Debug, Deserialize)]
struct UserRecord {
    lat: f64,
    lon: f64,
    name: String,
}

/// A named remote location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    name: String,
    position: Coordinate,
    /// Kilometres from the reference point, fixed at creation
    distance_km: f64,
}

impl Entity {
    fn new(name: String, position: Coordinate, reference: Coordinate) -> Self {
        Self {
            distance_km: distance_km(reference, position),
            name,
            position,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    /// Human-readable distance label
    pub fn distance_label(&self) -> String {
        format_distance(self.distance_km)
    }
}

/// Immutable view of one registry population
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    /// Entities in payload order
    pub entities: Vec<Entity>,
    /// When this population was published (`None` before the first refresh)
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Incremented on every successful refresh
    pub generation: u64,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        Self {
            entities: Vec::new(),
            refreshed_at: None,
            generation: 0,
        }
    }

    /// Entity closest to the reference point; earliest wins on exact ties
    pub fn closest(&self) -> Option<&Entity> {
        self.entities.iter().fold(None, |best: Option<&Entity>, entity| match best {
            Some(current) if current.distance_km <= entity.distance_km => Some(current),
            _ => Some(entity),
        })
    }
}

/// Registry of friend locations measured against a fixed reference point
#[derive(Debug)]
pub struct LocationRegistry {
    reference: Coordinate,
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl LocationRegistry {
    /// Create an empty registry anchored at `reference`
    pub fn new(reference: Coordinate) -> Self {
        Self {
            reference,
            current: RwLock::new(Arc::new(RegistrySnapshot::empty())),
        }
    }

    pub fn reference(&self) -> Coordinate {
        self.reference
    }

    /// Replace all entities with the contents of `payload`
    ///
    /// Returns the number of entities now registered. On error nothing changes.
    pub fn refresh(&self, payload: &str) -> Result<usize, ParseError> {
        let entities = parse_payload(payload, self.reference)?;
        let count = entities.len();

        let mut current = self.current.write();
        let next = RegistrySnapshot {
            entities,
            refreshed_at: Some(Utc::now()),
            generation: current.generation + 1,
        };
        *current = Arc::new(next);

        Ok(count)
    }

    /// Entity with the smallest distance, `None` when empty
    pub fn closest(&self) -> Option<Entity> {
        self.snapshot().closest().cloned()
    }

    /// All entities in payload order
    pub fn all(&self) -> Vec<Entity> {
        self.snapshot().entities.clone()
    }

    /// The currently published population
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    pub fn len(&self) -> usize {
        self.current.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a feed payload into entities, failing on the first bad element
fn parse_payload(payload: &str, reference: Coordinate) -> Result<Vec<Entity>, ParseError> {
    let parsed: Payload = serde_json::from_str(payload)?;

    parsed
        .users
        .into_iter()
        .enumerate()
        .map(|(index, user)| {
            let position = Coordinate::new(user.lat, user.lon).map_err(|source| {
                ParseError::InvalidPosition {
                    index,
                    name: user.name.clone(),
                    source,
                }
            })?;
            Ok(Entity::new(user.name, position, reference))
        })
        .collect()
}
