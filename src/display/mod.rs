//! Front-end state for a map or terminal view
//!
//! [`MapView`] holds the little state a front end keeps on top of the registry
//! (whether friends are shown) and produces the markers and messages it
//! displays. It draws nothing itself.

use crate::geo::{format_distance, Coordinate};
use crate::registry::LocationRegistry;
use serde::Serialize;

/// Title of the reference marker
pub const REFERENCE_TITLE: &str = "You";

/// Snippet of the reference marker
pub const REFERENCE_SNIPPET: &str = "Your current location.";

pub const NO_FRIENDS_MESSAGE: &str = "No friends found :(";

/// A labelled point to draw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub title: String,
    pub snippet: String,
    pub position: Coordinate,
}

/// Visibility state and message formatting for one view
#[derive(Debug, Default)]
pub struct MapView {
    friends_visible: bool,
}

impl MapView {
    /// New view with friends hidden until the first data notification
    pub fn new() -> Self {
        Self::default()
    }

    pub fn friends_visible(&self) -> bool {
        self.friends_visible
    }

    /// Called when the poll loop reports new data; friends become visible
    pub fn on_data_changed(&mut self) {
        self.friends_visible = true;
    }

    /// Flip visibility and return the new value
    pub fn toggle_visibility(&mut self) -> bool {
        self.friends_visible = !self.friends_visible;
        self.friends_visible
    }

    /// Reference marker first, then one marker per visible friend
    pub fn markers(&self, registry: &LocationRegistry) -> Vec<Marker> {
        let mut markers = vec![Marker {
            title: REFERENCE_TITLE.to_string(),
            snippet: REFERENCE_SNIPPET.to_string(),
            position: registry.reference(),
        }];

        if self.friends_visible {
            markers.extend(registry.all().into_iter().map(|entity| Marker {
                title: entity.name().to_string(),
                snippet: entity.distance_label(),
                position: entity.position(),
            }));
        }

        markers
    }

    /// Answer to a "find nearest" request
    ///
    /// Hidden friends are never reported.
    pub fn closest_message(&self, registry: &LocationRegistry) -> String {
        match registry.closest() {
            Some(entity) if self.friends_visible => format!(
                "{} is the closest friend ( {})",
                entity.name(),
                format_distance(entity.distance_km())
            ),
            _ => NO_FRIENDS_MESSAGE.to_string(),
        }
    }
}

pub fn visibility_message(visible: bool) -> &'static str {
    if visible {
        "Friends are now visible."
    } else {
        "Friends are now hidden."
    }
}

pub fn recenter_message() -> &'static str {
    "Moved camera to user position."
}
