//! Canonical geocoding results.

use geo::Coord;
use serde::{Deserialize, Serialize};

/// A geocoded point.
///
/// Coordinates follow the WGS84 convention used throughout the workspace:
/// `x` is longitude and `y` is latitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResult {
    /// Point position.
    pub coordinates: Coord<f64>,
    /// Full place label.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Feature type, e.g. `city` or `country`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Feature class, e.g. `boundary` or `place`.
    #[serde(default)]
    pub class: Option<String>,
}

impl LocationResult {
    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.coordinates.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.coordinates.x
    }
}

/// Geocoding outcome for one requested location string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationLookup {
    /// Location text as supplied by the caller.
    pub query: String,
    /// Kept results; empty when the lookup failed or found nothing.
    pub results: Vec<LocationResult>,
}

/// Coordinates collected for a batch of location strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMap {
    /// Every kept coordinate, in request order.
    pub coordinates: Vec<Coord<f64>>,
    /// First kept coordinate, or the origin when nothing was found.
    pub center: Coord<f64>,
    /// Per-location outcomes, in request order.
    pub per_location: Vec<LocationLookup>,
}

impl LocationMap {
    /// Assemble a map from per-location lookups.
    ///
    /// # Examples
    ///
    /// ```
    /// use fauna_core::{LocationLookup, LocationMap};
    ///
    /// let map = LocationMap::from_lookups(vec![LocationLookup {
    ///     query: "Atlantis".into(),
    ///     results: Vec::new(),
    /// }]);
    /// assert!(map.coordinates.is_empty());
    /// assert_eq!((map.center.x, map.center.y), (0.0, 0.0));
    /// ```
    #[must_use]
    pub fn from_lookups(per_location: Vec<LocationLookup>) -> Self {
        let coordinates: Vec<Coord<f64>> = per_location
            .iter()
            .flat_map(|lookup| lookup.results.iter().map(|result| result.coordinates))
            .collect();
        let center = coordinates
            .first()
            .copied()
            .unwrap_or(Coord { x: 0.0, y: 0.0 });
        Self {
            coordinates,
            center,
            per_location,
        }
    }
}
