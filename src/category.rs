//! Place categories and their search profiles.
//!
//! Every category has a fixed-shape description (Overpass filter, display
//! name, color, GPX symbol, waypoint prefix). The only user-tunable part is
//! the maximum distance from the route, carried by [`SearchProfile`] and
//! validated when the profile is built.

use std::fmt;
use std::str::FromStr;

use crate::FinderError;

/// Detection radius for speed cameras, which must sit on the route itself.
pub const SPEED_CAMERA_DISTANCE_KM: f64 = 0.05;

/// A kind of place to search for along the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "http", serde(rename_all = "snake_case"))]
pub enum Category {
    Fuel,
    Supermarket,
    Bakery,
    Cafe,
    Repair,
    Accommodation,
    SpeedCamera,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 7] = [
        Category::Fuel,
        Category::Supermarket,
        Category::Bakery,
        Category::Cafe,
        Category::Repair,
        Category::Accommodation,
        Category::SpeedCamera,
    ];

    /// Stable identifier, also used in output file names.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Fuel => "fuel",
            Category::Supermarket => "supermarket",
            Category::Bakery => "bakery",
            Category::Cafe => "cafe",
            Category::Repair => "repair",
            Category::Accommodation => "accommodation",
            Category::SpeedCamera => "speed_camera",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Fuel => "Petrol Station",
            Category::Supermarket => "Supermarket",
            Category::Bakery => "Bakery",
            Category::Cafe => "Café/Restaurant",
            Category::Repair => "Repair Shop",
            Category::Accommodation => "Accommodation",
            Category::SpeedCamera => "Speed Camera",
        }
    }

    /// Overpass QL filter selecting this category's nodes.
    pub fn filter(&self) -> &'static str {
        match self {
            Category::Fuel => r#"node["amenity"="fuel"]"#,
            Category::Supermarket => r#"node["shop"="supermarket"]"#,
            Category::Bakery => r#"node["shop"="bakery"]"#,
            Category::Cafe => r#"node["amenity"~"^(cafe|restaurant|fast_food)$"]"#,
            Category::Repair => r#"node["shop"~"^(car_repair|motorcycle)$"]"#,
            Category::Accommodation => {
                r#"node["tourism"~"^(hotel|motel|guest_house|hostel|camp_site|caravan_site)$"]"#
            }
            Category::SpeedCamera => r#"node["highway"="speed_camera"]"#,
        }
    }

    /// Map marker color.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Fuel => "red",
            Category::Supermarket => "blue",
            Category::Bakery => "orange",
            Category::Cafe => "green",
            Category::Repair => "purple",
            Category::Accommodation => "brown",
            Category::SpeedCamera => "darkred",
        }
    }

    /// Garmin-compatible waypoint symbol.
    pub fn gpx_symbol(&self) -> &'static str {
        match self {
            Category::Fuel => "Gas Station",
            Category::Supermarket => "Shopping Center",
            Category::Bakery | Category::Cafe => "Restaurant",
            Category::Repair => "Car Repair",
            Category::Accommodation => "Lodging",
            Category::SpeedCamera => "Danger",
        }
    }

    /// Short label used in waypoint names, e.g. `Fuel 3`.
    pub fn waypoint_prefix(&self) -> &'static str {
        match self {
            Category::Fuel => "Fuel",
            Category::Supermarket => "Market",
            Category::Bakery => "Bakery",
            Category::Cafe => "Cafe",
            Category::Repair => "Repair",
            Category::Accommodation => "Hotel",
            Category::SpeedCamera => "SpeedCam",
        }
    }

    /// Speed cameras only count when they are on the route line itself.
    pub fn on_route_only(&self) -> bool {
        matches!(self, Category::SpeedCamera)
    }

    /// Default maximum distance from the route in km.
    pub fn default_max_distance_km(&self) -> f64 {
        match self {
            Category::Fuel => 5.0,
            Category::SpeedCamera => SPEED_CAMERA_DISTANCE_KM,
            _ => 0.1,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let found = match wanted.as_str() {
            // Common aliases
            "petrol" | "gas" => Some(Category::Fuel),
            "restaurant" => Some(Category::Cafe),
            "hotel" | "lodging" => Some(Category::Accommodation),
            "hazard" | "camera" | "speed-camera" => Some(Category::SpeedCamera),
            other => Category::ALL.into_iter().find(|c| c.key() == other),
        };
        found.ok_or_else(|| FinderError::InvalidConfig(format!("unknown category '{s}'")))
    }
}

/// A category plus its maximum distance from the route.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "http", serde(try_from = "RawProfile"))]
pub struct SearchProfile {
    category: Category,
    max_distance_km: f64,
}

impl SearchProfile {
    /// Build a profile, rejecting non-finite or non-positive distances.
    ///
    /// Speed cameras ignore `max_distance_km` and always use
    /// [`SPEED_CAMERA_DISTANCE_KM`].
    pub fn new(category: Category, max_distance_km: f64) -> Result<Self, FinderError> {
        if category.on_route_only() {
            return Ok(Self::with_default(category));
        }
        if !max_distance_km.is_finite() || max_distance_km <= 0.0 {
            return Err(FinderError::InvalidConfig(format!(
                "distance for {} must be a positive number of km, got {max_distance_km}",
                category.display_name()
            )));
        }
        Ok(Self { category, max_distance_km })
    }

    /// Profile using the category's default distance.
    pub fn with_default(category: Category) -> Self {
        Self {
            category,
            max_distance_km: category.default_max_distance_km(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn max_distance_km(&self) -> f64 {
        self.max_distance_km
    }

    /// Buffer radius in degrees for this profile.
    pub fn buffer_degrees(&self) -> f64 {
        crate::geo_utils::km_to_buffer_degrees(self.max_distance_km)
    }
}

#[cfg(feature = "http")]
#[derive(serde::Deserialize)]
struct RawProfile {
    category: Category,
    max_distance_km: Option<f64>,
}

#[cfg(feature = "http")]
impl TryFrom<RawProfile> for SearchProfile {
    type Error = FinderError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        match raw.max_distance_km {
            Some(km) => SearchProfile::new(raw.category, km),
            None => Ok(SearchProfile::with_default(raw.category)),
        }
    }
}
