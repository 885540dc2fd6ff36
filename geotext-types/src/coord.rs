use serde::{Deserialize, Serialize};

/// Southernmost latitude, in degrees.
pub const MINIMUM_LATITUDE: f64 = -90.0;
/// Northernmost latitude, in degrees.
pub const MAXIMUM_LATITUDE: f64 = 90.0;
/// Westernmost longitude, in degrees. Longitudes live in the half-open
/// interval `[MINIMUM_LONGITUDE, MAXIMUM_LONGITUDE)`.
pub const MINIMUM_LONGITUDE: f64 = -180.0;
/// Exclusive upper bound on longitude, in degrees.
pub const MAXIMUM_LONGITUDE: f64 = 180.0;

/// How a [`Coord`] constructor treats values outside the globe's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordPolicy {
    /// Store the values as given. The caller is responsible for the bounds.
    #[default]
    Accept,
    /// Reject out-of-range or non-finite values with [`CoordError`].
    Validate,
    /// Clamp latitude into `[-90, 90]` and wrap longitude into `[-180, 180)`.
    Coerce,
}

/// Error returned when a coordinate fails validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordError {
    /// Latitude or longitude is NaN or infinite.
    NotFinite { lat: f64, long: f64 },
    /// Latitude or longitude lies outside the globe's bounds.
    OutOfBounds { lat: f64, long: f64 },
}

impl std::fmt::Display for CoordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFinite { lat, long } => {
                write!(f, "Coordinate ({}, {}) is not finite", lat, long)
            }
            Self::OutOfBounds { lat, long } => write!(
                f,
                "Coordinate ({}, {}) out of range: latitude must be in [{}, {}], longitude in [{}, {})",
                lat, long, MINIMUM_LATITUDE, MAXIMUM_LATITUDE, MINIMUM_LONGITUDE, MAXIMUM_LONGITUDE
            ),
        }
    }
}

impl std::error::Error for CoordError {}

/// A point on the earth's surface in degrees of latitude and longitude.
///
/// Note the argument order: latitude first. This is the opposite of
/// `geo::Point`, whose `x` is longitude; use [`Coord::to_point`] when handing
/// a coordinate to the `geo` crate.
///
/// # Examples
///
/// ```
/// use geotext_types::coord::{Coord, CoordPolicy};
///
/// let austin = Coord::new(30.2672, -97.7431);
/// assert_eq!(austin.lat(), 30.2672);
///
/// // Wrapping and clamping
/// let wrapped = Coord::with_policy(95.0, 190.0, CoordPolicy::Coerce).unwrap();
/// assert_eq!(wrapped.lat(), 90.0);
/// assert_eq!(wrapped.long(), -170.0);
///
/// // Validation
/// assert!(Coord::validated(0.0, 180.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    lat: f64,
    long: f64,
}

impl Coord {
    /// Create a coordinate without any range checking.
    #[inline]
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    /// Create a coordinate, failing if it lies outside the globe's bounds.
    pub fn validated(lat: f64, long: f64) -> Result<Self, CoordError> {
        if !lat.is_finite() || !long.is_finite() {
            return Err(CoordError::NotFinite { lat, long });
        }
        if !(MINIMUM_LATITUDE..=MAXIMUM_LATITUDE).contains(&lat)
            || !(MINIMUM_LONGITUDE..MAXIMUM_LONGITUDE).contains(&long)
        {
            return Err(CoordError::OutOfBounds { lat, long });
        }
        Ok(Self { lat, long })
    }

    /// Create a coordinate, forcing it into the globe's bounds.
    ///
    /// Latitude is clamped; longitude wraps modulo 360. Non-finite input is
    /// passed through unchanged.
    pub fn coerced(lat: f64, long: f64) -> Self {
        let lat = lat.clamp(MINIMUM_LATITUDE, MAXIMUM_LATITUDE);
        let long = (long - MINIMUM_LONGITUDE).rem_euclid(360.0) + MINIMUM_LONGITUDE;
        Self { lat, long }
    }

    /// Create a coordinate according to `policy`.
    pub fn with_policy(lat: f64, long: f64, policy: CoordPolicy) -> Result<Self, CoordError> {
        match policy {
            CoordPolicy::Accept => Ok(Self::new(lat, long)),
            CoordPolicy::Validate => Self::validated(lat, long),
            CoordPolicy::Coerce => Ok(Self::coerced(lat, long)),
        }
    }

    /// Latitude in degrees.
    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[inline]
    pub fn long(&self) -> f64 {
        self.long
    }

    /// Whether the coordinate already satisfies the validation bounds.
    pub fn is_within_bounds(&self) -> bool {
        Self::validated(self.lat, self.long).is_ok()
    }

    /// Euclidean distance in degree space. Ignores longitude wrap-around.
    pub fn degree_distance(&self, other: &Coord) -> f64 {
        let dlat = self.lat - other.lat;
        let dlong = self.long - other.long;
        (dlat * dlat + dlong * dlong).sqrt()
    }

    /// Convert to a `geo::Point` (x = longitude, y = latitude).
    #[inline]
    pub fn to_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.long, self.lat)
    }
}

impl From<Coord> for geo::Coord<f64> {
    fn from(c: Coord) -> Self {
        geo::coord! { x: c.long, y: c.lat }
    }
}

impl From<geo::Coord<f64>> for Coord {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.y, c.x)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2},{:.2})", self.lat, self.long)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_bounds() {
        assert!(Coord::validated(90.0, -180.0).is_ok());
        assert!(Coord::validated(-90.0, 179.999).is_ok());
        assert!(matches!(
            Coord::validated(90.5, 0.0),
            Err(CoordError::OutOfBounds { .. })
        ));
        assert!(matches!(
            Coord::validated(0.0, 180.0),
            Err(CoordError::OutOfBounds { .. })
        ));
        assert!(matches!(
            Coord::validated(f64::NAN, 0.0),
            Err(CoordError::NotFinite { .. })
        ));
    }

    #[test]
    fn test_coerced_is_canonical() {
        let c = Coord::coerced(-100.0, 540.0);
        assert_eq!(c.lat(), -90.0);
        assert_eq!(c.long(), -180.0);

        let c = Coord::coerced(45.0, -190.0);
        assert_eq!(c.long(), 170.0);

        for long in [-720.5, -181.0, -180.0, 0.0, 179.9, 180.0, 359.0, 1000.25] {
            let c = Coord::coerced(0.0, long);
            assert!(c.is_within_bounds(), "{} coerced to {}", long, c.long());
        }
    }

    #[test]
    fn test_accept_keeps_values() {
        let c = Coord::with_policy(123.0, 456.0, CoordPolicy::Accept).unwrap();
        assert_eq!((c.lat(), c.long()), (123.0, 456.0));
        assert!(!c.is_within_bounds());
    }

    #[test]
    fn test_geo_conversion() {
        let c = Coord::new(40.7, -74.0);
        let p = c.to_point();
        assert_eq!(p.x(), -74.0);
        assert_eq!(p.y(), 40.7);

        let back: Coord = geo::Coord::from(c).into();
        assert_eq!(back, c);
    }
}
