use crate::coord::Coord;
use geo::Rect;
use serde::{Deserialize, Serialize};

/// Radius of the earth in miles, used for great-circle distances and areas.
pub const EARTH_RADIUS_IN_MILES: f64 = 3963.191;

/// A latitude/longitude rectangle given by its southwest and northeast corners.
///
/// When the southwest longitude is greater than the northeast longitude the
/// box is taken to straddle the date line.
///
/// # Examples
///
/// ```
/// use geotext_types::bbox::BoundingBox;
/// use geotext_types::coord::Coord;
///
/// let texas = BoundingBox::new(Coord::new(25.8, -106.6), Coord::new(36.5, -93.5));
/// assert!(texas.contains(&Coord::new(30.27, -97.74)));
/// assert_eq!(texas.nw(), Coord::new(36.5, -106.6));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    sw: Coord,
    ne: Coord,
}

impl BoundingBox {
    /// Create a box from its southwest and northeast corners.
    pub fn new(sw: Coord, ne: Coord) -> Self {
        Self { sw, ne }
    }

    /// Create a degenerate box covering a single coordinate.
    pub fn from_coord(coord: Coord) -> Self {
        Self {
            sw: coord,
            ne: coord,
        }
    }

    /// Create a box from a `geo::Rect` (x = longitude, y = latitude).
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            sw: rect.min().into(),
            ne: rect.max().into(),
        }
    }

    pub fn sw(&self) -> Coord {
        self.sw
    }

    pub fn ne(&self) -> Coord {
        self.ne
    }

    pub fn nw(&self) -> Coord {
        Coord::new(self.ne.lat(), self.sw.long())
    }

    pub fn se(&self) -> Coord {
        Coord::new(self.sw.lat(), self.ne.long())
    }

    /// Whether the box wraps across the 180th meridian.
    pub fn crosses_date_line(&self) -> bool {
        self.sw.long() > self.ne.long()
    }

    /// Longitudinal extent in degrees, accounting for date-line wrap.
    pub fn width(&self) -> f64 {
        if self.crosses_date_line() {
            self.ne.long() + 360.0 - self.sw.long()
        } else {
            self.ne.long() - self.sw.long()
        }
    }

    /// Latitudinal extent in degrees.
    pub fn height(&self) -> f64 {
        self.ne.lat() - self.sw.lat()
    }

    /// Geometric midpoint of the box.
    pub fn center(&self) -> Coord {
        Coord::coerced(
            (self.sw.lat() + self.ne.lat()) / 2.0,
            self.sw.long() + self.width() / 2.0,
        )
    }

    /// Inclusive containment test, aware of boxes that straddle the date line.
    pub fn contains(&self, coord: &Coord) -> bool {
        if coord.lat() < self.sw.lat() || coord.lat() > self.ne.lat() {
            return false;
        }
        let long = coord.long();
        if !self.crosses_date_line() {
            long >= self.sw.long() && long <= self.ne.long()
        } else {
            (long >= self.sw.long() && long <= self.ne.long() + 360.0)
                || (long >= self.sw.long() - 360.0 && long <= self.ne.long())
        }
    }

    /// Grow the box so that it covers `coord`. Never produces a date-line box.
    pub fn extend(&mut self, coord: &Coord) {
        self.sw = Coord::new(
            self.sw.lat().min(coord.lat()),
            self.sw.long().min(coord.long()),
        );
        self.ne = Coord::new(
            self.ne.lat().max(coord.lat()),
            self.ne.long().max(coord.long()),
        );
    }

    /// Surface area of the box in square miles on a spherical earth.
    pub fn square_area(&self) -> f64 {
        let lat1 = self.sw.lat().to_radians();
        let lat2 = self.ne.lat().to_radians();
        let width = self.width().to_radians();
        EARTH_RADIUS_IN_MILES * EARTH_RADIUS_IN_MILES * (lat1.sin() - lat2.sin()).abs() * width
    }

    /// A box with every corner moved toward the center by `fraction`.
    ///
    /// `fraction = 0.5` gives the inner boundary that renderers draw so that
    /// adjacent regions don't touch.
    pub fn shrink_toward_center(&self, fraction: f64) -> Self {
        let center = self.center();
        let pull = |corner: Coord, center_long: f64| {
            Coord::new(
                corner.lat() + (center.lat() - corner.lat()) * fraction,
                corner.long() + (center_long - corner.long()) * fraction,
            )
        };
        // Unwrap the center so the interpolation runs along the box.
        let center_long = self.sw.long() + self.width() / 2.0;
        let sw = pull(self.sw, center_long);
        let ne_long = self.sw.long() + self.width();
        let ne = pull(Coord::new(self.ne.lat(), ne_long), center_long);
        Self::new(sw, Coord::coerced(ne.lat(), ne.long()))
    }

    /// Convert to a `geo::Rect`. Date-line boxes are unwrapped past 180.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            geo::coord! { x: self.sw.long(), y: self.sw.lat() },
            geo::coord! { x: self.sw.long() + self.width(), y: self.ne.lat() },
        )
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.sw, self.ne)
    }
}
