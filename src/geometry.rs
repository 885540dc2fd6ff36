//! Spherical geometry and region-index arithmetic.
//!
//! The earth is cut into square *tiling regions* of `degrees_per_region` on a
//! side, addressed by the integer indices of their southwest corner. A
//! *statistical region* is a `width x width` block of tiling regions, also
//! addressed by its southwest corner; with a width above 1, statistical
//! regions overlap.

use crate::config::{Config, MINIMUM_REGION_SIZE_DEGREES};
use geotext_types::bbox::{BoundingBox, EARTH_RADIUS_IN_MILES};
use geotext_types::coord::{
    Coord, MAXIMUM_LATITUDE, MAXIMUM_LONGITUDE, MINIMUM_LATITUDE, MINIMUM_LONGITUDE,
};
use serde::{Deserialize, Serialize};

/// Distance reported when either endpoint is unknown or the computation
/// breaks down. Large enough to rank below any real distance.
pub const SENTINEL_DISTANCE: f64 = 1_000_000.0;

/// Cosines this far past +/-1 are still treated as rounding error.
const COSINE_TOLERANCE: f64 = 1.000001;

/// Great-circle distance in miles between two optional coordinates.
///
/// Uses the spherical law of cosines. A missing coordinate yields
/// [`SENTINEL_DISTANCE`] rather than an error so that rankings degrade
/// gracefully.
///
/// # Examples
///
/// ```
/// use geotext::geometry::{spheredist, SENTINEL_DISTANCE};
/// use geotext::Coord;
///
/// let austin = Coord::new(30.2672, -97.7431);
/// let dallas = Coord::new(32.7767, -96.7970);
/// let miles = spheredist(Some(&austin), Some(&dallas));
/// assert!(miles > 180.0 && miles < 185.0);
///
/// assert_eq!(spheredist(None, Some(&austin)), SENTINEL_DISTANCE);
/// ```
pub fn spheredist(p1: Option<&Coord>, p2: Option<&Coord>) -> f64 {
    let (Some(p1), Some(p2)) = (p1, p2) else {
        return SENTINEL_DISTANCE;
    };
    if p1 == p2 {
        return 0.0;
    }

    let lat1 = p1.lat().to_radians();
    let lat2 = p2.lat().to_radians();
    let dlong = (p2.long() - p1.long()).to_radians();

    let anglecos = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlong.cos();

    if anglecos.abs() > 1.0 {
        if anglecos.abs() > COSINE_TOLERANCE {
            log::warn!(
                "Out-of-range cosine {} computing spherical distance between {} and {}",
                anglecos,
                p1,
                p2
            );
            return SENTINEL_DISTANCE;
        }
        return if anglecos > 0.0 {
            0.0
        } else {
            EARTH_RADIUS_IN_MILES * std::f64::consts::PI
        };
    }
    if anglecos.is_nan() {
        log::warn!(
            "Non-finite cosine computing spherical distance between {} and {}",
            p1,
            p2
        );
        return SENTINEL_DISTANCE;
    }

    EARTH_RADIUS_IN_MILES * anglecos.acos()
}

/// Great-circle distance in miles between two known coordinates.
#[inline]
pub fn distance(a: &Coord, b: &Coord) -> f64 {
    spheredist(Some(a), Some(b))
}

/// Integer indices of a region's southwest corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionIndex {
    pub latind: i32,
    pub longind: i32,
}

impl RegionIndex {
    pub const fn new(latind: i32, longind: i32) -> Self {
        Self { latind, longind }
    }
}

impl std::fmt::Display for RegionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.latind, self.longind)
    }
}

/// Region arithmetic for one region size and statistical-region width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionGeometry {
    degrees_per_region: f64,
    stat_region_width: u32,
    minimum_latind: i32,
    maximum_latind: i32,
    minimum_longind: i32,
    maximum_longind: i32,
}

impl RegionGeometry {
    /// # Panics
    ///
    /// Panics if `degrees_per_region` is below
    /// [`MINIMUM_REGION_SIZE_DEGREES`] or `stat_region_width` is zero.
    /// [`Config::validate`] rejects both.
    pub fn new(degrees_per_region: f64, stat_region_width: u32) -> Self {
        assert!(
            degrees_per_region.is_finite() && degrees_per_region >= MINIMUM_REGION_SIZE_DEGREES,
            "Region size must be at least {} degrees, got {}",
            MINIMUM_REGION_SIZE_DEGREES,
            degrees_per_region
        );
        assert!(stat_region_width > 0, "Statistical region width must be positive");

        let floor_div = |value: f64| (value / degrees_per_region).floor() as i32;
        // Keep the North Pole (and the antimeridian) out of a region of their own.
        Self {
            degrees_per_region,
            stat_region_width,
            minimum_latind: floor_div(MINIMUM_LATITUDE),
            maximum_latind: floor_div(MAXIMUM_LATITUDE - 1e-10),
            minimum_longind: floor_div(MINIMUM_LONGITUDE),
            maximum_longind: floor_div(MAXIMUM_LONGITUDE - 1e-10),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.region_size_degrees(), config.statistical_region_width)
    }

    pub fn degrees_per_region(&self) -> f64 {
        self.degrees_per_region
    }

    pub fn stat_region_width(&self) -> u32 {
        self.stat_region_width
    }

    pub fn latind_range(&self) -> std::ops::RangeInclusive<i32> {
        self.minimum_latind..=self.maximum_latind
    }

    pub fn longind_range(&self) -> std::ops::RangeInclusive<i32> {
        self.minimum_longind..=self.maximum_longind
    }

    fn num_longinds(&self) -> i32 {
        self.maximum_longind - self.minimum_longind + 1
    }

    /// Number of tiling regions on the globe. Statistical regions share
    /// their southwest-corner indices with tiling regions, so this is also
    /// the number of distinct statistical regions.
    pub fn num_tiling_regions(&self) -> usize {
        let lats = (self.maximum_latind - self.minimum_latind + 1) as usize;
        lats * self.num_longinds() as usize
    }

    /// Wrap a longitude index that ran off either side of the globe.
    pub fn wrap_longind(&self, longind: i32) -> i32 {
        (longind - self.minimum_longind).rem_euclid(self.num_longinds()) + self.minimum_longind
    }

    /// Indices of the tiling region containing `coord`.
    ///
    /// Latitude indices are clamped to the globe and longitude indices wrap,
    /// so the poles and the antimeridian land in edge regions.
    pub fn coord_to_tiling_indices(&self, coord: &Coord) -> RegionIndex {
        let latind = (coord.lat() / self.degrees_per_region).floor() as i32;
        let longind = (coord.long() / self.degrees_per_region).floor() as i32;
        RegionIndex::new(
            latind.clamp(self.minimum_latind, self.maximum_latind),
            self.wrap_longind(longind),
        )
    }

    /// Indices of the statistical region centered (as nearly as the width
    /// allows) on the tiling region containing `coord`.
    pub fn coord_to_stat_indices(&self, coord: &Coord) -> RegionIndex {
        let subval = (self.stat_region_width as f64 - 1.0) / 2.0 * self.degrees_per_region;
        self.coord_to_tiling_indices(&Coord::new(coord.lat() - subval, coord.long() - subval))
    }

    /// Coordinate of the point with the given (possibly fractional) indices.
    pub fn region_indices_to_coord(&self, latind: f64, longind: f64, coerce: bool) -> Coord {
        let lat = latind * self.degrees_per_region;
        let long = longind * self.degrees_per_region;
        if coerce {
            Coord::coerced(lat, long)
        } else {
            Coord::new(lat, long)
        }
    }

    fn offset_to_coord(&self, index: RegionIndex, lat_offset: f64, long_offset: f64) -> Coord {
        self.region_indices_to_coord(
            index.latind as f64 + lat_offset,
            index.longind as f64 + long_offset,
            true,
        )
    }

    pub fn tiling_sw_corner(&self, index: RegionIndex) -> Coord {
        self.region_indices_to_coord(index.latind as f64, index.longind as f64, false)
    }

    pub fn tiling_center(&self, index: RegionIndex) -> Coord {
        self.offset_to_coord(index, 0.5, 0.5)
    }

    pub fn tiling_ne_corner(&self, index: RegionIndex) -> Coord {
        self.offset_to_coord(index, 1.0, 1.0)
    }

    pub fn stat_sw_corner(&self, index: RegionIndex) -> Coord {
        self.tiling_sw_corner(index)
    }

    pub fn stat_center(&self, index: RegionIndex) -> Coord {
        let half = self.stat_region_width as f64 / 2.0;
        self.offset_to_coord(index, half, half)
    }

    pub fn stat_ne_corner(&self, index: RegionIndex) -> Coord {
        let width = self.stat_region_width as f64;
        self.offset_to_coord(index, width, width)
    }

    pub fn stat_nw_corner(&self, index: RegionIndex) -> Coord {
        self.offset_to_coord(index, self.stat_region_width as f64, 0.0)
    }

    pub fn stat_se_corner(&self, index: RegionIndex) -> Coord {
        self.offset_to_coord(index, 0.0, self.stat_region_width as f64)
    }

    /// Boundary of the statistical region with the given southwest indices.
    pub fn stat_region_boundary(&self, index: RegionIndex) -> BoundingBox {
        BoundingBox::new(
            Coord::coerced(
                index.latind as f64 * self.degrees_per_region,
                index.longind as f64 * self.degrees_per_region,
            ),
            self.stat_ne_corner(index),
        )
    }

    /// Tiling regions that make up a statistical region. Latitude is
    /// truncated at the poles and longitude wraps around.
    pub fn stat_region_tiles(&self, index: RegionIndex) -> impl Iterator<Item = RegionIndex> + '_ {
        let width = self.stat_region_width as i32;
        let lat_end = (index.latind + width).min(self.maximum_latind + 1);
        (index.latind..lat_end).flat_map(move |i| {
            (index.longind..index.longind + width)
                .map(move |j| RegionIndex::new(i, self.wrap_longind(j)))
        })
    }

    /// Statistical regions whose tiles include the given tiling region.
    pub fn stat_regions_covering_tile(
        &self,
        tile: RegionIndex,
    ) -> impl Iterator<Item = RegionIndex> + '_ {
        let width = self.stat_region_width as i32;
        let lat_start = (tile.latind - width + 1).max(self.minimum_latind);
        (lat_start..=tile.latind).flat_map(move |i| {
            (tile.longind - width + 1..=tile.longind)
                .map(move |j| RegionIndex::new(i, self.wrap_longind(j)))
        })
    }
}
