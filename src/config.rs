//! Configuration for grids, regions and smoothing.
//!
//! A [`Config`] is plain data: it is validated once and then handed to
//! [`crate::grid::build_grid`] and [`crate::geometry::RegionGeometry`]. Nothing
//! here is process-global.

use crate::error::{GeotextError, Result};
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Miles per degree of latitude (and of longitude at the equator).
pub const MILES_PER_DEGREE: f64 =
    std::f64::consts::PI * 2.0 * geotext_types::bbox::EARTH_RADIUS_IN_MILES / 360.0;

/// Smallest accepted region size, in degrees. Finer tilings overflow the
/// region index arithmetic.
pub const MINIMUM_REGION_SIZE_DEGREES: f64 = 1e-4;

/// Side length of a tiling region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSize {
    Degrees(f64),
    /// Converted to degrees through [`MILES_PER_DEGREE`].
    Miles(f64),
}

impl RegionSize {
    pub fn degrees(&self) -> f64 {
        match *self {
            RegionSize::Degrees(d) => d,
            RegionSize::Miles(m) => m / MILES_PER_DEGREE,
        }
    }
}

impl Default for RegionSize {
    fn default() -> Self {
        RegionSize::Degrees(1.0)
    }
}

/// How a KD-tree node chooses the value it splits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Midpoint of the node's extent along the widest axis.
    #[default]
    Halfway,
    /// Median of the node's points along the widest axis.
    Median,
    /// Middle of the widest gap between consecutive points.
    MaxMargin,
}

/// How a cell reports its centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentroidStrategy {
    /// Midpoint of the cell boundary.
    Geometric,
    /// Mean of the coordinates of the documents in the cell.
    #[default]
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformConfig {
    #[serde(default = "default_training_passes")]
    pub training_passes: usize,
}

impl Default for UniformConfig {
    fn default() -> Self {
        Self {
            training_passes: default_training_passes(),
        }
    }
}

/// Settings for an adaptive KD-tree grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdTreeConfig {
    /// Leaves holding more documents than this are split.
    #[serde(default = "KdTreeConfig::default_bucket_size")]
    pub bucket_size: usize,

    #[serde(default)]
    pub split_method: SplitMethod,

    /// Expose interior nodes as cells as well as leaves.
    #[serde(default)]
    pub use_backoff: bool,

    /// Weight of the parent distribution when smoothing a node; 0 disables.
    #[serde(default)]
    pub interpolation_weight: f64,

    #[serde(default = "default_training_passes")]
    pub training_passes: usize,
}

impl KdTreeConfig {
    const fn default_bucket_size() -> usize {
        200
    }

    pub fn with_bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    pub fn with_split_method(mut self, method: SplitMethod) -> Self {
        self.split_method = method;
        self
    }

    pub fn with_backoff(mut self, use_backoff: bool) -> Self {
        self.use_backoff = use_backoff;
        self
    }

    pub fn with_interpolation_weight(mut self, weight: f64) -> Self {
        self.interpolation_weight = weight;
        self
    }

    pub fn with_training_passes(mut self, passes: usize) -> Self {
        self.training_passes = passes;
        self
    }
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            bucket_size: Self::default_bucket_size(),
            split_method: SplitMethod::default(),
            use_backoff: false,
            interpolation_weight: 0.0,
            training_passes: default_training_passes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedConfig {
    pub grids: Vec<GridConfig>,
}

/// Which kind of grid to build, tagged by `kind` in serialized form.
///
/// ```json
/// { "kind": "combined", "grids": [
///     { "kind": "uniform" },
///     { "kind": "kdtree", "bucket_size": 50, "use_backoff": true }
/// ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridConfig {
    Uniform(UniformConfig),
    Kdtree(KdTreeConfig),
    Combined(CombinedConfig),
}

impl GridConfig {
    /// Number of training passes the grid will ask for.
    pub fn training_passes(&self) -> usize {
        match self {
            GridConfig::Uniform(c) => c.training_passes,
            GridConfig::Kdtree(c) => c.training_passes,
            GridConfig::Combined(c) => c
                .grids
                .iter()
                .map(GridConfig::training_passes)
                .max()
                .unwrap_or(0),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            GridConfig::Uniform(c) => {
                if c.training_passes == 0 {
                    return Err("Training passes must be greater than zero".to_string());
                }
            }
            GridConfig::Kdtree(c) => {
                if c.bucket_size == 0 {
                    return Err("KD-tree bucket size must be greater than zero".to_string());
                }
                if !(0.0..=1.0).contains(&c.interpolation_weight) {
                    return Err(format!(
                        "Interpolation weight must be in [0, 1], got: {}",
                        c.interpolation_weight
                    ));
                }
                if c.training_passes == 0 {
                    return Err("Training passes must be greater than zero".to_string());
                }
            }
            GridConfig::Combined(c) => {
                if c.grids.is_empty() {
                    return Err("Combined grid needs at least one sub-grid".to_string());
                }
                for (idx, sub) in c.grids.iter().enumerate() {
                    sub.validate()
                        .map_err(|e| format!("Sub-grid at index {}: {}", idx, e))?;
                }
            }
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig::Uniform(UniformConfig::default())
    }
}

fn default_training_passes() -> usize {
    1
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub region_size: RegionSize,

    /// Tiling regions per side of a statistical region.
    #[serde(default = "Config::default_statistical_region_width")]
    pub statistical_region_width: u32,

    #[serde(default)]
    pub centroid_strategy: CentroidStrategy,

    /// Words with a smaller count in a cell are dropped from its model.
    #[serde(default)]
    pub minimum_word_count: u32,

    #[serde(default)]
    pub grid: GridConfig,
}

impl Config {
    const fn default_statistical_region_width() -> u32 {
        1
    }

    pub fn with_region_size(mut self, size: RegionSize) -> Self {
        self.region_size = size;
        self
    }

    pub fn with_region_size_degrees(self, degrees: f64) -> Self {
        self.with_region_size(RegionSize::Degrees(degrees))
    }

    pub fn with_statistical_region_width(mut self, width: u32) -> Self {
        assert!(width > 0, "Statistical region width must be greater than zero");
        self.statistical_region_width = width;
        self
    }

    pub fn with_centroid_strategy(mut self, strategy: CentroidStrategy) -> Self {
        self.centroid_strategy = strategy;
        self
    }

    pub fn with_minimum_word_count(mut self, count: u32) -> Self {
        self.minimum_word_count = count;
        self
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    /// Region size in degrees after unit conversion.
    pub fn region_size_degrees(&self) -> f64 {
        self.region_size.degrees()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let degrees = self.region_size_degrees();
        if !degrees.is_finite() || degrees <= 0.0 {
            return Err(format!("Region size must be positive, got: {}", degrees));
        }
        if degrees < MINIMUM_REGION_SIZE_DEGREES {
            return Err(format!(
                "Region size {} degrees is below the minimum of {}",
                degrees, MINIMUM_REGION_SIZE_DEGREES
            ));
        }
        if degrees > 180.0 {
            return Err(format!(
                "Region size {} degrees exceeds half the globe",
                degrees
            ));
        }
        if self.statistical_region_width == 0 {
            return Err("Statistical region width must be greater than zero".to_string());
        }
        self.grid.validate()
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load a configuration file, choosing the format by extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::parse_toml_file(&text, path),
            _ => Ok(Self::from_json(&text)?),
        }
    }

    #[cfg(feature = "toml")]
    fn parse_toml_file(text: &str, _path: &Path) -> Result<Self> {
        Self::from_toml(text).map_err(|e| GeotextError::Toml(e.to_string()))
    }

    #[cfg(not(feature = "toml"))]
    fn parse_toml_file(_text: &str, path: &Path) -> Result<Self> {
        Err(GeotextError::InvalidConfig(format!(
            "{} is TOML, which needs the `toml` feature",
            path.display()
        )))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region_size: RegionSize::default(),
            statistical_region_width: Self::default_statistical_region_width(),
            centroid_strategy: CentroidStrategy::default(),
            minimum_word_count: 0,
            grid: GridConfig::default(),
        }
    }
}
