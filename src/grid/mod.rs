//! Grids: partitions of the earth into cells.
//!
//! Every grid moves through the same phases. While ingesting, documents are
//! pushed in with [`Grid::add_document_to_cell`], possibly over several
//! training passes. [`Grid::initialize_cells`] then runs exactly once and
//! builds every cell's language model. After that the grid is read-only and
//! answers queries.

pub mod combined;
pub mod kdtree;
pub mod uniform;

pub use combined::CombinedGrid;
pub use kdtree::KdTreeGrid;
pub use uniform::UniformGrid;

use crate::cell::Cell;
use crate::config::{Config, GridConfig};
use crate::document::Document;
use crate::error::{GeotextError, Result};
use crate::geometry::RegionGeometry;
use crate::smoothing::GlobalStats;
use geotext_types::coord::Coord;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_GRID_ID: AtomicU32 = AtomicU32::new(0);

/// Process-unique grid id, used to keep [`crate::CellId`]s distinct across
/// grids.
pub(crate) fn next_grid_id() -> u32 {
    NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed)
}

/// Iterator over a grid's cells.
pub type CellIter<'a> = Box<dyn Iterator<Item = &'a Cell> + 'a>;

/// A partition of the earth into cells.
pub trait Grid: std::fmt::Debug {
    /// Passes over the training documents this grid wants.
    fn num_training_passes(&self) -> usize {
        1
    }

    /// Start training pass `pass` (1-based).
    fn begin_training_pass(&mut self, pass: usize);

    /// Route a document to the cell(s) it belongs to.
    fn add_document_to_cell(&mut self, doc: &Rc<Document>);

    /// Build the cells and their language models.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    fn initialize_cells(&mut self, global: &GlobalStats);

    fn is_initialized(&self) -> bool;

    /// The cell a coordinate falls in, or `None` when the grid has no
    /// usable cell there.
    ///
    /// # Panics
    ///
    /// Panics if the grid has not been initialized.
    fn find_best_cell_for_coord(&self, coord: &Coord) -> Option<&Cell>;

    /// Cells holding at least one document, or, with `nonempty_model`, a
    /// non-empty language model.
    ///
    /// # Panics
    ///
    /// Panics if the grid has not been initialized.
    fn iter_nonempty_cells(&self, nonempty_model: bool) -> CellIter<'_>;

    /// Number of cells the grid could hold, empty or not.
    fn total_num_cells(&self) -> usize;

    fn num_nonempty_cells(&self) -> usize {
        self.iter_nonempty_cells(false).count()
    }
}

/// Build the grid described by `config`.
///
/// # Examples
///
/// ```
/// use geotext::{build_grid, Config, GridConfig, KdTreeConfig};
///
/// let config = Config::default().with_grid(GridConfig::Kdtree(
///     KdTreeConfig::default().with_bucket_size(20).with_backoff(true),
/// ));
/// let grid = build_grid(&config).unwrap();
/// assert_eq!(grid.num_training_passes(), 1);
/// assert!(!grid.is_initialized());
/// ```
pub fn build_grid(config: &Config) -> Result<Box<dyn Grid>> {
    config.validate().map_err(GeotextError::InvalidConfig)?;
    Ok(build_grid_from(config, &config.grid))
}

fn build_grid_from(config: &Config, grid: &GridConfig) -> Box<dyn Grid> {
    match grid {
        GridConfig::Uniform(uniform) => Box::new(
            UniformGrid::new(RegionGeometry::from_config(config), config.centroid_strategy)
                .with_minimum_word_count(config.minimum_word_count)
                .with_training_passes(uniform.training_passes),
        ),
        GridConfig::Kdtree(kdtree) => Box::new(
            KdTreeGrid::new(kdtree.clone(), config.centroid_strategy)
                .with_minimum_word_count(config.minimum_word_count),
        ),
        GridConfig::Combined(combined) => Box::new(CombinedGrid::new(
            combined
                .grids
                .iter()
                .map(|sub| build_grid_from(config, sub))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CombinedConfig, KdTreeConfig, UniformConfig};

    #[test]
    fn test_build_combined_grid() {
        let config = Config::default().with_grid(GridConfig::Combined(CombinedConfig {
            grids: vec![
                GridConfig::Uniform(UniformConfig::default()),
                GridConfig::Kdtree(KdTreeConfig::default().with_training_passes(2)),
            ],
        }));
        let grid = build_grid(&config).unwrap();
        assert_eq!(grid.num_training_passes(), 2);
        // The KD-tree has no nodes until it is built.
        assert_eq!(grid.total_num_cells(), 180 * 360);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = Config::default().with_grid(GridConfig::Combined(CombinedConfig {
            grids: vec![],
        }));
        assert!(matches!(
            build_grid(&config),
            Err(GeotextError::InvalidConfig(_))
        ));
    }
}
