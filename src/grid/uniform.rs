//! Fixed-size tiling with overlapping statistical regions.

use super::{CellIter, Grid, next_grid_id};
use crate::cell::{Cell, CellId, CellShape};
use crate::config::CentroidStrategy;
use crate::document::Document;
use crate::geometry::{RegionGeometry, RegionIndex};
use crate::smoothing::GlobalStats;
use geotext_types::coord::Coord;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::rc::Rc;

/// A grid of square tiling regions.
///
/// Each document lands in exactly one tiling region. Cells are statistical
/// regions, `width x width` blocks of tiles, so with a width above 1 one
/// document contributes to several cells. Only statistical regions touching
/// at least one non-empty tile are materialized.
#[derive(Debug)]
pub struct UniformGrid {
    grid_id: u32,
    geometry: RegionGeometry,
    centroid_strategy: CentroidStrategy,
    minimum_word_count: u32,
    training_passes: usize,
    current_pass: usize,
    tiles: FxHashMap<RegionIndex, Vec<Rc<Document>>>,
    cells: Vec<Cell>,
    cell_index: FxHashMap<RegionIndex, usize>,
    initialized: bool,
}

impl UniformGrid {
    pub fn new(geometry: RegionGeometry, centroid_strategy: CentroidStrategy) -> Self {
        Self {
            grid_id: next_grid_id(),
            geometry,
            centroid_strategy,
            minimum_word_count: 0,
            training_passes: 1,
            current_pass: 1,
            tiles: FxHashMap::default(),
            cells: Vec::new(),
            cell_index: FxHashMap::default(),
            initialized: false,
        }
    }

    pub fn with_minimum_word_count(mut self, count: u32) -> Self {
        self.minimum_word_count = count;
        self
    }

    /// Documents are only recorded during the last pass.
    pub fn with_training_passes(mut self, passes: usize) -> Self {
        self.training_passes = passes.max(1);
        self
    }

    pub fn geometry(&self) -> &RegionGeometry {
        &self.geometry
    }

    /// Cell for the statistical region with the given southwest indices.
    pub fn cell_at(&self, index: RegionIndex) -> Option<&Cell> {
        self.cell_index.get(&index).map(|&i| &self.cells[i])
    }

    /// Number of documents in a tiling region.
    pub fn num_docs_in_tile(&self, tile: RegionIndex) -> usize {
        self.tiles.get(&tile).map_or(0, Vec::len)
    }

    fn build_cell(&self, index: RegionIndex, id: CellId) -> Cell {
        let mut cell = Cell::new(
            id,
            CellShape::Rectangular {
                sw: self.geometry.stat_sw_corner(index),
                ne: self.geometry.stat_ne_corner(index),
            },
            self.centroid_strategy,
        );
        // A wide region on a coarse grid can wrap onto the same tile twice.
        let mut tiles: SmallVec<[RegionIndex; 9]> = self.geometry.stat_region_tiles(index).collect();
        tiles.sort_unstable();
        tiles.dedup();
        for tile in tiles {
            for doc in self.tiles.get(&tile).into_iter().flatten() {
                cell.add_document(doc);
            }
        }
        cell
    }
}

impl Grid for UniformGrid {
    fn num_training_passes(&self) -> usize {
        self.training_passes
    }

    fn begin_training_pass(&mut self, pass: usize) {
        assert!(!self.initialized, "Training pass begun after initialization");
        self.current_pass = pass;
    }

    fn add_document_to_cell(&mut self, doc: &Rc<Document>) {
        assert!(!self.initialized, "Document added after initialization");
        if self.current_pass < self.training_passes {
            return;
        }
        let Some(coord) = doc.coord() else {
            log::warn!("Document '{}' has no coordinate, skipping", doc.label());
            return;
        };
        let tile = self.geometry.coord_to_tiling_indices(coord);
        self.tiles.entry(tile).or_default().push(Rc::clone(doc));
    }

    fn initialize_cells(&mut self, global: &GlobalStats) {
        assert!(!self.initialized, "initialize_cells called more than once");

        let regions: BTreeSet<RegionIndex> = self
            .tiles
            .keys()
            .flat_map(|&tile| self.geometry.stat_regions_covering_tile(tile))
            .collect();

        let mut cells = Vec::with_capacity(regions.len());
        let mut cell_index = FxHashMap::default();
        for (i, index) in regions.into_iter().enumerate() {
            let mut cell = self.build_cell(index, CellId::new(self.grid_id, i as u32));
            cell.finish(global, self.minimum_word_count);
            cell_index.insert(index, i);
            cells.push(cell);
        }
        self.cells = cells;
        self.cell_index = cell_index;
        self.initialized = true;

        let nonempty_model = self.cells.iter().filter(|c| !c.is_empty_for_model()).count();
        let docs: usize = self.cells.iter().map(Cell::num_docs_for_model).sum();
        log::info!(
            "Uniform grid {}: {} of {} regions non-empty, {} with words ({:.2} documents per region)",
            self.grid_id,
            self.cells.len(),
            self.total_num_cells(),
            nonempty_model,
            docs as f64 / nonempty_model.max(1) as f64
        );
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn find_best_cell_for_coord(&self, coord: &Coord) -> Option<&Cell> {
        assert!(self.initialized, "Grid queried before initialize_cells");
        self.cell_at(self.geometry.coord_to_stat_indices(coord))
    }

    fn iter_nonempty_cells(&self, nonempty_model: bool) -> CellIter<'_> {
        assert!(self.initialized, "Grid queried before initialize_cells");
        Box::new(self.cells.iter().filter(move |cell| {
            if nonempty_model {
                !cell.is_empty_for_model()
            } else {
                !cell.is_empty()
            }
        }))
    }

    fn total_num_cells(&self) -> usize {
        self.geometry.num_tiling_regions()
    }
}
