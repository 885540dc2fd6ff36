//! Ensembles of independently configured grids.

use super::{CellIter, Grid};
use crate::cell::Cell;
use crate::document::Document;
use crate::geometry::spheredist;
use crate::smoothing::GlobalStats;
use geotext_types::coord::Coord;
use std::rc::Rc;

/// A grid made of sub-grids, consulted in configured order.
///
/// Sub-grids may want different numbers of training passes; a pass is only
/// forwarded to the sub-grids that asked for at least that many. Cells from
/// different sub-grids stay distinct even when they cover the same ground.
#[derive(Debug)]
pub struct CombinedGrid {
    grids: Vec<Box<dyn Grid>>,
    current_pass: usize,
}

impl CombinedGrid {
    pub fn new(grids: Vec<Box<dyn Grid>>) -> Self {
        Self {
            grids,
            current_pass: 1,
        }
    }

    pub fn grids(&self) -> &[Box<dyn Grid>] {
        &self.grids
    }

    fn active_grids(&mut self) -> impl Iterator<Item = &mut Box<dyn Grid>> + '_ {
        let pass = self.current_pass;
        self.grids
            .iter_mut()
            .filter(move |grid| grid.num_training_passes() >= pass)
    }
}

impl Grid for CombinedGrid {
    fn num_training_passes(&self) -> usize {
        self.grids
            .iter()
            .map(|grid| grid.num_training_passes())
            .max()
            .unwrap_or(1)
    }

    fn begin_training_pass(&mut self, pass: usize) {
        self.current_pass = pass;
        for grid in self.active_grids() {
            grid.begin_training_pass(pass);
        }
    }

    fn add_document_to_cell(&mut self, doc: &Rc<Document>) {
        for grid in self.active_grids() {
            grid.add_document_to_cell(doc);
        }
    }

    fn initialize_cells(&mut self, global: &GlobalStats) {
        for grid in &mut self.grids {
            grid.initialize_cells(global);
        }
    }

    fn is_initialized(&self) -> bool {
        !self.grids.is_empty() && self.grids.iter().all(|grid| grid.is_initialized())
    }

    /// The nearest of the sub-grids' candidates, measured to each cell's
    /// centroid. Ties go to the earlier sub-grid.
    fn find_best_cell_for_coord(&self, coord: &Coord) -> Option<&Cell> {
        let mut best: Option<(&Cell, f64)> = None;
        for grid in &self.grids {
            let Some(cell) = grid.find_best_cell_for_coord(coord) else {
                continue;
            };
            let dist = spheredist(Some(coord), Some(&cell.centroid()));
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((cell, dist));
            }
        }
        best.map(|(cell, _)| cell)
    }

    fn iter_nonempty_cells(&self, nonempty_model: bool) -> CellIter<'_> {
        Box::new(
            self.grids
                .iter()
                .flat_map(move |grid| grid.iter_nonempty_cells(nonempty_model)),
        )
    }

    fn total_num_cells(&self) -> usize {
        self.grids.iter().map(|grid| grid.total_num_cells()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellId, CellShape};
    use crate::config::{CentroidStrategy, MILES_PER_DEGREE};

    /// A grid with one fixed cell, recording what it was sent.
    #[derive(Debug)]
    struct FixedGrid {
        cell: Cell,
        passes: usize,
        seen_passes: Vec<usize>,
        docs: usize,
        initialized: bool,
    }

    impl FixedGrid {
        fn at(id: u32, center: Coord, passes: usize) -> Self {
            let half = 0.01;
            let cell = Cell::new(
                CellId::new(900, id),
                CellShape::Rectangular {
                    sw: Coord::new(center.lat() - half, center.long() - half),
                    ne: Coord::new(center.lat() + half, center.long() + half),
                },
                CentroidStrategy::Geometric,
            );
            Self {
                cell,
                passes,
                seen_passes: Vec::new(),
                docs: 0,
                initialized: false,
            }
        }
    }

    impl Grid for FixedGrid {
        fn num_training_passes(&self) -> usize {
            self.passes
        }

        fn begin_training_pass(&mut self, pass: usize) {
            self.seen_passes.push(pass);
        }

        fn add_document_to_cell(&mut self, doc: &Rc<Document>) {
            self.docs += 1;
            self.cell.add_document(doc);
        }

        fn initialize_cells(&mut self, global: &GlobalStats) {
            self.cell.finish(global, 0);
            self.initialized = true;
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }

        fn find_best_cell_for_coord(&self, _coord: &Coord) -> Option<&Cell> {
            Some(&self.cell)
        }

        fn iter_nonempty_cells(&self, _nonempty_model: bool) -> CellIter<'_> {
            Box::new(std::iter::once(&self.cell))
        }

        fn total_num_cells(&self) -> usize {
            1
        }
    }

    /// A point `miles` due north of the origin.
    fn north_of_origin(miles: f64) -> Coord {
        Coord::new(miles / MILES_PER_DEGREE, 0.0)
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let query = Coord::new(0.0, 0.0);
        let grid = CombinedGrid::new(vec![
            Box::new(FixedGrid::at(0, north_of_origin(10.0), 1)),
            Box::new(FixedGrid::at(1, north_of_origin(3.0), 1)),
        ]);
        let best = grid.find_best_cell_for_coord(&query).unwrap();
        assert_eq!(best.id(), CellId::new(900, 1));
        assert!((spheredist(Some(&query), Some(&best.centroid())) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_tie_goes_to_first_grid() {
        let grid = CombinedGrid::new(vec![
            Box::new(FixedGrid::at(0, north_of_origin(5.0), 1)),
            Box::new(FixedGrid::at(1, north_of_origin(5.0), 1)),
        ]);
        let best = grid.find_best_cell_for_coord(&Coord::new(0.0, 0.0)).unwrap();
        assert_eq!(best.id(), CellId::new(900, 0));
    }

    #[test]
    fn test_empty_ensemble_has_no_candidate() {
        let grid = CombinedGrid::new(Vec::new());
        assert!(grid.find_best_cell_for_coord(&Coord::new(0.0, 0.0)).is_none());
        assert_eq!(grid.total_num_cells(), 0);
    }

    #[test]
    fn test_passes_forwarded_by_schedule() {
        let mut grid = CombinedGrid::new(vec![
            Box::new(FixedGrid::at(0, north_of_origin(1.0), 1)),
            Box::new(FixedGrid::at(1, north_of_origin(2.0), 3)),
        ]);
        assert_eq!(grid.num_training_passes(), 3);
        let doc = Rc::new(Document::new("d", Some(Coord::new(0.0, 0.0)), Default::default()));
        for pass in 1..=3 {
            grid.begin_training_pass(pass);
            grid.add_document_to_cell(&doc);
        }
        assert_eq!(grid.total_num_cells(), 2);

        let cells: Vec<_> = {
            let global = {
                let mut g = GlobalStats::new();
                g.finish_global_distribution();
                g
            };
            grid.initialize_cells(&global);
            grid.iter_nonempty_cells(false).map(|c| (c.id(), c.num_docs_for_links())).collect()
        };
        assert_eq!(cells, vec![(CellId::new(900, 0), 1), (CellId::new(900, 1), 3)]);
    }
}
