//! Adaptive KD-tree partition of document locations.
//!
//! Nodes live in a flat arena in preorder, so a parent's index is always
//! smaller than its children's. A node splits while it holds more than
//! `bucket_size` points, along whichever of latitude and longitude spans
//! more degrees. Points greater than the split value go right.

use super::{CellIter, Grid, next_grid_id};
use crate::cell::{Cell, CellId, CellShape};
use crate::config::{CentroidStrategy, KdTreeConfig, SplitMethod};
use crate::document::Document;
use crate::smoothing::GlobalStats;
use geotext_types::bbox::BoundingBox;
use geotext_types::coord::{
    Coord, MAXIMUM_LATITUDE, MAXIMUM_LONGITUDE, MINIMUM_LATITUDE, MINIMUM_LONGITUDE,
};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Lat,
    Long,
}

impl Axis {
    #[inline]
    fn of(self, coord: &Coord) -> f64 {
        match self {
            Axis::Lat => coord.lat(),
            Axis::Long => coord.long(),
        }
    }
}

#[derive(Debug, Clone)]
struct KdNode {
    bounds: BoundingBox,
    depth: usize,
    parent: Option<usize>,
    /// Axis, split value and child indices of an interior node.
    split: Option<(Axis, f64, usize, usize)>,
}

impl KdNode {
    fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// A node still to be created: its slice of the point buffer, and its
/// parent with whether it is the right child.
struct PendingNode {
    start: usize,
    end: usize,
    depth: usize,
    parent: Option<(usize, bool)>,
}

/// Pick the split value for `values` (already known to span a positive
/// width).
fn split_value(method: SplitMethod, values: &mut [f64], min: f64, max: f64) -> f64 {
    let split = match method {
        SplitMethod::Halfway => (min + max) / 2.0,
        SplitMethod::Median => {
            values.sort_unstable_by(f64::total_cmp);
            let mid = values.len() / 2;
            if values.len() % 2 == 1 {
                values[mid]
            } else {
                (values[mid - 1] + values[mid]) / 2.0
            }
        }
        SplitMethod::MaxMargin => {
            values.sort_unstable_by(f64::total_cmp);
            let mut best = (0.0, min);
            for pair in values.windows(2) {
                let gap = pair[1] - pair[0];
                if gap > best.0 {
                    best = (gap, (pair[0] + pair[1]) / 2.0);
                }
            }
            best.1
        }
    };

    let split = if split.is_nan() {
        0.0
    } else if split == f64::INFINITY {
        f64::MAX
    } else if split == f64::NEG_INFINITY {
        f64::MIN
    } else {
        split
    };
    // Never leave the right side empty.
    if split >= max { min } else { split }
}

fn bounds_of(points: &[Coord]) -> BoundingBox {
    let Some((first, rest)) = points.split_first() else {
        return BoundingBox::new(
            Coord::new(MINIMUM_LATITUDE, MINIMUM_LONGITUDE),
            Coord::new(MAXIMUM_LATITUDE, MAXIMUM_LONGITUDE),
        );
    };
    let mut bounds = BoundingBox::from_coord(*first);
    for point in rest {
        bounds.extend(point);
    }
    bounds
}

/// A grid whose cells are the nodes of a KD-tree over document locations.
///
/// Without backoff only leaves are cells. With backoff every node is a cell
/// carrying the documents of its whole subtree, and lookups in a leaf with
/// no words fall back to the nearest ancestor that has some.
///
/// With two or more training passes, the first pass places the splits and
/// the last one assigns documents; otherwise one pass does both.
#[derive(Debug)]
pub struct KdTreeGrid {
    grid_id: u32,
    config: KdTreeConfig,
    centroid_strategy: CentroidStrategy,
    minimum_word_count: u32,
    current_pass: usize,
    points: Vec<Coord>,
    docs: Vec<Rc<Document>>,
    nodes: Vec<KdNode>,
    /// One cell per node, same index.
    cells: Vec<Cell>,
    initialized: bool,
}

impl KdTreeGrid {
    pub fn new(config: KdTreeConfig, centroid_strategy: CentroidStrategy) -> Self {
        Self {
            grid_id: next_grid_id(),
            config,
            centroid_strategy,
            minimum_word_count: 0,
            current_pass: 1,
            points: Vec::new(),
            docs: Vec::new(),
            nodes: Vec::new(),
            cells: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_minimum_word_count(mut self, count: u32) -> Self {
        self.minimum_word_count = count;
        self
    }

    pub fn config(&self) -> &KdTreeConfig {
        &self.config
    }

    fn training_passes(&self) -> usize {
        self.config.training_passes.max(1)
    }

    /// Number of nodes in the tree, 0 before it is built.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    fn build_tree(&mut self) {
        let mut points = std::mem::take(&mut self.points);
        // Explicit work stack, so skewed inputs cannot exhaust the call
        // stack. Right halves are pushed before left ones to keep preorder.
        let mut pending = vec![PendingNode {
            start: 0,
            end: points.len(),
            depth: 0,
            parent: None,
        }];
        while let Some(node) = pending.pop() {
            let index = self.nodes.len();
            if let Some((parent, is_right)) = node.parent {
                if let Some((_, _, left, right)) = &mut self.nodes[parent].split {
                    if is_right {
                        *right = index;
                    } else {
                        *left = index;
                    }
                }
            }
            let slice = &mut points[node.start..node.end];
            self.nodes.push(KdNode {
                bounds: bounds_of(slice),
                depth: node.depth,
                parent: node.parent.map(|(parent, _)| parent),
                split: None,
            });
            let Some(boundary) = self.split_node(index, slice) else {
                continue;
            };
            let middle = node.start + boundary;
            pending.push(PendingNode {
                start: middle,
                end: node.end,
                depth: node.depth + 1,
                parent: Some((index, true)),
            });
            pending.push(PendingNode {
                start: node.start,
                end: middle,
                depth: node.depth + 1,
                parent: Some((index, false)),
            });
        }
        log::debug!(
            "KD-tree grid {}: {} nodes, {} leaves, depth {}",
            self.grid_id,
            self.nodes.len(),
            self.nodes.iter().filter(|n| n.is_leaf()).count(),
            self.depth()
        );
    }

    /// Decide whether node `index` splits. If so, record the split (child
    /// indices are filled in as the children are created), partition
    /// `points` so the left side comes first, and return the boundary.
    fn split_node(&mut self, index: usize, points: &mut [Coord]) -> Option<usize> {
        if points.len() <= self.config.bucket_size {
            return None;
        }

        let bounds = self.nodes[index].bounds;
        let axis = if bounds.height() >= bounds.ne().long() - bounds.sw().long() {
            Axis::Lat
        } else {
            Axis::Long
        };
        let (min, max) = match axis {
            Axis::Lat => (bounds.sw().lat(), bounds.ne().lat()),
            Axis::Long => (bounds.sw().long(), bounds.ne().long()),
        };
        if max - min <= 0.0 {
            return None;
        }

        let mut values: Vec<f64> = points.iter().map(|p| axis.of(p)).collect();
        let split = split_value(self.config.split_method, &mut values, min, max);
        log::trace!(
            "Splitting node {} ({} points) on {:?} at {}",
            index,
            points.len(),
            axis,
            split
        );

        // Partition in place: left keeps values <= split.
        let mut boundary = 0;
        for i in 0..points.len() {
            if axis.of(&points[i]) <= split {
                points.swap(i, boundary);
                boundary += 1;
            }
        }
        self.nodes[index].split = Some((axis, split, index, index));
        Some(boundary)
    }

    fn leaf_for(&self, coord: &Coord) -> usize {
        let mut index = 0;
        while let Some((axis, split, left, right)) = self.nodes[index].split {
            index = if axis.of(coord) > split { right } else { left };
        }
        index
    }

    /// Node indices from the leaf containing `coord` up to the root.
    fn path_for(&self, coord: &Coord) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(self.leaf_for(coord)), |&i| self.nodes[i].parent)
    }

    fn is_exposed(&self, index: usize) -> bool {
        self.config.use_backoff || self.nodes[index].is_leaf()
    }

    /// Cells on the path from the leaf containing `coord` to the root: only
    /// the leaf without backoff, every node on the way with it.
    pub fn cells_containing(&self, coord: &Coord) -> Vec<&Cell> {
        assert!(self.initialized, "Grid queried before initialize_cells");
        self.path_for(coord)
            .filter(|&i| self.is_exposed(i))
            .map(|i| &self.cells[i])
            .collect()
    }

    fn interpolate(&mut self) {
        let weight = self.config.interpolation_weight;
        // Preorder: a parent is already blended when its children are reached.
        for i in 1..self.cells.len() {
            let Some(parent) = self.nodes[i].parent else {
                continue;
            };
            let (before, after) = self.cells.split_at_mut(i);
            after[0]
                .language_model_mut()
                .interpolate_with(before[parent].language_model(), weight);
        }
    }
}

impl Grid for KdTreeGrid {
    fn num_training_passes(&self) -> usize {
        self.training_passes()
    }

    fn begin_training_pass(&mut self, pass: usize) {
        assert!(!self.initialized, "Training pass begun after initialization");
        self.current_pass = pass;
        if pass > 1 && self.nodes.is_empty() {
            self.build_tree();
        }
    }

    fn add_document_to_cell(&mut self, doc: &Rc<Document>) {
        assert!(!self.initialized, "Document added after initialization");
        let Some(coord) = doc.coord() else {
            log::warn!("Document '{}' has no coordinate, skipping", doc.label());
            return;
        };
        if self.current_pass == 1 {
            self.points.push(*coord);
        }
        if self.current_pass == self.training_passes() {
            self.docs.push(Rc::clone(doc));
        }
    }

    fn initialize_cells(&mut self, global: &GlobalStats) {
        assert!(!self.initialized, "initialize_cells called more than once");
        if self.nodes.is_empty() {
            self.build_tree();
        }

        self.cells = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                Cell::new(
                    CellId::new(self.grid_id, i as u32),
                    CellShape::KdNode {
                        bounds: node.bounds,
                        depth: node.depth,
                        is_leaf: node.is_leaf(),
                    },
                    self.centroid_strategy,
                )
            })
            .collect();

        let docs = std::mem::take(&mut self.docs);
        for doc in &docs {
            if let Some(coord) = doc.coord() {
                let path: Vec<usize> = self.path_for(coord).collect();
                for i in path {
                    self.cells[i].add_document(doc);
                }
            }
        }

        if self.config.interpolation_weight > 0.0 {
            self.interpolate();
        }
        for cell in &mut self.cells {
            cell.finish(global, self.minimum_word_count);
        }
        self.initialized = true;

        log::info!(
            "KD-tree grid {}: {} documents, {} of {} cells non-empty",
            self.grid_id,
            docs.len(),
            self.num_nonempty_cells(),
            self.total_num_cells()
        );
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn find_best_cell_for_coord(&self, coord: &Coord) -> Option<&Cell> {
        assert!(self.initialized, "Grid queried before initialize_cells");
        if !self.config.use_backoff {
            let leaf = &self.cells[self.leaf_for(coord)];
            return (!leaf.is_empty()).then_some(leaf);
        }
        self.path_for(coord)
            .map(|i| &self.cells[i])
            .find(|cell| !cell.is_empty_for_model())
    }

    fn iter_nonempty_cells(&self, nonempty_model: bool) -> CellIter<'_> {
        assert!(self.initialized, "Grid queried before initialize_cells");
        Box::new(
            self.cells
                .iter()
                .enumerate()
                .filter(move |&(i, cell)| {
                    self.is_exposed(i)
                        && if nonempty_model {
                            !cell.is_empty_for_model()
                        } else {
                            !cell.is_empty()
                        }
                })
                .map(|(_, cell)| cell),
        )
    }

    fn total_num_cells(&self) -> usize {
        (0..self.nodes.len()).filter(|&i| self.is_exposed(i)).count()
    }
}
