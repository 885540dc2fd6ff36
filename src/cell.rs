//! Cells: geographic regions carrying an aggregated language model.

use crate::config::CentroidStrategy;
use crate::document::Document;
use crate::lang_model::LanguageModel;
use crate::smoothing::GlobalStats;
use geotext_types::bbox::BoundingBox;
use geotext_types::coord::Coord;
use serde::{Deserialize, Serialize};

/// Fraction by which [`CellShape::inner_boundary`] pulls corners inward.
pub const INNER_BOUNDARY_FRACTION: f64 = 0.5;

/// Identifies a cell across every grid in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub grid: u32,
    pub index: u32,
}

impl CellId {
    pub const fn new(grid: u32, index: u32) -> Self {
        Self { grid, index }
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.grid, self.index)
    }
}

/// Geometry of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellShape {
    /// A statistical region of a uniform grid.
    Rectangular { sw: Coord, ne: Coord },
    /// A KD-tree node; `bounds` covers the node's documents.
    KdNode {
        bounds: BoundingBox,
        depth: usize,
        is_leaf: bool,
    },
}

impl CellShape {
    pub fn boundary(&self) -> BoundingBox {
        match *self {
            CellShape::Rectangular { sw, ne } => BoundingBox::new(sw, ne),
            CellShape::KdNode { bounds, .. } => bounds,
        }
    }

    /// Boundary shrunk toward its center, for drawing adjacent cells apart.
    pub fn inner_boundary(&self) -> BoundingBox {
        self.boundary().shrink_toward_center(INNER_BOUNDARY_FRACTION)
    }
}

/// The most salient document seen in a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalientDocument {
    pub label: String,
    pub salience: f64,
}

/// A region of the earth plus the language model of its documents.
///
/// Cells accumulate documents while their grid is being initialized, are
/// finished once, and are read-only afterwards.
#[derive(Debug, Clone)]
pub struct Cell {
    id: CellId,
    shape: CellShape,
    centroid_strategy: CentroidStrategy,
    model: LanguageModel,
    lat_sum: f64,
    /// First located document's longitude; later ones are summed as
    /// offsets from it, taken the short way around the globe.
    long_origin: f64,
    long_offset_sum: f64,
    num_located_docs: usize,
    num_docs_for_model: usize,
    num_docs_for_links: usize,
    salient: Option<SalientDocument>,
    finished: bool,
}

impl Cell {
    pub fn new(id: CellId, shape: CellShape, centroid_strategy: CentroidStrategy) -> Self {
        Self {
            id,
            shape,
            centroid_strategy,
            model: LanguageModel::new(),
            lat_sum: 0.0,
            long_origin: 0.0,
            long_offset_sum: 0.0,
            num_located_docs: 0,
            num_docs_for_model: 0,
            num_docs_for_links: 0,
            salient: None,
            finished: false,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn shape(&self) -> &CellShape {
        &self.shape
    }

    pub fn boundary(&self) -> BoundingBox {
        self.shape.boundary()
    }

    /// Representative point of the cell.
    ///
    /// With [`CentroidStrategy::Weighted`] this is the mean coordinate of
    /// the cell's located documents, with longitudes averaged across the
    /// antimeridian rather than through 0; otherwise, or for a cell without
    /// any, the center of the boundary.
    pub fn centroid(&self) -> Coord {
        match self.centroid_strategy {
            CentroidStrategy::Weighted if self.num_located_docs > 0 => {
                let n = self.num_located_docs as f64;
                Coord::coerced(self.lat_sum / n, self.long_origin + self.long_offset_sum / n)
            }
            _ => self.boundary().center(),
        }
    }

    pub fn language_model(&self) -> &LanguageModel {
        &self.model
    }

    pub(crate) fn language_model_mut(&mut self) -> &mut LanguageModel {
        &mut self.model
    }

    /// Fold a document into the cell.
    ///
    /// Every document counts toward the cell's size and salience; only
    /// training documents with words feed the language model.
    pub fn add_document(&mut self, doc: &Document) {
        assert!(!self.finished, "Cannot add documents to a finished cell");
        self.num_docs_for_links += 1;

        if let Some(coord) = doc.coord() {
            if self.num_located_docs == 0 {
                self.long_origin = coord.long();
            }
            self.lat_sum += coord.lat();
            self.long_offset_sum +=
                (coord.long() - self.long_origin + 180.0).rem_euclid(360.0) - 180.0;
            self.num_located_docs += 1;
        }

        if doc.is_training() {
            if doc.has_counts() {
                self.model.add_counts(doc.counts());
                self.num_docs_for_model += 1;
            } else {
                log::warn!("Training document '{}' has no word counts", doc.label());
            }
        }

        if let Some(salience) = doc.salience() {
            let better = self
                .salient
                .as_ref()
                .is_none_or(|current| salience > current.salience);
            if better {
                self.salient = Some(SalientDocument {
                    label: doc.label().to_string(),
                    salience,
                });
            }
        }
    }

    /// Finish the cell's language model.
    ///
    /// # Panics
    ///
    /// Panics if the cell is already finished.
    pub fn finish(&mut self, global: &GlobalStats, minimum_word_count: u32) {
        assert!(!self.finished, "Cell {} finished twice", self.id);
        self.model.finish(global, minimum_word_count);
        self.finished = true;
        log::debug!(
            "Cell {} at {}: {} docs, {} for model, {}",
            self.id,
            self.boundary(),
            self.num_docs_for_links,
            self.num_docs_for_model,
            self.model
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True if no document at all landed in the cell.
    pub fn is_empty(&self) -> bool {
        self.num_docs_for_links == 0
    }

    /// True if the cell's language model has no words.
    pub fn is_empty_for_model(&self) -> bool {
        self.num_docs_for_model == 0 || self.model.is_empty()
    }

    pub fn num_docs_for_model(&self) -> usize {
        self.num_docs_for_model
    }

    pub fn num_docs_for_links(&self) -> usize {
        self.num_docs_for_links
    }

    pub fn salient_document(&self) -> Option<&SalientDocument> {
        self.salient.as_ref()
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cell {} {} ({} documents",
            self.id,
            self.boundary(),
            self.num_docs_for_links
        )?;
        if let Some(salient) = &self.salient {
            write!(f, ", most salient {}", salient.label)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSplit;
    use crate::lang_model::tests::corpus;

    fn rect_cell(strategy: CentroidStrategy) -> Cell {
        Cell::new(
            CellId::new(0, 0),
            CellShape::Rectangular {
                sw: Coord::new(30.0, -98.0),
                ne: Coord::new(32.0, -96.0),
            },
            strategy,
        )
    }

    #[test]
    fn test_centroid_strategies() {
        let (_, _, docs) = corpus();
        let doc = Document::new("a", Some(Coord::new(30.5, -97.5)), docs[0].clone());
        let other = Document::new("b", Some(Coord::new(31.5, -96.5)), docs[1].clone());

        let mut weighted = rect_cell(CentroidStrategy::Weighted);
        assert_eq!(weighted.centroid(), Coord::new(31.0, -97.0));
        weighted.add_document(&doc);
        assert_eq!(weighted.centroid(), Coord::new(30.5, -97.5));
        weighted.add_document(&other);
        assert_eq!(weighted.centroid(), Coord::new(31.0, -97.0));

        let mut geometric = rect_cell(CentroidStrategy::Geometric);
        geometric.add_document(&doc);
        assert_eq!(geometric.centroid(), Coord::new(31.0, -97.0));
    }

    #[test]
    fn test_weighted_centroid_across_antimeridian() {
        let (_, _, docs) = corpus();
        let mut cell = Cell::new(
            CellId::new(0, 1),
            CellShape::KdNode {
                bounds: BoundingBox::new(Coord::new(9.0, 179.0), Coord::new(11.0, -179.0)),
                depth: 0,
                is_leaf: true,
            },
            CentroidStrategy::Weighted,
        );
        cell.add_document(&Document::new("east", Some(Coord::new(10.0, 179.5)), docs[0].clone()));
        cell.add_document(&Document::new("west", Some(Coord::new(12.0, -179.5)), docs[1].clone()));
        let centroid = cell.centroid();
        assert_eq!(centroid.lat(), 11.0);
        assert_eq!(centroid.long(), -180.0);
    }

    #[test]
    fn test_only_training_docs_feed_model() {
        let (_, global, docs) = corpus();
        let mut cell = rect_cell(CentroidStrategy::Weighted);
        cell.add_document(
            &Document::new("test", Some(Coord::new(31.0, -97.0)), docs[2].clone())
                .with_split(DocumentSplit::Test)
                .with_salience(50.0),
        );
        assert!(!cell.is_empty());
        assert!(cell.is_empty_for_model());

        cell.add_document(
            &Document::new("train", Some(Coord::new(31.0, -97.0)), docs[0].clone())
                .with_salience(3.0),
        );
        cell.finish(&global, 0);
        assert!(!cell.is_empty_for_model());
        assert_eq!(cell.num_docs_for_links(), 2);
        assert_eq!(cell.num_docs_for_model(), 1);
        assert_eq!(cell.language_model().total_tokens(), 7.0);
        assert_eq!(cell.salient_document().map(|s| s.label.as_str()), Some("test"));
    }

    #[test]
    fn test_inner_boundary_is_inside() {
        let cell = rect_cell(CentroidStrategy::Geometric);
        let inner = cell.shape().inner_boundary();
        assert_eq!(inner.sw(), Coord::new(30.5, -97.5));
        assert_eq!(inner.ne(), Coord::new(31.5, -96.5));
    }

    #[test]
    #[should_panic(expected = "finished twice")]
    fn test_finish_twice_panics() {
        let (_, global, _) = corpus();
        let mut cell = rect_cell(CentroidStrategy::Weighted);
        cell.finish(&global, 0);
        cell.finish(&global, 0);
    }
}
