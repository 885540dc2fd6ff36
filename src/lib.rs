//! Text geolocation over a partitioned earth.
//!
//! The earth is split into cells (a uniform tiling, an adaptive KD-tree, or an
//! ensemble of both), each cell gets a smoothed language model built from
//! the documents located in it, and a query document is placed by ranking
//! cells against its own model.
//!
//! ```rust
//! use std::rc::Rc;
//! use geotext::prelude::*;
//!
//! let mut lex = Lexicon::new();
//! let mut doc = |label: &str, lat: f64, long: f64, words: &[(&str, u32)]| {
//!     let counts: WordCounts = words.iter().map(|&(w, c)| (lex.intern(w), c)).collect();
//!     Rc::new(Document::new(label, Some(Coord::new(lat, long)), counts))
//! };
//! let docs = vec![
//!     doc("Austin", 30.27, -97.74, &[("texas", 3), ("capitol", 1)]),
//!     doc("Seattle", 47.61, -122.33, &[("rain", 4), ("ferry", 2)]),
//! ];
//!
//! let mut trainer = Trainer::new(build_grid(&Config::default())?);
//! trainer.train(&docs);
//! let model = trainer.finish();
//!
//! let query = doc("?", 0.0, 0.0, &[("rain", 1), ("ferry", 1)]);
//! let mut ranker = model.ranker(RankingStrategy::default());
//! let best = ranker.rank_document(&query)[0].cell;
//! assert!(best.boundary().contains(&Coord::new(47.61, -122.33)));
//! # Ok::<(), geotext::GeotextError>(())
//! ```

pub mod cell;
pub mod config;
pub mod divergence;
pub mod document;
pub mod error;
pub mod eval;
pub mod geometry;
pub mod grid;
pub mod ingest;
pub mod lang_model;
pub mod lexicon;
pub mod ranking;
pub mod smoothing;

pub use error::{GeotextError, Result};

pub use geotext_types::bbox::BoundingBox;
pub use geotext_types::coord::{Coord, CoordError, CoordPolicy};

pub use cell::{Cell, CellId, CellShape, SalientDocument};
pub use config::{
    CentroidStrategy, CombinedConfig, Config, GridConfig, KdTreeConfig, RegionSize, SplitMethod,
    UniformConfig,
};
pub use divergence::{CacheStats, DivergenceEngine};
pub use document::{Document, DocumentSplit};
pub use eval::{DocumentResult, EvalSummary, GeolocationEval};
pub use geometry::{RegionGeometry, RegionIndex, distance, spheredist};
pub use grid::{CombinedGrid, Grid, KdTreeGrid, UniformGrid, build_grid};
pub use ingest::{IngestOptions, IngestOutcome, Progress, StopReason, TrainedModel, Trainer};
pub use lang_model::{LanguageModel, WordCounts};
pub use lexicon::{Lexicon, WordId};
pub use ranking::{CellRanker, RankedCell, RankingStrategy};
pub use smoothing::GlobalStats;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeotextError, Result};

    pub use crate::{BoundingBox, Coord, CoordPolicy};

    pub use crate::{Config, GridConfig, KdTreeConfig, build_grid};

    pub use crate::{Document, DocumentSplit, Lexicon, WordCounts};

    pub use crate::{Cell, Grid, LanguageModel};

    pub use crate::{CellRanker, GeolocationEval, RankingStrategy, Trainer};

    pub use std::time::Duration;
}
