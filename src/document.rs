//! Documents as the core sees them: a location, word counts and a split.

use crate::lang_model::{LanguageModel, WordCounts};
use crate::smoothing::GlobalStats;
use geotext_types::coord::Coord;
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

/// Which part of the corpus a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSplit {
    #[default]
    Training,
    Dev,
    Test,
}

/// A located, tokenized document.
///
/// Field validation happens before a document reaches the core. The
/// document's own [`LanguageModel`] is built on first use.
#[derive(Debug, Clone)]
pub struct Document {
    label: String,
    coord: Option<Coord>,
    counts: WordCounts,
    split: DocumentSplit,
    salience: Option<f64>,
    model: OnceCell<LanguageModel>,
}

impl Document {
    pub fn new(label: impl Into<String>, coord: Option<Coord>, counts: WordCounts) -> Self {
        Self {
            label: label.into(),
            coord,
            counts,
            split: DocumentSplit::Training,
            salience: None,
            model: OnceCell::new(),
        }
    }

    pub fn with_split(mut self, split: DocumentSplit) -> Self {
        self.split = split;
        self
    }

    /// Salience used to pick a cell's representative document, e.g. the
    /// number of incoming links.
    pub fn with_salience(mut self, salience: f64) -> Self {
        self.salience = Some(salience);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn coord(&self) -> Option<&Coord> {
        self.coord.as_ref()
    }

    pub fn counts(&self) -> &WordCounts {
        &self.counts
    }

    pub fn split(&self) -> DocumentSplit {
        self.split
    }

    pub fn is_training(&self) -> bool {
        self.split == DocumentSplit::Training
    }

    pub fn salience(&self) -> Option<f64> {
        self.salience
    }

    pub fn has_counts(&self) -> bool {
        self.counts.values().any(|&count| count > 0)
    }

    /// The document's smoothed model, built against `global` on first call.
    ///
    /// Later calls return the same model; `global` must not change between
    /// them.
    pub fn language_model(&self, global: &GlobalStats) -> &LanguageModel {
        self.model.get_or_init(|| {
            let mut model = LanguageModel::from_counts(&self.counts);
            model.finish(global, 0);
            model
        })
    }
}
