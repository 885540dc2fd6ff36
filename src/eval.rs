//! Geolocation accuracy over held-out documents.

use crate::document::Document;
use crate::error::Result;
use crate::geometry::spheredist;
use crate::ranking::CellRanker;
use serde::{Deserialize, Serialize};

/// Outcome for one evaluated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub label: String,
    /// 1-based rank of the cell containing the true location, if that cell
    /// was ranked at all.
    pub true_rank: Option<usize>,
    /// Great-circle miles from the true location to the predicted centroid.
    pub error_miles: f64,
    /// Euclidean distance in degrees between the same two points.
    pub error_degrees: f64,
}

/// Aggregate accuracy figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub count: usize,
    /// Documents for which no cell could be ranked.
    pub unpredicted: usize,
    pub accuracy_at_1: f64,
    pub k: usize,
    pub accuracy_at_k: f64,
    pub mean_miles: f64,
    pub median_miles: f64,
    pub mean_degrees: f64,
    pub median_degrees: f64,
}

impl EvalSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Accumulates [`DocumentResult`]s.
#[derive(Debug, Clone)]
pub struct GeolocationEval {
    k: usize,
    results: Vec<DocumentResult>,
    unpredicted: usize,
}

impl GeolocationEval {
    /// `k` is the cutoff for accuracy@k.
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            results: Vec::new(),
            unpredicted: 0,
        }
    }

    pub fn results(&self) -> &[DocumentResult] {
        &self.results
    }

    /// Rank cells for `doc` and record how far off the top cell was.
    ///
    /// Documents without a location are skipped; documents for which no
    /// cell has words are counted as unpredicted.
    pub fn evaluate_document(
        &mut self,
        ranker: &mut CellRanker<'_>,
        doc: &Document,
    ) -> Option<&DocumentResult> {
        let Some(coord) = doc.coord() else {
            log::warn!("Document '{}' has no coordinate, not evaluating", doc.label());
            return None;
        };

        let ranked = ranker.rank_document(doc);
        let Some(top) = ranked.first() else {
            self.unpredicted += 1;
            return None;
        };

        let true_cell = ranker.grid().find_best_cell_for_coord(coord).map(|c| c.id());
        let true_rank = true_cell.and_then(|id| {
            ranked
                .iter()
                .position(|r| r.cell.id() == id)
                .map(|pos| pos + 1)
        });
        let predicted = top.cell.centroid();
        let result = DocumentResult {
            label: doc.label().to_string(),
            true_rank,
            error_miles: spheredist(Some(coord), Some(&predicted)),
            error_degrees: coord.degree_distance(&predicted),
        };
        log::debug!(
            "{}: true cell rank {:?}, error {:.2} miles",
            result.label,
            result.true_rank,
            result.error_miles
        );
        self.results.push(result);
        self.results.last()
    }

    pub fn summary(&self) -> EvalSummary {
        let count = self.results.len();
        let within = |k: usize| {
            let hits = self
                .results
                .iter()
                .filter(|r| r.true_rank.is_some_and(|rank| rank <= k))
                .count();
            ratio(hits, count)
        };
        let miles: Vec<f64> = self.results.iter().map(|r| r.error_miles).collect();
        let degrees: Vec<f64> = self.results.iter().map(|r| r.error_degrees).collect();
        EvalSummary {
            count,
            unpredicted: self.unpredicted,
            accuracy_at_1: within(1),
            k: self.k,
            accuracy_at_k: within(self.k),
            mean_miles: mean(&miles),
            median_miles: median(miles),
            mean_degrees: mean(&degrees),
            median_degrees: median(degrees),
        }
    }
}

fn ratio(hits: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        hits as f64 / count as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
