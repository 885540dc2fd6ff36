//! Ranking cells against a query document.

use crate::cell::Cell;
use crate::divergence::DivergenceEngine;
use crate::document::Document;
use crate::grid::Grid;
use crate::lang_model::LanguageModel;
use crate::smoothing::GlobalStats;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Similarities this far above 1 are still rounding error.
const COSINE_SLACK: f64 = 1.002;

/// How candidate cells are scored against a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RankingStrategy {
    /// KL(query || cell), lowest first. `symmetric` averages in
    /// KL(cell || query).
    KlDivergence { partial: bool, symmetric: bool },
    /// Cosine similarity, highest first.
    CosineSimilarity { smoothed: bool, partial: bool },
    /// Log-likelihood of the query's words under the cell, highest first.
    NaiveBayes,
    /// Cells by number of documents, ignoring the query.
    MostPopular,
}

impl RankingStrategy {
    /// Whether higher scores rank first.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, RankingStrategy::KlDivergence { .. })
    }
}

impl Default for RankingStrategy {
    fn default() -> Self {
        RankingStrategy::KlDivergence {
            partial: true,
            symmetric: false,
        }
    }
}

/// A cell and its score under some strategy.
#[derive(Debug, Clone, Copy)]
pub struct RankedCell<'a> {
    pub cell: &'a Cell,
    pub score: f64,
}

/// Ranks a finalized grid's cells against query models.
///
/// Holds one [`DivergenceEngine`], so consecutive comparisons against the
/// same query reuse its flattened form.
#[derive(Debug)]
pub struct CellRanker<'a> {
    grid: &'a dyn Grid,
    global: &'a GlobalStats,
    strategy: RankingStrategy,
    engine: DivergenceEngine,
    most_popular: Option<Vec<RankedCell<'a>>>,
}

impl<'a> CellRanker<'a> {
    /// # Panics
    ///
    /// Panics if the grid has not been initialized.
    pub fn new(grid: &'a dyn Grid, global: &'a GlobalStats, strategy: RankingStrategy) -> Self {
        assert!(grid.is_initialized(), "Ranking cells of an uninitialized grid");
        Self {
            grid,
            global,
            strategy,
            engine: DivergenceEngine::new(),
            most_popular: None,
        }
    }

    pub fn strategy(&self) -> RankingStrategy {
        self.strategy
    }

    pub fn grid(&self) -> &'a dyn Grid {
        self.grid
    }

    pub fn global(&self) -> &'a GlobalStats {
        self.global
    }

    pub fn engine(&self) -> &DivergenceEngine {
        &self.engine
    }

    /// Every candidate cell, best first. Ties keep grid iteration order.
    pub fn rank_cells(&mut self, query: &LanguageModel) -> Vec<RankedCell<'a>> {
        if self.strategy == RankingStrategy::MostPopular {
            return self.most_popular_cells().to_vec();
        }

        let grid = self.grid;
        let mut ranked: Vec<RankedCell<'a>> = grid
            .iter_nonempty_cells(true)
            .map(|cell| RankedCell {
                cell,
                score: self.score(query, cell.language_model()),
            })
            .collect();
        sort_ranked(&mut ranked, self.strategy);
        ranked
    }

    /// The top-ranked cell, if any cell has words.
    pub fn best_cell(&mut self, query: &LanguageModel) -> Option<RankedCell<'a>> {
        self.rank_cells(query).into_iter().next()
    }

    /// Rank cells against a document's own model.
    pub fn rank_document(&mut self, doc: &Document) -> Vec<RankedCell<'a>> {
        let global = self.global;
        self.rank_cells(doc.language_model(global))
    }

    fn score(&mut self, query: &LanguageModel, cell: &LanguageModel) -> f64 {
        let global = self.global;
        match self.strategy {
            RankingStrategy::KlDivergence { partial, symmetric } => {
                let kldiv = self.engine.fast_kl_divergence(query, cell, global, partial);
                if symmetric {
                    // The reverse direction would evict the cached query.
                    let reverse = cell.slow_kl_divergence(query, global, partial);
                    (kldiv + reverse) / 2.0
                } else {
                    kldiv
                }
            }
            RankingStrategy::CosineSimilarity { smoothed, partial } => {
                let sim = if smoothed {
                    self.engine
                        .fast_smoothed_cosine_similarity(query, cell, global, partial)
                } else {
                    self.engine.fast_cosine_similarity(query, cell, partial)
                };
                if !(0.0..=COSINE_SLACK).contains(&sim) {
                    log::warn!("Cosine similarity {} out of range", sim);
                }
                sim
            }
            RankingStrategy::NaiveBayes => {
                let mut logprob = 0.0;
                for (word, count) in query.counts() {
                    let prob = cell.lookup_word(word, global);
                    if prob <= 0.0 {
                        log::warn!("Word {:?} has probability {} in cell, skipping", word, prob);
                        continue;
                    }
                    logprob += count * prob.ln();
                }
                logprob
            }
            RankingStrategy::MostPopular => 0.0,
        }
    }

    fn most_popular_cells(&mut self) -> &[RankedCell<'a>] {
        let grid = self.grid;
        self.most_popular.get_or_insert_with(|| {
            let mut ranked: Vec<RankedCell<'a>> = grid
                .iter_nonempty_cells(false)
                .map(|cell| RankedCell {
                    cell,
                    score: cell.num_docs_for_links() as f64,
                })
                .collect();
            sort_ranked(&mut ranked, RankingStrategy::MostPopular);
            ranked
        })
    }
}

fn sort_ranked(ranked: &mut [RankedCell<'_>], strategy: RankingStrategy) {
    ranked.sort_by(|a, b| compare_scores(strategy, a.score, b.score));
}

/// Compare two scores under a strategy: `Less` means `a` ranks first.
pub fn compare_scores(strategy: RankingStrategy, a: f64, b: f64) -> Ordering {
    let ord = a.total_cmp(&b);
    if strategy.higher_is_better() {
        ord.reverse()
    } else {
        ord
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CentroidStrategy;
    use crate::geometry::RegionGeometry;
    use crate::grid::UniformGrid;
    use crate::lang_model::WordCounts;
    use crate::lang_model::tests::{corpus, word_counts};
    use crate::lexicon::Lexicon;
    use geotext_types::coord::Coord;
    use std::rc::Rc;

    fn trained_grid() -> (Lexicon, GlobalStats, UniformGrid) {
        let (lex, global, docs) = corpus();
        let mut grid = UniformGrid::new(RegionGeometry::new(1.0, 1), CentroidStrategy::Weighted);
        let places = [(30.5, -97.5), (33.5, -112.5), (46.5, -121.5)];
        for (i, (counts, (lat, long))) in docs.iter().zip(places).enumerate() {
            grid.add_document_to_cell(&Rc::new(Document::new(
                format!("doc{}", i),
                Some(Coord::new(lat, long)),
                counts.clone(),
            )));
        }
        // A second document near the first one makes that cell the most popular.
        grid.add_document_to_cell(&Rc::new(Document::new(
            "extra",
            Some(Coord::new(30.6, -97.6)),
            WordCounts::default(),
        )));
        grid.initialize_cells(&global);
        (lex, global, grid)
    }

    fn query(lex: &mut Lexicon, global: &GlobalStats, words: &[(&str, u32)]) -> LanguageModel {
        let mut model = LanguageModel::from_counts(&word_counts(lex, words));
        model.finish(global, 0);
        model
    }

    #[test]
    fn test_every_strategy_finds_the_desert() {
        let (mut lex, global, grid) = trained_grid();
        let q = query(&mut lex, &global, &[("desert", 2), ("cactus", 1)]);
        let desert = grid.find_best_cell_for_coord(&Coord::new(33.5, -112.5)).unwrap().id();

        let strategies = [
            RankingStrategy::KlDivergence { partial: true, symmetric: false },
            RankingStrategy::KlDivergence { partial: false, symmetric: false },
            RankingStrategy::KlDivergence { partial: false, symmetric: true },
            RankingStrategy::CosineSimilarity { smoothed: false, partial: false },
            RankingStrategy::CosineSimilarity { smoothed: true, partial: false },
            RankingStrategy::NaiveBayes,
        ];
        for strategy in strategies {
            let mut ranker = CellRanker::new(&grid, &global, strategy);
            let ranked = ranker.rank_cells(&q);
            assert_eq!(ranked.len(), 3, "{:?}", strategy);
            assert_eq!(ranked[0].cell.id(), desert, "{:?}", strategy);
            for pair in ranked.windows(2) {
                assert_ne!(
                    compare_scores(strategy, pair[0].score, pair[1].score),
                    Ordering::Greater
                );
            }
        }
    }

    #[test]
    fn test_naive_bayes_skips_impossible_words() {
        // No word occurs once, so words seen nowhere get zero probability.
        let mut lex = Lexicon::new();
        let desert = word_counts(&mut lex, &[("desert", 3), ("cactus", 2)]);
        let rain = word_counts(&mut lex, &[("rain", 3), ("ferry", 2)]);
        let mut global = GlobalStats::new();
        global.note_counts(&desert);
        global.note_counts(&rain);
        global.finish_global_distribution();
        assert_eq!(global.unseen_word_type_prob(), 0.0);

        let mut grid = UniformGrid::new(RegionGeometry::new(1.0, 1), CentroidStrategy::Weighted);
        for (label, lat, long, counts) in [("d", 33.5, -112.5, desert), ("r", 47.5, -122.5, rain)] {
            grid.add_document_to_cell(&Rc::new(Document::new(
                label,
                Some(Coord::new(lat, long)),
                counts,
            )));
        }
        grid.initialize_cells(&global);

        let q = query(&mut lex, &global, &[("desert", 2), ("volcano", 1)]);
        let mut ranker = CellRanker::new(&grid, &global, RankingStrategy::NaiveBayes);
        let ranked = ranker.rank_cells(&q);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.score.is_finite()));
        assert!(ranked[0].score > ranked[1].score);
        let best = grid.find_best_cell_for_coord(&Coord::new(33.5, -112.5)).unwrap();
        assert_eq!(ranked[0].cell.id(), best.id());
    }

    #[test]
    fn test_most_popular_is_cached() {
        let (mut lex, global, grid) = trained_grid();
        let q = query(&mut lex, &global, &[("snow", 1)]);
        let mut ranker = CellRanker::new(&grid, &global, RankingStrategy::MostPopular);
        let first = ranker.rank_cells(&q);
        assert_eq!(first[0].score, 2.0);
        assert_eq!(first[0].cell.num_docs_for_links(), 2);
        let again = ranker.rank_cells(&q);
        assert_eq!(
            first.iter().map(|r| r.cell.id()).collect::<Vec<_>>(),
            again.iter().map(|r| r.cell.id()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_ties_keep_iteration_order() {
        let (mut lex, global, grid) = trained_grid();
        // Shares no words with any cell: the unsmoothed cosine is 0 everywhere.
        let q = query(&mut lex, &global, &[("glacier", 1)]);
        let mut ranker = CellRanker::new(
            &grid,
            &global,
            RankingStrategy::CosineSimilarity { smoothed: false, partial: false },
        );
        let ranked: Vec<_> = ranker.rank_cells(&q).iter().map(|r| r.cell.id()).collect();
        let order: Vec<_> = grid.iter_nonempty_cells(true).map(|c| c.id()).collect();
        assert_eq!(ranked, order);
    }

    #[test]
    fn test_engine_cache_serves_batch() {
        let (mut lex, global, grid) = trained_grid();
        let q = query(&mut lex, &global, &[("river", 3)]);
        let mut ranker = CellRanker::new(&grid, &global, RankingStrategy::default());
        ranker.rank_cells(&q);
        let stats = ranker.engine().cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }
}
