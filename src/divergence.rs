//! Fast divergence and similarity between language models.
//!
//! Ranking compares one query model against every candidate cell, so the
//! engine flattens the query ("self") model into parallel word/probability
//! vectors once and reuses them for the whole batch. The flattened copy is
//! keyed by the model's id, generation and size; any mutation bumps the
//! generation, so a stale copy is never reused.

use crate::lang_model::{LanguageModel, kl_term};
use crate::lexicon::WordId;
use crate::smoothing::GlobalStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    id: u64,
    generation: u64,
    len: usize,
}

impl CacheKey {
    fn of(model: &LanguageModel) -> Self {
        Self {
            id: model.id(),
            generation: model.generation(),
            len: model.num_word_types(),
        }
    }
}

/// Parallel arrays for the words of one model.
#[derive(Debug, Default)]
struct FlatModel {
    key: Option<CacheKey>,
    words: Vec<WordId>,
    /// Raw counts divided by the token total.
    freqs: Vec<f64>,
    /// Smoothed probabilities, filled only when `smoothed` is set.
    probs: Vec<f64>,
    smoothed: bool,
}

/// Hit/miss counters for the flattened-model cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Divergence engine with a single-slot cache for the query model.
///
/// Not shareable across threads; give each worker its own engine. All
/// models passed in must be finished against the same [`GlobalStats`].
///
/// # Examples
///
/// ```
/// use geotext::{DivergenceEngine, GlobalStats, LanguageModel, Lexicon, WordCounts};
///
/// let mut lex = Lexicon::new();
/// let counts: WordCounts = [(lex.intern("harbor"), 3), (lex.intern("tide"), 1)]
///     .into_iter()
///     .collect();
/// let mut global = GlobalStats::new();
/// global.note_counts(&counts);
/// global.finish_global_distribution();
///
/// let mut model = LanguageModel::from_counts(&counts);
/// model.finish(&global, 0);
///
/// let mut engine = DivergenceEngine::new();
/// assert!(engine.fast_kl_divergence(&model, &model, &global, false).abs() < 1e-12);
/// assert!((engine.fast_cosine_similarity(&model, &model, false) - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Default)]
pub struct DivergenceEngine {
    cache: FlatModel,
    stats: CacheStats,
}

impl DivergenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop the flattened query model.
    pub fn invalidate(&mut self) {
        self.cache.key = None;
    }

    /// Flattened view of `model`, with smoothed probabilities when `global`
    /// is given.
    fn flatten(&mut self, model: &LanguageModel, global: Option<&GlobalStats>) -> &FlatModel {
        assert!(model.is_finished(), "Divergence of an unfinished language model");
        let key = CacheKey::of(model);
        if self.cache.key == Some(key) && (global.is_none() || self.cache.smoothed) {
            self.stats.hits += 1;
            return &self.cache;
        }
        self.stats.misses += 1;

        let cache = &mut self.cache;
        cache.words.clear();
        cache.freqs.clear();
        cache.probs.clear();
        let total = model.total_tokens();
        for (word, count) in model.counts() {
            cache.words.push(word);
            cache.freqs.push(count / total);
            if let Some(global) = global {
                cache.probs.push(model.lookup_word(word, global));
            }
        }
        cache.smoothed = global.is_some();
        cache.key = Some(key);
        &self.cache
    }

    /// KL(p || q), agreeing with [`LanguageModel::slow_kl_divergence`].
    pub fn fast_kl_divergence(
        &mut self,
        p: &LanguageModel,
        q: &LanguageModel,
        global: &GlobalStats,
        partial: bool,
    ) -> f64 {
        let flat = self.flatten(p, Some(global));
        let mut kldiv = 0.0;
        for (&word, &pv) in flat.words.iter().zip(&flat.probs) {
            if let Some(term) = kl_term(pv, q.lookup_word(word, global)) {
                kldiv += term;
            }
        }
        if partial {
            return kldiv;
        }

        let mut overall_probs_diff_words = 0.0;
        for (word, _) in q.counts() {
            if p.contains(word) {
                continue;
            }
            if let Some(term) = kl_term(p.lookup_word(word, global), q.lookup_word(word, global)) {
                kldiv += term;
            }
            overall_probs_diff_words += global.overall_word_prob(word).unwrap_or(0.0);
        }

        kldiv + p.kl_divergence_34(q, global, overall_probs_diff_words)
    }

    /// Cosine similarity of the unsmoothed relative frequencies.
    pub fn fast_cosine_similarity(
        &mut self,
        p: &LanguageModel,
        q: &LanguageModel,
        partial: bool,
    ) -> f64 {
        let q_total = q.total_tokens();
        let q_freq = |word| {
            if q_total > 0.0 {
                q.count(word) / q_total
            } else {
                0.0
            }
        };
        let flat = self.flatten(p, None);

        let mut sums = CosineSums::default();
        for (&word, &pv) in flat.words.iter().zip(&flat.freqs) {
            sums.add(pv, q_freq(word));
        }
        if !partial {
            for (word, _) in q.counts() {
                if !p.contains(word) {
                    sums.add(0.0, q_freq(word));
                }
            }
        }
        sums.similarity()
    }

    /// Cosine similarity of the smoothed distributions.
    pub fn fast_smoothed_cosine_similarity(
        &mut self,
        p: &LanguageModel,
        q: &LanguageModel,
        global: &GlobalStats,
        partial: bool,
    ) -> f64 {
        let flat = self.flatten(p, Some(global));
        let mut sums = CosineSums::default();
        for (&word, &pv) in flat.words.iter().zip(&flat.probs) {
            sums.add(pv, q.lookup_word(word, global));
        }
        if !partial {
            for (word, _) in q.counts() {
                if !p.contains(word) {
                    sums.add(p.lookup_word(word, global), q.lookup_word(word, global));
                }
            }
        }
        sums.similarity()
    }
}

#[derive(Debug, Default)]
struct CosineSums {
    pq: f64,
    p2: f64,
    q2: f64,
}

impl CosineSums {
    #[inline]
    fn add(&mut self, p: f64, q: f64) {
        self.pq += p * q;
        self.p2 += p * p;
        self.q2 += q * q;
    }

    fn similarity(&self) -> f64 {
        if self.pq == 0.0 {
            return 0.0;
        }
        self.pq / (self.p2.sqrt() * self.q2.sqrt())
    }
}
