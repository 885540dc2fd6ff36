//! Corpus-wide pseudo-Good-Turing statistics.
//!
//! Every model in a corpus is smoothed against the same [`GlobalStats`]: the
//! mass reserved for words seen nowhere in the corpus, and the overall
//! probability of each word that was seen somewhere. A model looks up a word
//! in three tiers:
//!
//! 1. seen in the model: its own discounted relative frequency;
//! 2. unseen in the model but seen in the corpus: the overall probability,
//!    renormalized over the words the model lacks and scaled by the model's
//!    unseen mass;
//! 3. unseen anywhere: an equal share of the globally unseen mass, spread
//!    over an estimate of the number of unseen word types.

use crate::lang_model::WordCounts;
use crate::lexicon::WordId;
use rustc_hash::FxHashMap;

/// Corpus-wide estimator shared by every [`crate::LanguageModel`].
///
/// Counts are noted while training documents stream in; once
/// [`finish_global_distribution`](Self::finish_global_distribution) has run,
/// the stats are read-only.
///
/// # Examples
///
/// ```
/// use geotext::{GlobalStats, Lexicon, WordCounts};
///
/// let mut lex = Lexicon::new();
/// let mut counts = WordCounts::default();
/// counts.insert(lex.intern("river"), 3);
/// counts.insert(lex.intern("bridge"), 1);
///
/// let mut global = GlobalStats::new();
/// global.note_counts(&counts);
/// global.finish_global_distribution();
///
/// // One of four tokens was a singleton type.
/// assert_eq!(global.globally_unseen_word_prob(), 0.25);
/// let total: f64 = global.overall_word_probs().map(|(_, p)| p).sum();
/// assert!((total + global.globally_unseen_word_prob() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GlobalStats {
    /// Raw counts before finishing, probabilities afterwards.
    overall_word_probs: FxHashMap<WordId, f64>,
    num_word_tokens: f64,
    num_types_seen_once: usize,
    num_unseen_word_types: f64,
    globally_unseen_word_prob: f64,
    finished: bool,
}

impl GlobalStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one document's counts into the corpus totals.
    ///
    /// # Panics
    ///
    /// Panics if the global distribution has already been finished.
    pub fn note_counts(&mut self, counts: &WordCounts) {
        assert!(
            !self.finished,
            "Cannot add counts after the global distribution is finished"
        );
        for (&word, &count) in counts {
            *self.overall_word_probs.entry(word).or_insert(0.0) += count as f64;
            self.num_word_tokens += count as f64;
        }
    }

    /// Convert accumulated counts into smoothed overall probabilities.
    ///
    /// # Panics
    ///
    /// Panics if called more than once; finishing twice would rescale
    /// probabilities that are no longer counts.
    pub fn finish_global_distribution(&mut self) {
        assert!(
            !self.finished,
            "finish_global_distribution called more than once"
        );
        self.finished = true;

        let num_word_types = self.overall_word_probs.len();
        self.num_types_seen_once = self
            .overall_word_probs
            .values()
            .filter(|&&count| count == 1.0)
            .count();

        if self.num_word_tokens > 0.0 {
            self.globally_unseen_word_prob =
                self.num_types_seen_once as f64 / self.num_word_tokens;
            let scale = (1.0 - self.globally_unseen_word_prob) / self.num_word_tokens;
            for prob in self.overall_word_probs.values_mut() {
                *prob *= scale;
            }
        } else {
            self.globally_unseen_word_prob = 0.0;
        }

        // A rough lower bound; it can badly underestimate on small corpora.
        self.num_unseen_word_types = self.num_types_seen_once.max(num_word_types / 20) as f64;

        log::info!(
            "Global distribution: {} types, {} tokens, {} seen once, globally unseen mass {:.6}",
            num_word_types,
            self.num_word_tokens,
            self.num_types_seen_once,
            self.globally_unseen_word_prob
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Overall smoothed probability of a word seen somewhere in the corpus.
    #[inline]
    pub fn overall_word_prob(&self, word: WordId) -> Option<f64> {
        debug_assert!(self.finished, "global distribution not finished");
        self.overall_word_probs.get(&word).copied()
    }

    pub fn overall_word_probs(&self) -> impl Iterator<Item = (WordId, f64)> + '_ {
        self.overall_word_probs.iter().map(|(&w, &p)| (w, p))
    }

    pub fn num_word_types(&self) -> usize {
        self.overall_word_probs.len()
    }

    pub fn num_word_tokens(&self) -> f64 {
        self.num_word_tokens
    }

    pub fn num_types_seen_once(&self) -> usize {
        self.num_types_seen_once
    }

    /// Estimated number of word types that exist but were never seen.
    pub fn num_unseen_word_types(&self) -> f64 {
        self.num_unseen_word_types
    }

    /// Probability mass reserved for words seen nowhere in the corpus.
    pub fn globally_unseen_word_prob(&self) -> f64 {
        self.globally_unseen_word_prob
    }

    /// Globally unseen mass divided evenly among the estimated unseen types.
    #[inline]
    pub fn unseen_word_type_prob(&self) -> f64 {
        if self.num_unseen_word_types > 0.0 {
            self.globally_unseen_word_prob / self.num_unseen_word_types
        } else {
            0.0
        }
    }
}
