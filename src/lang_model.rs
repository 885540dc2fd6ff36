//! Per-entity word distributions with pseudo-Good-Turing smoothing.

use crate::lexicon::WordId;
use crate::smoothing::GlobalStats;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Raw word counts for a single document.
pub type WordCounts = FxHashMap<WordId, u32>;

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

fn next_model_id() -> u64 {
    NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed)
}

/// A word distribution for one document or cell.
///
/// A model accumulates counts, then is [`finish`](Self::finish)ed against
/// the corpus-wide [`GlobalStats`], after which it answers smoothed
/// probability lookups. Each model carries a process-unique id and a
/// generation counter that changes on every mutation; together they key
/// the [`DivergenceEngine`](crate::DivergenceEngine) cache.
#[derive(Debug)]
pub struct LanguageModel {
    id: u64,
    generation: u64,
    counts: FxHashMap<WordId, f64>,
    total_tokens: f64,
    /// Mass reserved for words this model never saw.
    unseen_mass: f64,
    /// Global probability mass of the words this model never saw.
    overall_unseen_mass: f64,
    finished: bool,
}

impl Default for LanguageModel {
    fn default() -> Self {
        Self {
            id: next_model_id(),
            generation: 0,
            counts: FxHashMap::default(),
            total_tokens: 0.0,
            unseen_mass: 0.5,
            overall_unseen_mass: 1.0,
            finished: false,
        }
    }
}

impl Clone for LanguageModel {
    /// Clones get a fresh id so they never alias the original in a cache.
    fn clone(&self) -> Self {
        Self {
            id: next_model_id(),
            generation: 0,
            counts: self.counts.clone(),
            total_tokens: self.total_tokens,
            unseen_mass: self.unseen_mass,
            overall_unseen_mass: self.overall_unseen_mass,
            finished: self.finished,
        }
    }
}

impl LanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: &WordCounts) -> Self {
        let mut model = Self::new();
        model.add_counts(counts);
        model
    }

    fn touch(&mut self) {
        assert!(!self.finished, "Cannot modify a finished language model");
        self.generation += 1;
    }

    /// Merge raw document counts into this model.
    pub fn add_counts(&mut self, counts: &WordCounts) {
        self.touch();
        for (&word, &count) in counts {
            if count > 0 {
                *self.counts.entry(word).or_insert(0.0) += count as f64;
                self.total_tokens += count as f64;
            }
        }
    }

    /// Merge another model's counts into this one.
    pub fn add_model(&mut self, other: &LanguageModel) {
        self.touch();
        for (&word, &count) in &other.counts {
            *self.counts.entry(word).or_insert(0.0) += count;
        }
        self.total_tokens += other.total_tokens;
    }

    /// Blend this model's relative frequencies with its parent's:
    /// `(1 - weight) * own + weight * parent`, keeping this model's token
    /// total. An empty model stays empty.
    pub fn interpolate_with(&mut self, parent: &LanguageModel, weight: f64) {
        self.touch();
        if self.total_tokens <= 0.0 || parent.total_tokens <= 0.0 || weight <= 0.0 {
            return;
        }
        let scale = self.total_tokens / parent.total_tokens;
        for count in self.counts.values_mut() {
            *count *= 1.0 - weight;
        }
        for (&word, &parent_count) in &parent.counts {
            *self.counts.entry(word).or_insert(0.0) += weight * parent_count * scale;
        }
        self.counts.retain(|_, count| *count > 0.0);
    }

    /// Convert counts to a smoothed distribution.
    ///
    /// Words counted fewer than `minimum_word_count` times are dropped when
    /// that threshold is above 1.
    ///
    /// # Panics
    ///
    /// Panics if the model is already finished.
    pub fn finish(&mut self, global: &GlobalStats, minimum_word_count: u32) {
        self.touch();

        if minimum_word_count > 1 {
            let threshold = minimum_word_count as f64;
            let mut dropped = 0.0;
            self.counts.retain(|_, &mut count| {
                if count < threshold {
                    dropped += count;
                    false
                } else {
                    true
                }
            });
            self.total_tokens -= dropped;
        }

        let types_seen_once = self.counts.values().filter(|&&count| count == 1.0).count();
        self.unseen_mass = if self.total_tokens > 0.0 {
            (types_seen_once.max(1) as f64 / self.total_tokens).min(0.5)
        } else {
            0.5
        };

        let overall_seen_mass: f64 = self
            .counts
            .keys()
            .filter_map(|&word| global.overall_word_prob(word))
            .sum();
        self.overall_unseen_mass = 1.0 - overall_seen_mass;
        self.finished = true;
    }

    /// Smoothed probability of `word` under this model.
    ///
    /// # Panics
    ///
    /// Panics if the model has not been finished.
    pub fn lookup_word(&self, word: WordId, global: &GlobalStats) -> f64 {
        assert!(self.finished, "Language model looked up before finish");
        if let Some(&count) = self.counts.get(&word) {
            return count / self.total_tokens * (1.0 - self.unseen_mass);
        }
        match global.overall_word_prob(word) {
            Some(overall) if self.overall_unseen_mass > 0.0 => {
                self.unseen_mass * overall / self.overall_unseen_mass
            }
            Some(_) => 0.0,
            None => self.unseen_mass * global.unseen_word_type_prob(),
        }
    }

    /// Reference KL-divergence KL(self || other).
    ///
    /// With `partial`, only the words in `self` contribute.
    pub fn slow_kl_divergence(
        &self,
        other: &LanguageModel,
        global: &GlobalStats,
        partial: bool,
    ) -> f64 {
        self.kl_divergence_impl(other, global, partial, None)
    }

    /// Like [`slow_kl_divergence`](Self::slow_kl_divergence), also returning
    /// each word's contribution.
    pub fn kl_divergence_contributions(
        &self,
        other: &LanguageModel,
        global: &GlobalStats,
        partial: bool,
    ) -> (f64, FxHashMap<WordId, f64>) {
        let mut contribs = FxHashMap::default();
        let kldiv = self.kl_divergence_impl(other, global, partial, Some(&mut contribs));
        (kldiv, contribs)
    }

    fn kl_divergence_impl(
        &self,
        other: &LanguageModel,
        global: &GlobalStats,
        partial: bool,
        mut contribs: Option<&mut FxHashMap<WordId, f64>>,
    ) -> f64 {
        assert!(self.finished && other.finished, "KL-divergence of unfinished models");
        let mut kldiv = 0.0;

        for &word in self.counts.keys() {
            let p = self.lookup_word(word, global);
            let q = other.lookup_word(word, global);
            if let Some(term) = kl_term(p, q) {
                kldiv += term;
                if let Some(contribs) = contribs.as_deref_mut() {
                    contribs.insert(word, term);
                }
            } else {
                log::debug!("Skipping word {:?} with p={} q={}", word, p, q);
            }
        }

        if partial {
            return kldiv;
        }

        let mut overall_probs_diff_words = 0.0;
        for &word in other.counts.keys() {
            if self.counts.contains_key(&word) {
                continue;
            }
            let p = self.lookup_word(word, global);
            let q = other.lookup_word(word, global);
            if let Some(term) = kl_term(p, q) {
                kldiv += term;
                if let Some(contribs) = contribs.as_deref_mut() {
                    contribs.insert(word, term);
                }
            }
            overall_probs_diff_words += global.overall_word_prob(word).unwrap_or(0.0);
        }

        kldiv + self.kl_divergence_34(other, global, overall_probs_diff_words)
    }

    /// Closed-form KL contribution of the words absent from both models:
    /// those seen elsewhere in the corpus, then those never seen at all.
    pub(crate) fn kl_divergence_34(
        &self,
        other: &LanguageModel,
        global: &GlobalStats,
        overall_probs_diff_words: f64,
    ) -> f64 {
        let mut kldiv = 0.0;

        let the_sum = self.overall_unseen_mass - overall_probs_diff_words;
        if self.overall_unseen_mass > 0.0 && other.overall_unseen_mass > 0.0 && the_sum > 0.0 {
            let factor1 = (self.unseen_mass.ln() - self.overall_unseen_mass.ln())
                - (other.unseen_mass.ln() - other.overall_unseen_mass.ln());
            let factor2 = self.unseen_mass / self.overall_unseen_mass * factor1;
            kldiv += factor2 * the_sum;
        }

        let num_unseen = global.num_unseen_word_types();
        let type_prob = global.unseen_word_type_prob();
        if type_prob > 0.0 {
            let p = self.unseen_mass * type_prob;
            let q = other.unseen_mass * type_prob;
            kldiv += num_unseen * (p * (p.ln() - q.ln()));
        }

        kldiv
    }

    /// Raw (possibly interpolated) count of `word`.
    pub fn count(&self, word: WordId) -> f64 {
        self.counts.get(&word).copied().unwrap_or(0.0)
    }

    pub fn counts(&self) -> impl Iterator<Item = (WordId, f64)> + '_ {
        self.counts.iter().map(|(&w, &c)| (w, c))
    }

    pub fn contains(&self, word: WordId) -> bool {
        self.counts.contains_key(&word)
    }

    pub fn num_word_types(&self) -> usize {
        self.counts.len()
    }

    pub fn total_tokens(&self) -> f64 {
        self.total_tokens
    }

    pub fn unseen_mass(&self) -> f64 {
        self.unseen_mass
    }

    pub fn overall_unseen_mass(&self) -> f64 {
        self.overall_unseen_mass
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Identity of this model, stable for its lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bumped on every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// `p * (ln p - ln q)`, or `None` when either probability is not positive.
#[inline]
pub(crate) fn kl_term(p: f64, q: f64) -> Option<f64> {
    (p > 0.0 && q > 0.0).then(|| p * (p.ln() - q.ln()))
}

impl std::fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LanguageModel({} types, {} tokens, {:.2} unseen mass{})",
            self.counts.len(),
            self.total_tokens,
            self.unseen_mass,
            if self.finished { "" } else { ", unfinished" }
        )
    }
}
