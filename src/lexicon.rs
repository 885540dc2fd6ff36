//! Word interning.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Compact identifier for an interned word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordId(u32);

impl WordId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bidirectional word <-> [`WordId`] table. Ids are dense and assigned in
/// first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    ids: FxHashMap<Box<str>, WordId>,
    words: Vec<Box<str>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `word`, allocating one on first sight.
    pub fn intern(&mut self, word: &str) -> WordId {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = WordId(self.words.len() as u32);
        let boxed: Box<str> = word.into();
        self.words.push(boxed.clone());
        self.ids.insert(boxed, id);
        id
    }

    /// Id for `word` if it has been interned.
    pub fn get(&self, word: &str) -> Option<WordId> {
        self.ids.get(word).copied()
    }

    pub fn word(&self, id: WordId) -> Option<&str> {
        self.words.get(id.index()).map(|w| &**w)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
