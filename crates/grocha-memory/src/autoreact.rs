use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use grocha_core::{CustomEmoji, EmojiRef, Result};

use crate::store::{MemoryStore, keys};

/// Words that trigger automatic reactions, each mapped to the emoji
/// identifiers (message markup) to react with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AutoreactTable {
    entries: BTreeMap<String, BTreeSet<String>>,
}

/// An emoji set as stored: a list, or the older `{emoji: true}` map.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEmojis {
    List(BTreeSet<String>),
    Flags(BTreeMap<String, bool>),
}

impl<'de> Deserialize<'de> for AutoreactTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let stored = BTreeMap::<String, StoredEmojis>::deserialize(deserializer)?;
        let entries = stored
            .into_iter()
            .map(|(word, emojis)| {
                let set = match emojis {
                    StoredEmojis::List(set) => set,
                    StoredEmojis::Flags(flags) => flags
                        .into_iter()
                        .filter_map(|(emoji, on)| on.then_some(emoji))
                        .collect(),
                };
                (word, set)
            })
            .collect();
        Ok(Self { entries })
    }
}

impl AutoreactTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the table from the guild document, dropping every emoji that no
    /// longer resolves against `directory`. The pruned table is written back
    /// when anything was dropped.
    pub fn load(store: &mut MemoryStore, directory: &[CustomEmoji]) -> Result<Self> {
        let mut table: Self = store.get(keys::AUTOREACT)?.unwrap_or_default();
        let dropped = table.prune(directory);
        if dropped > 0 {
            info!(guild = store.guild(), dropped, "pruned stale autoreact emojis");
            table.persist(store)?;
        }
        Ok(table)
    }

    pub fn persist(&self, store: &mut MemoryStore) -> Result<()> {
        store.set(keys::AUTOREACT, self)
    }

    /// Native symbols are always valid; custom emoji must still exist in the
    /// directory under the same id.
    pub fn validate(emoji: &str, directory: &[CustomEmoji]) -> bool {
        EmojiRef::parse(emoji).is_some_and(|e| e.resolves_in(directory))
    }

    /// Add `emoji` to `word`'s set. Returns whether it was new.
    pub fn register(&mut self, word: &str, emoji: &EmojiRef) -> bool {
        self.entries
            .entry(word.to_string())
            .or_default()
            .insert(emoji.to_string())
    }

    /// Remove `emoji` from `word`'s set. The word entry itself stays.
    pub fn unregister(&mut self, word: &str, emoji: &EmojiRef) -> bool {
        self.entries
            .get_mut(word)
            .is_some_and(|set| set.remove(&emoji.to_string()))
    }

    /// Make sure `word` has an entry, possibly with no emoji.
    pub fn ensure_word(&mut self, word: &str) {
        self.entries.entry(word.to_string()).or_default();
    }

    pub fn react_candidates(&self, word: &str) -> Vec<EmojiRef> {
        self.entries
            .get(word)
            .map(|set| set.iter().filter_map(|s| EmojiRef::parse(s)).collect())
            .unwrap_or_default()
    }

    /// Drop every identifier failing [`validate`](Self::validate); returns how
    /// many were dropped. Other emoji of the same word are kept.
    pub fn prune(&mut self, directory: &[CustomEmoji]) -> usize {
        let mut dropped = 0;
        for (word, set) in self.entries.iter_mut() {
            let before = set.len();
            set.retain(|e| Self::validate(e, directory));
            if set.len() != before {
                debug!(word = %word, removed = before - set.len(), "autoreact entry pruned");
                dropped += before - set.len();
            }
        }
        dropped
    }

    /// Pick the reactions for an ordinary message: every distinct candidate
    /// of every registered token is kept with independent `probability`.
    /// A non-finite probability never reacts.
    pub fn reactions_for<R: Rng + ?Sized>(
        &self,
        tokens: &[String],
        probability: f64,
        rng: &mut R,
    ) -> Vec<EmojiRef> {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut seen = BTreeSet::new();
        let mut picked = Vec::new();
        for token in tokens {
            for emoji in self.react_candidates(token) {
                if !seen.insert(emoji.to_string()) {
                    continue;
                }
                if rng.gen_bool(probability) {
                    picked.push(emoji);
                }
            }
        }
        picked
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(w, set)| (w.as_str(), set))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
