use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

use grocha_core::{GrochaError, text};
use grocha_memory::{MemoryStore, keys};

pub const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Why a word was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordIssue {
    Empty,
    TooLong { length: usize, max: usize },
    ForbiddenCharacters,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrodleError {
    #[error("{}", describe_issue(.issue))]
    InvalidWord { word: String, issue: WordIssue },

    #[error("Un mot est déjà en jeu, devinez-le d'abord !")]
    AlreadyActive,

    #[error("Aucun mot à deviner pour le moment.")]
    NoActiveWord,

    #[error(":confused: Le mot actuel contient {expected} lettres !")]
    LengthMismatch { expected: usize },
}

fn describe_issue(issue: &WordIssue) -> String {
    match issue {
        WordIssue::Empty | WordIssue::ForbiddenCharacters => {
            "Le mot contient des caractères interdits".to_string()
        }
        WordIssue::TooLong { length, max } => format!(
            "Les mots de plus de {max} lettres (ici {length}) ne sont pas acceptés."
        ),
    }
}

impl From<GrodleError> for GrochaError {
    fn from(e: GrodleError) -> Self {
        match e {
            GrodleError::NoActiveWord => GrochaError::NotFound(e.to_string()),
            other => GrochaError::InvalidInput(other.to_string()),
        }
    }
}

/// Per-letter verdict for one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    Correct,
    Present,
    Absent,
}

/// Fold a user-typed word into game form: spoiler bars trimmed, accents
/// stripped, uppercase, `A`–`Z` only, at most `max_letters` long.
pub fn normalize_word(raw: &str, max_letters: usize) -> Result<String, GrodleError> {
    let word = text::strip_accents(raw.trim_matches('|')).to_uppercase();
    let invalid = |issue| GrodleError::InvalidWord {
        word: word.clone(),
        issue,
    };
    if word.is_empty() {
        return Err(invalid(WordIssue::Empty));
    }
    let length = word.chars().count();
    if length > max_letters {
        return Err(invalid(WordIssue::TooLong {
            length,
            max: max_letters,
        }));
    }
    if !word.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid(WordIssue::ForbiddenCharacters));
    }
    Ok(word)
}

/// Persisted game state of one guild.
///
/// `known_letters` and `known_absent` only grow while `secret` is set and
/// are emptied together with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrodleState {
    pub secret: Option<String>,
    pub known_letters: BTreeMap<usize, char>,
    pub known_absent: BTreeSet<char>,
    pub proposed_at: Option<DateTime<Utc>>,
}

/// The `grodle` key as stored: the current state object, or the bare
/// secret of the older layout (empty when idle).
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredGrodle {
    Secret(String),
    State(GrodleState),
}

#[derive(Debug, Clone, Copy)]
pub struct GrodleSettings {
    pub max_letters: usize,
    pub absent_hint_threshold: usize,
}

impl Default for GrodleSettings {
    fn default() -> Self {
        Self {
            max_letters: 10,
            absent_hint_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub word: String,
    pub length: usize,
}

/// Letter knowledge shown alongside the hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsentHint {
    None,
    /// Letters known to be absent.
    Absent(Vec<char>),
    /// Once enough letters are ruled out, the letters still possible.
    Remaining(Vec<char>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    /// One slot per secret position, the letter when it is known.
    pub letters: Vec<Option<char>>,
    pub absent: AbsentHint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    Win { word: String, feedback: Vec<Feedback> },
    Ongoing { word: String, feedback: Vec<Feedback> },
}

impl GuessOutcome {
    pub fn is_win(&self) -> bool {
        matches!(self, GuessOutcome::Win { .. })
    }

    pub fn word(&self) -> &str {
        match self {
            GuessOutcome::Win { word, .. } | GuessOutcome::Ongoing { word, .. } => word,
        }
    }

    pub fn feedback(&self) -> &[Feedback] {
        match self {
            GuessOutcome::Win { feedback, .. } | GuessOutcome::Ongoing { feedback, .. } => feedback,
        }
    }
}

/// The game engine of one guild.
#[derive(Debug, Clone, Default)]
pub struct Grodle {
    settings: GrodleSettings,
    state: GrodleState,
}

impl Grodle {
    pub fn new(settings: GrodleSettings) -> Self {
        Self {
            settings,
            state: GrodleState::default(),
        }
    }

    pub fn with_state(settings: GrodleSettings, state: GrodleState) -> Self {
        Self { settings, state }
    }

    /// Restore the game from the guild memory. Missing state means no word
    /// is active. The older layout (bare secret plus separate knowledge
    /// keys) is read as well.
    pub fn load(store: &MemoryStore, settings: GrodleSettings) -> grocha_core::Result<Self> {
        let state = match store.get::<StoredGrodle>(keys::GRODLE)? {
            None => GrodleState::default(),
            Some(StoredGrodle::State(state)) => state,
            Some(StoredGrodle::Secret(secret)) => Self::migrate(store, &secret, settings)?,
        };
        Ok(Self::with_state(settings, state))
    }

    fn migrate(
        store: &MemoryStore,
        secret: &str,
        settings: GrodleSettings,
    ) -> grocha_core::Result<GrodleState> {
        if secret.is_empty() {
            return Ok(GrodleState::default());
        }
        let secret = match normalize_word(secret, settings.max_letters) {
            Ok(word) => word,
            Err(e) => {
                warn!(guild = store.guild(), error = %e, "dropping unreadable grodle word");
                return Ok(GrodleState::default());
            }
        };

        let positions: BTreeMap<String, bool> =
            store.get(keys::GRODLE_KNOWN_LETTERS)?.unwrap_or_default();
        let known_letters = positions
            .iter()
            .filter(|(_, on)| **on)
            .filter_map(|(index, _)| index.parse::<usize>().ok())
            .filter_map(|i| secret.chars().nth(i).map(|c| (i, c)))
            .collect();

        let absent: BTreeMap<String, bool> =
            store.get(keys::GRODLE_KNOWN_ABSENT)?.unwrap_or_default();
        let known_absent = absent
            .iter()
            .filter(|(_, on)| **on)
            .filter_map(|(letter, _)| letter.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| c.is_ascii_uppercase() && !secret.contains(*c))
            .collect();

        debug!(guild = store.guild(), "grodle state read from older layout");
        Ok(GrodleState {
            secret: Some(secret),
            known_letters,
            known_absent,
            proposed_at: None,
        })
    }

    /// Write the game back to the guild memory in one save; an idle game
    /// removes its key. Keys of the older layout are dropped on the way.
    pub fn persist(&self, store: &mut MemoryStore) -> grocha_core::Result<()> {
        let value = match self.state.secret {
            Some(_) => Some(serde_json::to_value(&self.state)?),
            None => None,
        };
        store.update(|doc| {
            doc.remove(keys::GRODLE_KNOWN_LETTERS);
            doc.remove(keys::GRODLE_KNOWN_ABSENT);
            match value {
                Some(value) => doc.insert(keys::GRODLE.to_string(), value),
                None => doc.remove(keys::GRODLE),
            };
        })
    }

    pub fn state(&self) -> &GrodleState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.secret.is_some()
    }

    pub fn settings(&self) -> GrodleSettings {
        self.settings
    }

    pub fn propose(&mut self, raw: &str, now: DateTime<Utc>) -> Result<Proposal, GrodleError> {
        let word = normalize_word(raw, self.settings.max_letters)?;
        if self.is_active() {
            return Err(GrodleError::AlreadyActive);
        }
        let length = word.len();
        self.state = GrodleState {
            secret: Some(word.clone()),
            known_letters: BTreeMap::new(),
            known_absent: BTreeSet::new(),
            proposed_at: Some(now),
        };
        info!(length, "grodle word proposed");
        Ok(Proposal { word, length })
    }

    pub fn hint(&self) -> Result<Hint, GrodleError> {
        let secret = self.state.secret.as_deref().ok_or(GrodleError::NoActiveWord)?;
        let letters = (0..secret.len())
            .map(|i| self.state.known_letters.get(&i).copied())
            .collect();
        let absent = &self.state.known_absent;
        let absent = if absent.len() > self.settings.absent_hint_threshold {
            AbsentHint::Remaining(ALPHABET.chars().filter(|c| !absent.contains(c)).collect())
        } else if absent.is_empty() {
            AbsentHint::None
        } else {
            AbsentHint::Absent(absent.iter().copied().collect())
        };
        Ok(Hint { letters, absent })
    }

    /// Score `raw` against the secret. A win clears the word and every
    /// piece of accumulated knowledge.
    pub fn guess(&mut self, raw: &str) -> Result<GuessOutcome, GrodleError> {
        let secret = self.state.secret.clone().ok_or(GrodleError::NoActiveWord)?;
        let word = normalize_word(raw, self.settings.max_letters)?;
        if word.len() != secret.len() {
            return Err(GrodleError::LengthMismatch {
                expected: secret.len(),
            });
        }

        let feedback = self.score(&secret, &word);
        debug!(?feedback, "grodle guess scored");

        if word == secret {
            self.state = GrodleState::default();
            info!("grodle word found");
            Ok(GuessOutcome::Win { word, feedback })
        } else {
            Ok(GuessOutcome::Ongoing { word, feedback })
        }
    }

    /// Two passes: exact matches consume their letter first, then
    /// mis-placed letters are marked present only while the secret still
    /// holds unconsumed copies.
    fn score(&mut self, secret: &str, word: &str) -> Vec<Feedback> {
        let secret: Vec<char> = secret.chars().collect();
        let guess: Vec<char> = word.chars().collect();

        let mut available: HashMap<char, usize> = HashMap::new();
        for &c in &secret {
            *available.entry(c).or_default() += 1;
        }
        let mut consumed: HashMap<char, usize> = HashMap::new();
        let mut feedback = vec![None; guess.len()];

        for (i, (&g, &s)) in guess.iter().zip(&secret).enumerate() {
            if g == s {
                feedback[i] = Some(Feedback::Correct);
                *consumed.entry(g).or_default() += 1;
                self.state.known_letters.insert(i, g);
            }
        }

        for (i, &g) in guess.iter().enumerate() {
            if feedback[i].is_some() {
                continue;
            }
            let total = available.get(&g).copied().unwrap_or(0);
            let used = consumed.entry(g).or_default();
            if total > *used {
                *used += 1;
                feedback[i] = Some(Feedback::Present);
            } else {
                feedback[i] = Some(Feedback::Absent);
                if total == 0 {
                    self.state.known_absent.insert(g);
                }
            }
        }

        feedback
            .into_iter()
            .map(|f| f.unwrap_or(Feedback::Absent))
            .collect()
    }
}
