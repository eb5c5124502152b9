//! # grocha-game
//!
//! The Grodle mini-game: one secret word per guild, guesses scored with
//! tri-state per-letter feedback, and cumulative knowledge of the letters
//! found so far.

pub mod grodle;
pub mod render;

pub use grodle::{
    AbsentHint, Feedback, Grodle, GrodleError, GrodleSettings, GrodleState, GuessOutcome, Hint,
    Proposal, WordIssue, normalize_word,
};
