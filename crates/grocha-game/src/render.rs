//! Chat rendering of Grodle words and verdicts.

use crate::grodle::{AbsentHint, Feedback, Hint};

const HAIR_SPACE: &str = "\u{200a}";

pub fn letter(c: char) -> String {
    format!(":regional_indicator_{}:", c.to_ascii_lowercase())
}

pub fn letters(word: &str) -> String {
    word.chars().map(letter).collect::<Vec<_>>().join(HAIR_SPACE)
}

pub fn square(feedback: Feedback) -> &'static str {
    match feedback {
        Feedback::Correct => ":green_square:",
        Feedback::Present => ":yellow_square:",
        Feedback::Absent => ":black_large_square:",
    }
}

pub fn squares(feedback: &[Feedback]) -> String {
    feedback
        .iter()
        .map(|f| square(*f))
        .collect::<Vec<_>>()
        .join(HAIR_SPACE)
}

pub fn hint(hint: &Hint) -> String {
    let known = hint
        .letters
        .iter()
        .map(|slot| slot.map(letter).unwrap_or_else(|| ":question:".to_string()))
        .collect::<Vec<_>>()
        .join(HAIR_SPACE);
    let mut out = format!(":ledger: Voici les lettres connues pour le moment :\n{known}");
    match &hint.absent {
        AbsentHint::None => {}
        AbsentHint::Remaining(chars) => {
            out.push_str("\nVoici les lettres possibles :\n");
            out.push_str(&letters(&chars.iter().collect::<String>()));
        }
        AbsentHint::Absent(chars) => {
            out.push_str("\nVoici les lettres absentes du mot :\n");
            out.push_str(&letters(&chars.iter().collect::<String>()));
        }
    }
    out
}
