//! Accent-insensitive text helpers.
//!
//! Every command keyword, autoreact word and Grodle word is compared after
//! the same folding: compatibility decomposition, non-ASCII marks dropped,
//! native emoji kept untouched.

use unicode_normalization::UnicodeNormalization;

use crate::emoji::is_native_emoji_char;

/// Strip diacritics (`é` → `e`) and drop every remaining non-ASCII
/// character, except native emoji symbols which are kept as-is.
pub fn strip_accents(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if is_native_emoji_char(c) || c == '\u{fe0f}' {
            out.push(c);
            continue;
        }
        for d in std::iter::once(c).nfkd() {
            if d.is_ascii() {
                out.push(d);
            }
        }
    }
    out
}

/// Fold a message into comparison tokens: accents stripped, lowercased,
/// split on whitespace.
pub fn tokenize(input: &str) -> Vec<String> {
    strip_accents(input)
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// A plain word token: ASCII letters, digits and underscores only.
pub fn is_word(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Truncate to at most `max` characters (platform message limit).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
