use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static CUSTOM_EMOJI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<(a?):(\w+):(\d+)>$").expect("static regex"));

const VARIATION_SELECTOR: char = '\u{fe0f}';

/// A custom emoji as listed in a guild's emoji directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEmoji {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub animated: bool,
}

impl CustomEmoji {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            animated: false,
        }
    }

    /// Message markup, e.g. `<:grant:42>` or `<a:dance:7>`.
    pub fn markup(&self) -> String {
        format!(
            "<{}:{}:{}>",
            if self.animated { "a" } else { "" },
            self.name,
            self.id
        )
    }
}

/// An emoji identifier as typed by users or stored in memory: either a
/// native symbol or a `(name, id)` reference into the guild directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmojiRef {
    Native { symbol: String },
    Custom { name: String, id: u64, animated: bool },
}

impl EmojiRef {
    /// Parse a single token into an emoji identifier.
    pub fn parse(token: &str) -> Option<Self> {
        if is_native_emoji(token) {
            return Some(EmojiRef::Native {
                symbol: token.to_string(),
            });
        }
        let caps = CUSTOM_EMOJI.captures(token)?;
        let id = caps[3].parse::<u64>().ok()?;
        Some(EmojiRef::Custom {
            name: caps[2].to_string(),
            id,
            animated: !caps[1].is_empty(),
        })
    }

    /// Native symbols always resolve; custom references must name an emoji of
    /// the live directory with the same id.
    pub fn resolves_in(&self, directory: &[CustomEmoji]) -> bool {
        match self {
            EmojiRef::Native { .. } => true,
            EmojiRef::Custom { name, id, .. } => directory
                .iter()
                .find(|e| &e.name == name)
                .is_some_and(|e| e.id == *id),
        }
    }

    /// Whether this reference designates the given directory emoji.
    pub fn is(&self, emoji: &CustomEmoji) -> bool {
        matches!(self, EmojiRef::Custom { id, .. } if *id == emoji.id)
    }

    /// The form the REST API expects in reaction routes (`name:id` or the symbol).
    pub fn reaction_key(&self) -> String {
        match self {
            EmojiRef::Native { symbol } => symbol.clone(),
            EmojiRef::Custom { name, id, .. } => format!("{name}:{id}"),
        }
    }
}

impl From<&CustomEmoji> for EmojiRef {
    fn from(e: &CustomEmoji) -> Self {
        EmojiRef::Custom {
            name: e.name.clone(),
            id: e.id,
            animated: e.animated,
        }
    }
}

impl fmt::Display for EmojiRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmojiRef::Native { symbol } => f.write_str(symbol),
            EmojiRef::Custom { name, id, animated } => {
                write!(f, "<{}:{}:{}>", if *animated { "a" } else { "" }, name, id)
            }
        }
    }
}

/// Symbols between U+263A and U+1FFFF count as native emoji.
pub(crate) fn is_native_emoji_char(c: char) -> bool {
    ('\u{263a}'..='\u{1ffff}').contains(&c)
}

/// A single native symbol, optionally followed by the emoji variation selector.
pub fn is_native_emoji(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(c), None, _) => is_native_emoji_char(c),
        (Some(c), Some(VARIATION_SELECTOR), None) => is_native_emoji_char(c),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_with_variation_selector() {
        assert!(is_native_emoji("❤\u{fe0f}"));
        assert!(is_native_emoji("🐱"));
        assert!(!is_native_emoji("🐱🐱"));
        assert!(!is_native_emoji("a"));
    }

    #[test]
    fn animated_markup_roundtrip() {
        let e = EmojiRef::parse("<a:dance:77>").unwrap();
        assert_eq!(e.to_string(), "<a:dance:77>");
        assert_eq!(e.reaction_key(), "dance:77");
    }
}
