use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use grocha_core::{GrochaError, Result, text};

/// Reference dictionary: tells whether a word exists.
#[async_trait]
pub trait Dictionary: Send + Sync {
    /// URL of the entry for `word`, `None` when it is not found.
    async fn lookup(&self, word: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

/// MediaWiki full-text search on a Wiktionary instance.
pub struct Wiktionary {
    base: String,
    client: reqwest::Client,
}

impl Wiktionary {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// First title equal to `word` once accents are stripped, ignoring case.
    pub fn matching_title<'a>(titles: impl IntoIterator<Item = &'a str>, word: &str) -> Option<&'a str> {
        let wanted = word.to_lowercase();
        titles
            .into_iter()
            .find(|t| text::strip_accents(t).to_lowercase() == wanted)
    }

    pub fn entry_url(&self, title: &str) -> String {
        format!("{}/wiki/{}", self.base, title)
    }
}

#[async_trait]
impl Dictionary for Wiktionary {
    async fn lookup(&self, word: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(format!("{}/w/api.php", self.base))
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", word),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| GrochaError::service("wiktionary", format!("HTTP error: {e}")))?;

        if !resp.status().is_success() {
            return Err(GrochaError::service(
                "wiktionary",
                format!("status {}", resp.status()),
            ));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| GrochaError::service("wiktionary", format!("bad response: {e}")))?;

        let found = Self::matching_title(body.query.search.iter().map(|h| h.title.as_str()), word)
            .map(|title| self.entry_url(title));
        debug!(word, found = found.is_some(), "dictionary lookup");
        Ok(found)
    }
}
