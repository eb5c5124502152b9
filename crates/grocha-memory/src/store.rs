use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use grocha_core::{GrochaError, GuildId, Result};

/// The whole persisted memory of one guild.
pub type Document = serde_json::Map<String, Value>;

/// Top-level document keys, one per subsystem.
pub mod keys {
    pub const AUTOREACT: &str = "autoreact";
    pub const GRODLE: &str = "grodle";
    /// Older layout: revealed positions, as `{"<index>": true}`.
    pub const GRODLE_KNOWN_LETTERS: &str = "grodle_known_letters";
    /// Older layout: ruled-out letters, as `{"<letter>": true}`.
    pub const GRODLE_KNOWN_ABSENT: &str = "grodle_known_absent_letters";
}

/// Where guild documents live.
pub trait MemoryBackend: Send + Sync {
    /// Load the guild's document. A guild that never saved anything gets an
    /// empty document.
    fn load(&self, guild: GuildId) -> Result<Document>;

    /// Replace the guild's document. A failed save leaves the previously
    /// persisted document intact.
    fn save(&self, guild: GuildId, document: &Document) -> Result<()>;
}

/// One `memory-<guild>.json` file per guild inside a directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, guild: GuildId) -> PathBuf {
        self.dir.join(format!("memory-{guild}.json"))
    }

    fn parse(path: &Path, raw: &str) -> Result<Document> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(map),
            other => Err(GrochaError::Memory(format!(
                "{} holds a {} instead of an object",
                path.display(),
                json_kind(&other)
            ))),
        }
    }
}

impl MemoryBackend for FileBackend {
    fn load(&self, guild: GuildId) -> Result<Document> {
        let path = self.path_for(guild);
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(?path, "loading guild memory");
                Self::parse(&path, &raw)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(?path, "no guild memory yet, starting empty");
                Ok(Document::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, guild: GuildId, document: &Document) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(guild);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, document)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|e| GrochaError::Memory(format!("replacing {}: {}", path.display(), e)))?;
        debug!(?path, "guild memory saved");
        Ok(())
    }
}

/// Keeps serialized documents in RAM. Used by tests and dry runs; going
/// through text keeps the same round-trip behavior as the file backend.
#[derive(Default)]
pub struct InMemoryBackend {
    documents: Mutex<HashMap<GuildId, String>>,
    failing: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw persisted text for a guild, if anything was saved.
    pub fn raw(&self, guild: GuildId) -> Option<String> {
        self.documents.lock().get(&guild).cloned()
    }

    /// Seed a guild's persisted text.
    pub fn put_raw(&self, guild: GuildId, raw: impl Into<String>) {
        self.documents.lock().insert(guild, raw.into());
    }

    /// Make every following `save` fail (or succeed again).
    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl MemoryBackend for InMemoryBackend {
    fn load(&self, guild: GuildId) -> Result<Document> {
        match self.documents.lock().get(&guild) {
            Some(raw) => FileBackend::parse(Path::new("<memory>"), raw),
            None => Ok(Document::new()),
        }
    }

    fn save(&self, guild: GuildId, document: &Document) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GrochaError::Memory(format!("guild {guild}: save refused")));
        }
        let raw = serde_json::to_string(document)?;
        self.documents.lock().insert(guild, raw);
        Ok(())
    }
}

/// A guild's memory document plus the backend it is flushed to.
///
/// Every mutating call rewrites the full document before returning, so a
/// later read (or a restart) never observes a half-applied change. A failed
/// write leaves the in-memory document as it was.
pub struct MemoryStore {
    guild: GuildId,
    backend: Arc<dyn MemoryBackend>,
    document: Document,
}

impl MemoryStore {
    pub fn open(guild: GuildId, backend: Arc<dyn MemoryBackend>) -> Result<Self> {
        let document = backend.load(guild)?;
        info!(guild, keys = document.len(), "memory store opened");
        Ok(Self {
            guild,
            backend,
            document,
        })
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Decode the value stored under `key`, `None` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.document.get(key) {
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                GrochaError::Memory(format!("guild {} key '{}': {}", self.guild, key, e))
            }),
            None => Ok(None),
        }
    }

    /// Store `value` under `key` and flush.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.update(|doc| {
            doc.insert(key.to_string(), value);
        })
    }

    /// Drop `key` and flush.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if !self.document.contains_key(key) {
            return Ok(());
        }
        self.update(|doc| {
            doc.remove(key);
        })
    }

    /// Apply `edit` to a copy of the document and save it. The copy becomes
    /// the current document only once the backend accepted it.
    pub fn update(&mut self, edit: impl FnOnce(&mut Document)) -> Result<()> {
        let mut candidate = self.document.clone();
        edit(&mut candidate);
        self.backend.save(self.guild, &candidate)?;
        self.document = candidate;
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
