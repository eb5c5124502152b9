use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use grocha_core::GrochaError;

use crate::schema::GrochaConfig;

/// Loads and optionally hot-reloads the Grocha configuration.
pub struct ConfigLoader {
    config: Arc<RwLock<GrochaConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > GROCHA_CONFIG env > ./grocha.toml
    /// > ~/.grocha/grocha.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("GROCHA_CONFIG") {
            return PathBuf::from(p);
        }
        let local = PathBuf::from("grocha.toml");
        if local.exists() {
            return local;
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".grocha")
            .join("grocha.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> grocha_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::prepare(Self::parse(&raw, &config_path)?)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            Self::prepare(GrochaConfig::default())?
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    fn parse(raw: &str, path: &Path) -> grocha_core::Result<GrochaConfig> {
        toml::from_str::<GrochaConfig>(raw).map_err(|e| {
            GrochaError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply env overrides, then validate: warnings are logged, errors refuse
    /// the whole document.
    fn prepare(config: GrochaConfig) -> grocha_core::Result<GrochaConfig> {
        let config = Self::apply_env_overrides(config);
        let warnings = config.validate().map_err(GrochaError::Config)?;
        for w in &warnings {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Read, parse and validate the file at `path`.
    fn read(path: &Path) -> grocha_core::Result<GrochaConfig> {
        let raw = std::fs::read_to_string(path)?;
        Self::prepare(Self::parse(&raw, path)?)
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> GrochaConfig {
        self.config.read().clone()
    }

    /// Get a shared reference for subscription.
    pub fn shared(&self) -> Arc<RwLock<GrochaConfig>> {
        Arc::clone(&self.config)
    }

    /// Path being watched.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (GROCHA_DISCORD_TOKEN, OPENWEATHER_API_KEY, etc.)
    fn apply_env_overrides(mut config: GrochaConfig) -> GrochaConfig {
        if let Ok(v) = std::env::var("GROCHA_DISCORD_TOKEN") {
            config.discord.token = v;
        } else if config.discord.token.is_empty() {
            if let Ok(v) = std::env::var("DISCORD_TOKEN") {
                config.discord.token = v;
            }
        }
        // Weather key: config file takes priority, env is the fallback.
        if config.services.openweather_api_key.is_none() {
            if let Ok(v) = std::env::var("OPENWEATHER_API_KEY") {
                config.services.openweather_api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("GROCHA_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("GROCHA_MEMORY_DIR") {
            config.memory.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("GROCHA_FAULT_MODE") {
            match v.parse() {
                Ok(mode) => config.runtime.fault_mode = mode,
                Err(e) => warn!(error = %e, "ignoring GROCHA_FAULT_MODE"),
            }
        }
        config
    }

    /// Reload the config from disk. An invalid file leaves the current
    /// config in place.
    pub fn reload(&self) -> grocha_core::Result<()> {
        if !self.config_path.exists() {
            return Err(GrochaError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::read(&self.config_path)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }

    /// Start a background file watcher that reloads the config when the file changes.
    /// Returns a handle to the watcher (must be kept alive for watching to continue).
    pub fn watch(&self) -> grocha_core::Result<notify::RecommendedWatcher> {
        let config = Arc::clone(&self.config);
        let path_for_event = self.config_path.clone();

        info!(config_path = ?self.config_path, "starting config file watcher");

        let mut watcher = notify::recommended_watcher(
            move |res: Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let is_our_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == path_for_event.file_name());
                    if !is_our_file {
                        return;
                    }

                    info!("config file changed, reloading");
                    match ConfigLoader::read(&path_for_event) {
                        Ok(new_config) => {
                            *config.write() = new_config;
                            info!("configuration hot-reloaded successfully");
                        }
                        Err(e) => {
                            warn!(error = %e, "config file has errors, keeping current config");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "file watcher error");
                }
            },
        )
        .map_err(|e| GrochaError::Config(format!("failed to create file watcher: {}", e)))?;

        // Watch the parent directory (some editors create temp files + rename)
        let watch_path = match self.config_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher
            .watch(watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| {
                GrochaError::Config(format!("failed to watch config directory: {}", e))
            })?;

        Ok(watcher)
    }
}
