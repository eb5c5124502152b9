use parking_lot::RwLock;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

use grocha_channels::Platform;
use grocha_config::GrochaConfig;
use grocha_core::GuildId;
use grocha_memory::{FileBackend, MemoryBackend};
use grocha_services::{
    Dictionary, OpenWeather, Operations, SystemOperations, WeatherProvider, Wiktionary,
};

/// Everything a guild session needs from the outside world. Shared by all
/// sessions of the process.
#[derive(Clone)]
pub struct SessionContext {
    pub platform: Arc<dyn Platform>,
    pub backend: Arc<dyn MemoryBackend>,
    pub weather: Arc<dyn WeatherProvider>,
    pub dictionary: Arc<dyn Dictionary>,
    pub ops: Arc<dyn Operations>,
    /// Live configuration; tunables are read on use so hot reloads apply.
    pub config: Arc<RwLock<GrochaConfig>>,
    /// Fixed seed for the autoreact coin, entropy when `None`.
    pub rng_seed: Option<u64>,
}

impl SessionContext {
    /// Production wiring: file memory, OpenWeather, Wiktionary and system
    /// operations, all configured from `config`.
    pub fn from_config(platform: Arc<dyn Platform>, config: Arc<RwLock<GrochaConfig>>) -> Self {
        let cfg = config.read().clone();
        Self {
            platform,
            backend: Arc::new(FileBackend::new(cfg.memory.dir.clone())),
            weather: Arc::new(OpenWeather::new(
                cfg.services.openweather_base.clone(),
                cfg.services.openweather_api_key.clone(),
            )),
            dictionary: Arc::new(Wiktionary::new(cfg.services.wiktionary_base.clone())),
            ops: Arc::new(SystemOperations::new(
                cfg.ops.repo_dir.clone(),
                cfg.ops.service_name.clone(),
            )),
            config,
            rng_seed: None,
        }
    }

    pub fn config(&self) -> GrochaConfig {
        self.config.read().clone()
    }

    pub fn rng_for(&self, guild: GuildId) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ guild),
            None => StdRng::from_entropy(),
        }
    }
}
