//! Scripted collaborators for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use grocha_core::{GrochaError, Result};

use crate::dictionary::Dictionary;
use crate::ops::{Operations, VersionInfo};
use crate::weather::{Forecast, Place, WeatherProvider};

/// Knows a fixed set of words.
#[derive(Default)]
pub struct MockDictionary {
    words: Mutex<HashMap<String, String>>,
    failing: bool,
}

impl MockDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dictionary whose every lookup fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_word(self, word: &str) -> Self {
        self.words.lock().insert(
            word.to_uppercase(),
            format!("https://dico.test/wiki/{}", word.to_lowercase()),
        );
        self
    }
}

#[async_trait]
impl Dictionary for MockDictionary {
    async fn lookup(&self, word: &str) -> Result<Option<String>> {
        if self.failing {
            return Err(GrochaError::service("dictionary", "unreachable"));
        }
        Ok(self.words.lock().get(&word.to_uppercase()).cloned())
    }
}

/// Serves one forecast for every place it knows.
pub struct MockWeather {
    places: Mutex<HashMap<String, Place>>,
    forecast: Forecast,
    /// Coordinates asked for, in order.
    pub requests: Mutex<Vec<(f64, f64)>>,
}

impl MockWeather {
    pub fn new(forecast: Forecast) -> Self {
        Self {
            places: Mutex::new(HashMap::new()),
            forecast,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_place(self, query: &str, place: Place) -> Self {
        self.places.lock().insert(query.to_lowercase(), place);
        self
    }
}

#[async_trait]
impl WeatherProvider for MockWeather {
    async fn geocode(&self, query: &str) -> Result<Option<Place>> {
        Ok(self.places.lock().get(&query.to_lowercase()).cloned())
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Forecast> {
        self.requests.lock().push((lat, lon));
        Ok(self.forecast.clone())
    }
}

/// Records operations instead of running them.
pub struct MockOperations {
    pub version: VersionInfo,
    pub update_output: String,
    pub restarts: Mutex<usize>,
}

impl Default for MockOperations {
    fn default() -> Self {
        Self {
            version: VersionInfo {
                sha: "0123456789abcdef".into(),
                date: "Mon Jan 1 12:00:00 2024 +0100".into(),
            },
            update_output: "Already up to date.".into(),
            restarts: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Operations for MockOperations {
    async fn version(&self) -> Result<VersionInfo> {
        Ok(self.version.clone())
    }

    async fn update(&self) -> Result<String> {
        Ok(self.update_output.clone())
    }

    async fn restart(&self) -> Result<()> {
        *self.restarts.lock() += 1;
        Ok(())
    }
}
