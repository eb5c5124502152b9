use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use grocha_core::{GrochaError, Result};

/// A resolved location.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Which temperature the report shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempKind {
    #[default]
    FeelsLike,
    Exact,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Resolve `Ville` or `Ville, Région` to coordinates.
    async fn geocode(&self, query: &str) -> Result<Option<Place>>;

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Forecast>;
}

// ── Forecast document ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub timezone_offset: i32,
    pub current: Conditions,
    #[serde(default)]
    pub minutely: Vec<Minute>,
    #[serde(default)]
    pub hourly: Vec<Conditions>,
    #[serde(default)]
    pub daily: Vec<Day>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Conditions {
    pub dt: i64,
    pub temp: f64,
    pub feels_like: f64,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Minute {
    pub dt: i64,
    pub precipitation: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Day {
    pub dt: i64,
    #[serde(default)]
    pub sunrise: i64,
    #[serde(default)]
    pub sunset: i64,
    #[serde(default)]
    pub moonrise: i64,
    #[serde(default)]
    pub moonset: i64,
    #[serde(default)]
    pub moon_phase: f64,
    pub temp: BTreeMap<String, f64>,
    pub feels_like: BTreeMap<String, f64>,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

const DAY_NAMES: [&str; 7] = ["Lun", "Mar", "Mer", "Jeu", "Ven", "Sam", "Dim"];

fn single_temp(t: f64) -> String {
    format!("{:>6}", format!("{t:.1}°"))
}

fn range_temp(values: &BTreeMap<String, f64>) -> String {
    if values.is_empty() {
        return format!("{:>6}", "?");
    }
    let min = values.values().copied().fold(f64::INFINITY, f64::min);
    let max = values.values().copied().fold(f64::NEG_INFINITY, f64::max);
    format!("{:>6}", format!("{}°/{}°", min.round(), max.round()))
}

impl Forecast {
    fn local_time(&self, dt: i64) -> Option<DateTime<FixedOffset>> {
        FixedOffset::east_opt(self.timezone_offset)?
            .timestamp_opt(dt, 0)
            .single()
    }

    fn is_day_time(&self, dt: i64) -> bool {
        self.daily.iter().any(|d| d.sunrise < dt && dt < d.sunset)
    }

    fn night_sky(&self, dt: i64) -> &'static str {
        match self
            .daily
            .iter()
            .find(|d| d.moonrise < dt && dt < d.moonset)
        {
            Some(d) => match (d.moon_phase * 4.0).round() as i64 {
                1 => ":first_quarter_moon:",
                2 => ":full_moon:",
                3 => ":last_quarter_moon:",
                _ => ":new_moon:",
            },
            None => ":night_with_stars:",
        }
    }

    /// Sky emoji for an OpenWeather condition code.
    pub fn sky_emoji(&self, dt: i64, code: u32) -> &'static str {
        let day = self.is_day_time(dt);
        match code {
            804.. => ":cloud:",
            802..=803 => if day { ":white_sun_cloud:" } else { ":cloud:" },
            801 => if day { ":white_sun_small_cloud:" } else { ":cloud:" },
            800 => if day { ":sunny:" } else { self.night_sky(dt) },
            600..=799 => ":cloud_snow:",
            300..=599 => ":cloud_rain:",
            200..=299 => ":thunder_cloud_rain:",
            _ => ":grey_question:",
        }
    }

    fn describe(&self, dt: i64, weather: &[Condition], temp: String) -> String {
        let code = weather.first().map(|c| c.id).unwrap_or(0);
        format!("{}`{}`", self.sky_emoji(dt, code), temp)
    }

    fn describe_conditions(&self, c: &Conditions, kind: TempKind) -> String {
        let t = match kind {
            TempKind::FeelsLike => c.feels_like,
            TempKind::Exact => c.temp,
        };
        self.describe(c.dt, &c.weather, single_temp(t))
    }

    fn describe_day(&self, d: &Day, kind: TempKind) -> String {
        let t = match kind {
            TempKind::FeelsLike => &d.feels_like,
            TempKind::Exact => &d.temp,
        };
        self.describe(d.dt, &d.weather, range_temp(t))
    }

    fn rain_line(&self) -> String {
        let now = self.current.dt;
        let minutes = |dt: i64| ((dt - now) as f64 / 60.0).round() as i64;
        match self.minutely.iter().find(|m| m.precipitation > 0.0) {
            None => "Pas de pluie prévue dans l'heure :muscle:".to_string(),
            Some(rain) if minutes(rain.dt) > 0 => {
                format!("Pluie dans {} minutes :umbrella:", minutes(rain.dt))
            }
            Some(_) => match self.minutely.iter().find(|m| m.precipitation == 0.0) {
                Some(clear) => format!(
                    "La pluie s'arrêtera dans {} minutes :umbrella:",
                    minutes(clear.dt)
                ),
                None => "La pluie s'arrêtera dans plus d'une heure :umbrella:".to_string(),
            },
        }
    }

    /// Chat report: current conditions, next-hour rain, a 4×4 hourly grid
    /// and up to six days.
    pub fn report(&self, place: &str, kind: TempKind) -> String {
        let mut out = String::from("MAOU-téo:");
        let when = self
            .local_time(self.current.dt)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%:z").to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "\nEn ce moment à {place} ({when}) : {}",
            self.describe_conditions(&self.current, kind)
        ));
        out.push('\n');
        out.push_str(&self.rain_line());

        out.push('\n');
        let hours = self.hourly.len().min(16);
        for row in (0..hours).step_by(4) {
            let cells: Vec<String> = self.hourly[row..(row + 4).min(hours)]
                .iter()
                .map(|h| {
                    let hour = self.local_time(h.dt).map(|t| t.hour()).unwrap_or(0);
                    format!("`{hour:0>2}h:`{}", self.describe_conditions(h, kind))
                })
                .collect();
            out.push('\n');
            out.push_str(&cells.join(" "));
        }

        out.push('\n');
        let days: Vec<String> = self
            .daily
            .iter()
            .take(6)
            .map(|d| {
                let name = self
                    .local_time(d.dt)
                    .map(|t| DAY_NAMES[t.weekday().num_days_from_monday() as usize])
                    .unwrap_or("?");
                format!("`{name}:`{}", self.describe_day(d, kind))
            })
            .collect();
        out.push('\n');
        out.push_str(&days.join(" "));
        out
    }
}

// ── OpenWeather client ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeoHit {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    local_names: HashMap<String, String>,
    state: Option<String>,
    country: Option<String>,
}

impl From<GeoHit> for Place {
    fn from(hit: GeoHit) -> Self {
        let mut name = hit.local_names.get("fr").cloned().unwrap_or(hit.name);
        for part in [hit.state, hit.country].into_iter().flatten() {
            name.push_str(", ");
            name.push_str(&part);
        }
        Place {
            name,
            lat: hit.lat,
            lon: hit.lon,
        }
    }
}

pub struct OpenWeather {
    base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenWeather {
    pub fn new(base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GrochaError::service("openweather", "no API key configured"))
    }

    /// `Ville, Région` needs a third component for the region to be used.
    pub fn geocode_query(query: &str) -> String {
        if query.matches(',').count() == 1 {
            format!("{query},Placeholder")
        } else {
            query.to_string()
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .query(query)
            .send()
            .await
            .map_err(|e| GrochaError::service("openweather", format!("HTTP error: {e}")))?;
        if !resp.status().is_success() {
            return Err(GrochaError::service(
                "openweather",
                format!("status {}", resp.status()),
            ));
        }
        resp.json()
            .await
            .map_err(|e| GrochaError::service("openweather", format!("bad response: {e}")))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeather {
    async fn geocode(&self, query: &str) -> Result<Option<Place>> {
        let key = self.key()?.to_string();
        let hits: Vec<GeoHit> = self
            .get_json(
                "/geo/1.0/direct",
                &[
                    ("q", Self::geocode_query(query)),
                    ("limit", "1".to_string()),
                    ("appid", key),
                ],
            )
            .await?;
        let place = hits.into_iter().next().map(Place::from);
        debug!(query, found = place.is_some(), "geocoded");
        Ok(place)
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Forecast> {
        let key = self.key()?.to_string();
        self.get_json(
            "/data/2.5/onecall",
            &[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", "metric".to_string()),
                ("lang", "fr".to_string()),
                ("appid", key),
            ],
        )
        .await
    }
}
