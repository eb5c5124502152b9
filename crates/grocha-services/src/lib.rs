//! # grocha-services
//!
//! Remote collaborators the guild sessions call into. Each one is a trait
//! with a real implementation and a scripted mock; calls are fallible and
//! never retried.

pub mod dictionary;
pub mod mock;
pub mod ops;
pub mod weather;

pub use dictionary::{Dictionary, Wiktionary};
pub use mock::{MockDictionary, MockOperations, MockWeather};
pub use ops::{Operations, SystemOperations, VersionInfo};
pub use weather::{Forecast, OpenWeather, Place, TempKind, WeatherProvider};
