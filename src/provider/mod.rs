//! Data providers
//!
//! A provider hands the scene a complete snapshot on demand. Snapshots are
//! replaced wholesale; nothing here is incremental.

pub mod plume;

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::data::{MeasurementPoint, WindVector};

pub use plume::{PlumeParams, PlumeProvider};

/// Base radius for station points, meters
pub const STATION_BASE_RADIUS_M: f64 = 220.0;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid feed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),
    #[error("feed has neither points nor wind")]
    Empty,
}

/// One data refresh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub points: Vec<MeasurementPoint>,
    /// Absent when the source had no usable wind reading
    pub wind: Option<WindVector>,
}

/// Pull-based source of measurement snapshots
pub trait DataProvider {
    fn fetch(&mut self) -> Result<Snapshot, ProviderError>;
}

// ============================================================================
// Station feed (bounding-box JSON)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct FeedAirQuality {
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    no2: Option<f64>,
    so2: Option<f64>,
    co: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FeedWind {
    speed: Option<f64>,
    direction: Option<f64>,
}

impl FeedWind {
    fn to_vector(&self) -> Option<WindVector> {
        WindVector::new(self.speed?, self.direction?)
    }
}

#[derive(Debug, Deserialize)]
struct FeedPoint {
    lat: f64,
    #[serde(alias = "lng")]
    lon: f64,
    #[serde(default)]
    air_quality: FeedAirQuality,
    wind: Option<FeedWind>,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    points: Vec<FeedPoint>,
    wind: Option<FeedWind>,
}

/// Parse a bounding-box feed into a snapshot
pub fn parse_station_feed(json: &str, base_radius_m: f64) -> Result<Snapshot, ProviderError> {
    let feed: Feed = serde_json::from_str(json)?;

    let wind = feed
        .wind
        .as_ref()
        .and_then(FeedWind::to_vector)
        .or_else(|| {
            feed.points
                .iter()
                .filter_map(|p| p.wind.as_ref()?.to_vector())
                .next()
        });

    let points: Vec<MeasurementPoint> = feed
        .points
        .iter()
        .filter(|p| p.lat.is_finite() && p.lon.is_finite())
        .map(|p| {
            let aq = &p.air_quality;
            MeasurementPoint {
                pm10: aq.pm10,
                no2: aq.no2,
                so2: aq.so2,
                co: aq.co,
                ..MeasurementPoint::new(p.lat, p.lon, aq.pm2_5, base_radius_m)
            }
        })
        .collect();

    if points.is_empty() && wind.is_none() {
        return Err(ProviderError::Empty);
    }
    debug!(points = points.len(), has_wind = wind.is_some(), "Station feed parsed");
    Ok(Snapshot { points, wind })
}

/// Station feed read from a JSON document
#[derive(Clone, Debug)]
pub struct StationFeed {
    json: String,
    base_radius_m: f64,
}

impl StationFeed {
    pub fn from_json(json: impl Into<String>) -> Self {
        Self {
            json: json.into(),
            base_radius_m: STATION_BASE_RADIUS_M,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        info!(path = %path.display(), bytes = json.len(), "Loaded station feed");
        Ok(Self::from_json(json))
    }

    pub fn with_base_radius(mut self, meters: f64) -> Self {
        self.base_radius_m = meters;
        self
    }
}

impl DataProvider for StationFeed {
    fn fetch(&mut self) -> Result<Snapshot, ProviderError> {
        parse_station_feed(&self.json, self.base_radius_m)
    }
}
