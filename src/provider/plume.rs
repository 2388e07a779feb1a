//! Synthetic plume: a fan of rays around the wind direction
//!
//! Concentrations decay exponentially with distance from the source and
//! with angular offset from the downwind axis. Stronger wind narrows the fan
//! and widens the clouds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataProvider, ProviderError, Snapshot};
use crate::core::data::{GeoPoint, MeasurementPoint, WindVector, DEFAULT_CENTER};
use crate::core::drift::{meters_per_deg_lng, METERS_PER_DEG_LAT};

const DECAY_KM: f64 = 2.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlumeParams {
    pub source: GeoPoint,
    pub wind_speed: f64,
    pub wind_dir_deg: f64,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub co: f64,
    pub num_rays: u32,
    pub max_distance_m: u32,
    pub step_m: u32,
}

impl Default for PlumeParams {
    fn default() -> Self {
        Self {
            source: DEFAULT_CENTER,
            wind_speed: 3.0,
            wind_dir_deg: 45.0,
            pm25: 22.0,
            pm10: 35.0,
            no2: 18.0,
            so2: 6.0,
            co: 0.7,
            num_rays: 9,
            max_distance_m: 5000,
            step_m: 500,
        }
    }
}

/// Fan half-width in degrees, narrower for stronger wind
#[inline]
pub fn spread_deg(wind_speed: f64) -> f64 {
    (60.0 - wind_speed * 3.0).max(15.0)
}

/// Cloud radius in meters for every point of the plume
#[inline]
pub fn plume_radius_m(wind_speed: f64) -> f64 {
    (120.0 * (1.0 + wind_speed / 5.0)).floor().max(60.0)
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (v * f).round() / f
}

/// Ray bearings, symmetric around the wind direction
fn ray_angles(dir: f64, num_rays: u32, spread: f64) -> Vec<f64> {
    let half = (num_rays.max(1) / 2) as i64;
    (-half..=half)
        .map(|i| dir + i as f64 / half.max(1) as f64 * spread)
        .collect()
}

/// Generate the plume points
pub fn simulate(params: &PlumeParams) -> Vec<MeasurementPoint> {
    let spread = spread_deg(params.wind_speed);
    let sigma = spread / 2.0;
    let radius = plume_radius_m(params.wind_speed);
    let step = params.step_m.max(1);
    let src = params.source;

    let mut points = Vec::new();
    for angle in ray_angles(params.wind_dir_deg, params.num_rays, spread) {
        let theta = angle.to_radians();
        let offset = (angle - params.wind_dir_deg).abs();
        let lateral = (-(offset * offset) / (2.0 * sigma * sigma + 1e-6)).exp();

        for d in (step..=params.max_distance_m).step_by(step as usize) {
            let d = d as f64;
            let w = (-(d / 1000.0) / DECAY_KM).exp() * lateral;
            let pm25 = round_to(params.pm25 * w, 2);
            let lat = src.lat + d * theta.cos() / METERS_PER_DEG_LAT;
            let lng = src.lng + d * theta.sin() / meters_per_deg_lng(src.lat);
            points.push(MeasurementPoint {
                pm10: Some(round_to(params.pm10 * w, 2)),
                no2: Some(round_to(params.no2 * w, 2)),
                so2: Some(round_to(params.so2 * w, 2)),
                co: Some(round_to(params.co * w, 3)),
                distance_m: d,
                ..MeasurementPoint::new(lat, lng, Some(pm25), radius)
            });
        }
    }
    points
}

/// Provider that regenerates the plume on every fetch
#[derive(Clone, Debug, Default)]
pub struct PlumeProvider {
    pub params: PlumeParams,
}

impl PlumeProvider {
    pub fn new(params: PlumeParams) -> Self {
        Self { params }
    }
}

impl DataProvider for PlumeProvider {
    fn fetch(&mut self) -> Result<Snapshot, ProviderError> {
        let points = simulate(&self.params);
        debug!(
            points = points.len(),
            speed = self.params.wind_speed,
            dir = self.params.wind_dir_deg,
            "Plume generated"
        );
        Ok(Snapshot {
            points,
            wind: WindVector::new(self.params.wind_speed, self.params.wind_dir_deg),
        })
    }
}
