//! Downwind drift projection
//!
//! Each point advances `stepM` meters per tick along the wind vector and
//! snaps back to its origin every [`DRIFT_CYCLE`] ticks. The sawtooth keeps
//! points on screen while still reading as continuous flow.

use super::data::{GeoPoint, WindVector};

/// Ticks per drift loop
pub const DRIFT_CYCLE: u32 = 100;

/// Meters per degree of latitude (and of longitude at the equator)
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Meters advanced per tick for a wind speed and flow multiplier
#[inline]
pub fn step_meters(wind: &WindVector, flow_speed: f64) -> f64 {
    (2.0 + wind.speed_mps * 0.5) * flow_speed
}

/// Meters per degree of longitude at a latitude
#[inline]
pub fn meters_per_deg_lng(lat: f64) -> f64 {
    METERS_PER_DEG_LAT * lat.to_radians().cos()
}

/// Drift displacement in degrees `(d_lat, d_lng)` at `tick`
pub fn drift_offset(origin: GeoPoint, wind: &WindVector, tick: u32, flow_speed: f64) -> (f64, f64) {
    let step = step_meters(wind, flow_speed);
    let cycles = (tick % DRIFT_CYCLE) as f64;
    let dir = wind.direction_rad();
    let dy = step * dir.cos();
    let dx = step * dir.sin();
    (
        dy / METERS_PER_DEG_LAT * cycles,
        dx / meters_per_deg_lng(origin.lat) * cycles,
    )
}

/// Position of `origin` after drifting for `tick` ticks
pub fn project(origin: GeoPoint, wind: &WindVector, tick: u32, flow_speed: f64) -> GeoPoint {
    let (d_lat, d_lng) = drift_offset(origin, wind, tick, flow_speed);
    GeoPoint::new(origin.lat + d_lat, origin.lng + d_lng)
}
