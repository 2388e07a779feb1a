//! Scene configuration

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::backend::{HeatSettings, RenderMode};

pub const DEFAULT_FLOW_SPEED: f64 = 0.6;
pub const DEFAULT_TRAIL_LENGTH: f64 = 140.0;
pub const MAX_TRAIL_LENGTH: f64 = 1000.0;

/// Flow speed used in place of a zero or invalid value
pub const FALLBACK_FLOW_SPEED: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub mode: RenderMode,
    pub flow_speed: f64,
    pub trail_length: f64,
    pub playing: bool,
    pub heat: HeatSettings,
    /// Marker radius for station points, meters
    pub default_base_radius_m: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            flow_speed: DEFAULT_FLOW_SPEED,
            trail_length: DEFAULT_TRAIL_LENGTH,
            playing: true,
            heat: HeatSettings::default(),
            default_base_radius_m: 220.0,
        }
    }
}

impl SceneConfig {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::sanitized)
    }

    pub fn sanitized(mut self) -> Self {
        self.flow_speed = sanitize_flow_speed(self.flow_speed);
        self.trail_length = sanitize_trail_length(self.trail_length);
        if !(self.default_base_radius_m.is_finite() && self.default_base_radius_m > 0.0) {
            self.default_base_radius_m = Self::default().default_base_radius_m;
        }
        let heat = HeatSettings::default();
        if !(self.heat.max.is_finite() && self.heat.max > 0.0) {
            self.heat.max = heat.max;
        }
        if !(self.heat.radius_px.is_finite() && self.heat.radius_px > 0.0) {
            self.heat.radius_px = heat.radius_px;
        }
        if !(self.heat.blur_px.is_finite() && self.heat.blur_px >= 0.0) {
            self.heat.blur_px = heat.blur_px;
        }
        self
    }
}

pub fn sanitize_flow_speed(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        warn!(value = v, fallback = FALLBACK_FLOW_SPEED, "Invalid flow speed");
        FALLBACK_FLOW_SPEED
    }
}

pub fn sanitize_trail_length(v: f64) -> f64 {
    if v.is_nan() {
        warn!(fallback = DEFAULT_TRAIL_LENGTH, "Invalid trail length");
        return DEFAULT_TRAIL_LENGTH;
    }
    v.clamp(0.0, MAX_TRAIL_LENGTH)
}
