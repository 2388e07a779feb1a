//! Fading particle trails on a persistent surface

use super::{DrivenPoint, SurfaceSlot};
use crate::core::map::MapHost;

/// Per-frame erosion for a trail length; longer trails fade slower
#[inline]
pub fn trail_fade(trail_length: f64) -> f32 {
    (0.22 - trail_length / 1000.0).clamp(0.04, 0.22) as f32
}

#[inline]
pub fn particle_alpha(pm25: Option<f64>) -> f32 {
    let pm = pm25.filter(|v| v.is_finite()).unwrap_or(0.0);
    (pm / 100.0).clamp(0.2, 0.9) as f32
}

#[inline]
pub fn particle_radius(base_radius: f64) -> f32 {
    (base_radius / 40.0).max(2.0) as f32
}

#[derive(Debug, Default)]
pub struct ParticleTrail {
    pub(super) surface: SurfaceSlot,
}

impl ParticleTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn render(&mut self, map: &mut dyn MapHost, points: &[DrivenPoint], trail_length: f64) {
        let Some(raster) = self.surface.prepare(map) else {
            return;
        };
        if points.is_empty() {
            raster.clear();
            return;
        }
        raster.erase(trail_fade(trail_length));
        for p in points {
            raster.fill_circle(
                map.project(p.position),
                particle_radius(p.radius),
                p.color.with_alpha(particle_alpha(p.pm25)),
            );
        }
    }
}
