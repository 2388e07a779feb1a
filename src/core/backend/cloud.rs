//! Soft volumetric blobs on a slowly eroding surface

use super::{DrivenPoint, SurfaceSlot};
use crate::core::map::MapHost;
use crate::core::raster::{GradientStop, Rgba};

/// Per-frame erosion, lower than any particle fade
pub const CLOUD_FADE: f32 = 0.08;

const DEFAULT_PM25: f64 = 20.0;
const MIN_BASE_RADIUS: f64 = 80.0;
const INNER_RATIO: f32 = 0.2;

/// Alpha at the blob core
#[inline]
pub fn cloud_core_alpha(pm25: Option<f64>) -> f32 {
    let pm = pm25.filter(|v| v.is_finite()).unwrap_or(DEFAULT_PM25);
    (0.4 + pm / 40.0).clamp(0.0, 0.95) as f32
}

/// Breathing blob radius in pixels
#[inline]
pub fn cloud_radius(base_radius: f64, index: usize, tick: u32) -> f32 {
    let phase = (index as f64 * 13.0 + tick as f64) / 28.0;
    (base_radius.max(MIN_BASE_RADIUS) * (0.9 + 0.25 * phase.sin())) as f32
}

fn blob_stops(alpha: f32) -> [GradientStop; 4] {
    let black = |a: f32| Rgba::new(0.0, 0.0, 0.0, a);
    [
        GradientStop::new(0.0, black(alpha)),
        GradientStop::new(0.45, black((alpha * 0.9).min(0.9))),
        GradientStop::new(0.8, black(alpha * 0.45)),
        GradientStop::new(1.0, black(0.0)),
    ]
}

#[derive(Debug, Default)]
pub struct CloudVolume {
    pub(super) surface: SurfaceSlot,
}

impl CloudVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn render(&mut self, map: &mut dyn MapHost, points: &[DrivenPoint], tick: u32) {
        let Some(raster) = self.surface.prepare(map) else {
            return;
        };
        if points.is_empty() {
            raster.clear();
            return;
        }
        raster.erase(CLOUD_FADE);
        for p in points {
            let r = cloud_radius(p.radius, p.index, tick);
            let stops = blob_stops(cloud_core_alpha(p.pm25));
            raster.fill_radial_gradient(map.project(p.position), r * INNER_RATIO, r, &stops);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{GeoPoint, Rgb};
    use crate::core::map::testing::RecordingMap;
    use rstest::rstest;

    #[rstest]
    #[case(None, 0.9)]
    #[case(Some(0.0), 0.4)]
    #[case(Some(10.0), 0.65)]
    #[case(Some(300.0), 0.95)]
    #[case(Some(-100.0), 0.0)]
    fn core_alpha(#[case] pm25: Option<f64>, #[case] expected: f32) {
        assert!((cloud_core_alpha(pm25) - expected).abs() < 1e-6);
    }

    #[test]
    fn radius_breathes_within_bounds() {
        for tick in 0..400 {
            let r = cloud_radius(40.0, 3, tick);
            assert!((80.0 * 0.65 - 1e-3..=80.0 * 1.15 + 1e-3).contains(&r));
        }
        assert!((cloud_radius(220.0, 0, 0) - 198.0).abs() < 1e-3);
    }

    #[test]
    fn stop_alphas() {
        let s = blob_stops(0.95);
        assert!((s[1].color.a - 0.855).abs() < 1e-6);
        assert!((s[2].color.a - 0.4275).abs() < 1e-6);
        assert_eq!(s[3].color.a, 0.0);
        assert_eq!(s[0].color.r, 0.0);
    }

    #[test]
    fn blob_core_then_erosion() {
        let mut map = RecordingMap::new(300, 300);
        let mut c = CloudVolume::new();
        c.surface.attach(&map);
        let p = DrivenPoint {
            index: 0,
            position: GeoPoint::new(40.232, 28.949),
            intensity: 0.5,
            color: Rgb::new(1, 2, 3),
            radius: 220.0,
            pm25: Some(10.0),
            pm10: None,
            distance_m: 0.0,
        };
        c.render(&mut map, std::slice::from_ref(&p), 0);
        let core = c.surface.raster().unwrap().alpha_at(150, 150);
        assert!((core - 0.65).abs() < 1e-4);

        map.origin = GeoPoint::new(0.0, 0.0);
        c.render(&mut map, std::slice::from_ref(&p), 1);
        let after = c.surface.raster().unwrap().alpha_at(150, 150);
        assert!((after - core * (1.0 - CLOUD_FADE)).abs() < 1e-4);
    }
}
