//! Density-kernel heat layer

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{DrivenPoint, LayerSlot};
use crate::core::data::{GeoPoint, PixelPoint, Severity};
use crate::core::map::{HeatLayer, MapHost, MapLayer};
use crate::core::raster::{sample_stops, GradientStop, Raster};

/// Fixed kernel geometry, in pixels so it does not change with zoom
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatSettings {
    pub radius_px: f32,
    pub blur_px: f32,
    pub max: f64,
}

impl Default for HeatSettings {
    fn default() -> Self {
        Self { radius_px: 180.0, blur_px: 95.0, max: 1.2 }
    }
}

/// Severity palette keyed by intensity
pub fn heat_gradient() -> Vec<GradientStop> {
    Severity::ALL
        .iter()
        .enumerate()
        .map(|(i, s)| GradientStop::new(i as f32 * 0.25, s.rgb().with_alpha(1.0)))
        .collect()
}

#[derive(Debug)]
pub struct HeatKernel {
    settings: HeatSettings,
    pub(super) layer: LayerSlot,
    attached: bool,
}

impl HeatKernel {
    pub fn new(settings: HeatSettings) -> Self {
        Self { settings, layer: LayerSlot::default(), attached: false }
    }

    pub(super) fn is_attached(&self) -> bool {
        self.attached
    }

    /// The layer itself is created on the first non-empty frame
    pub(super) fn attach(&mut self) {
        self.attached = true;
    }

    pub(super) fn detach(&mut self, map: &mut dyn MapHost) {
        self.layer.release(map);
        self.attached = false;
    }

    /// Drops the previous layer and builds a new one from scratch
    pub(super) fn render(&mut self, map: &mut dyn MapHost, points: &[DrivenPoint]) {
        if !self.attached {
            return;
        }
        self.layer.release(map);
        if points.is_empty() {
            return;
        }
        let layer = self.build(points);
        trace!(points = layer.points.len(), "Heat frame");
        self.layer.put(map, MapLayer::Heat(layer));
    }

    fn build(&self, points: &[DrivenPoint]) -> HeatLayer {
        HeatLayer {
            points: points
                .iter()
                .map(|p| (p.position.lat, p.position.lng, p.intensity))
                .collect(),
            radius_px: self.settings.radius_px,
            blur_px: self.settings.blur_px,
            max: self.settings.max,
            gradient: heat_gradient(),
        }
    }
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0).max(f32::EPSILON)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

impl HeatLayer {
    /// Rasterize the density field: each triple is a blurred disc of alpha
    /// `intensity / max`, accumulated source-over, then colorized by the
    /// accumulated alpha.
    pub fn paint(&self, project: impl Fn(GeoPoint) -> PixelPoint, raster: &mut Raster) {
        let (w, h) = (raster.width(), raster.height());
        if w == 0 || h == 0 || self.points.is_empty() {
            return;
        }
        let max = if self.max > 0.0 { self.max } else { 1.0 };
        let inner = (self.radius_px - self.blur_px).max(0.0);
        let outer = self.radius_px + self.blur_px;
        let mut acc = vec![0.0f32; w as usize * h as usize];

        for &(lat, lng, weight) in &self.points {
            let alpha = (weight / max).clamp(0.0, 1.0) as f32;
            let c = project(GeoPoint::new(lat, lng));
            if alpha <= 0.0 || !c.x.is_finite() || !c.y.is_finite() {
                continue;
            }
            let x0 = (c.x - outer).floor().max(0.0) as u32;
            let y0 = (c.y - outer).floor().max(0.0) as u32;
            let x1 = (c.x + outer).ceil().min(w as f32 - 1.0);
            let y1 = (c.y + outer).ceil().min(h as f32 - 1.0);
            if x1 < 0.0 || y1 < 0.0 {
                continue;
            }
            for y in y0..=y1 as u32 {
                let dy = y as f32 + 0.5 - c.y;
                for x in x0..=x1 as u32 {
                    let dx = x as f32 + 0.5 - c.x;
                    let d = (dx * dx + dy * dy).sqrt();
                    let src = alpha * (1.0 - smoothstep(inner, outer, d));
                    if src <= 0.0 {
                        continue;
                    }
                    let dst = &mut acc[y as usize * w as usize + x as usize];
                    *dst = src + *dst * (1.0 - src);
                }
            }
        }

        for (i, &a) in acc.iter().enumerate() {
            if a <= 0.0 {
                continue;
            }
            let color = sample_stops(&self.gradient, a);
            let a = a * color.a;
            let (x, y) = (i as u32 % w, i as u32 / w);
            raster.blend_over(x, y, [color.r * a, color.g * a, color.b * a, a]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::Rgb;
    use crate::core::map::testing::RecordingMap;

    fn point(intensity: f64) -> DrivenPoint {
        DrivenPoint {
            index: 0,
            position: GeoPoint::new(40.232, 28.949),
            intensity,
            color: Rgb::new(0, 0, 0),
            radius: 220.0,
            pm25: None,
            pm10: None,
            distance_m: 0.0,
        }
    }

    #[test]
    fn gradient_follows_severity_palette() {
        let g = heat_gradient();
        assert_eq!(g.len(), 5);
        assert_eq!(g[0].offset, 0.0);
        assert_eq!(g[4].offset, 1.0);
        assert_eq!(g[2].color, Severity::UnhealthySensitive.rgb().with_alpha(1.0));
    }

    #[test]
    fn rebuilds_layer_every_frame() {
        let mut map = RecordingMap::new(64, 64);
        let mut k = HeatKernel::new(HeatSettings::default());
        k.attach();
        for _ in 0..3 {
            k.render(&mut map, &[point(0.5), point(0.9)]);
        }
        assert_eq!(map.added, 3);
        assert_eq!(map.removed, 2);
        assert_eq!(map.layers.len(), 1);
        let layer = match map.layers.values().next() {
            Some(MapLayer::Heat(l)) => l.clone(),
            _ => panic!("expected a heat layer"),
        };
        assert_eq!(layer.points[1], (40.232, 28.949, 0.9));
        assert_eq!(layer.radius_px, 180.0);
        assert_eq!(layer.max, 1.2);
    }

    #[test]
    fn empty_points_leave_no_layer() {
        let mut map = RecordingMap::new(64, 64);
        let mut k = HeatKernel::new(HeatSettings::default());
        k.attach();
        k.render(&mut map, &[point(0.5)]);
        k.render(&mut map, &[]);
        assert!(map.layers.is_empty());
        assert!(k.layer.id().is_none());
    }

    #[test]
    fn paint_is_densest_at_center() {
        let map = RecordingMap::new(200, 200);
        let layer = HeatKernel::new(HeatSettings { radius_px: 30.0, blur_px: 15.0, max: 1.0 })
            .build(&[point(1.0)]);
        let mut r = Raster::new(200, 200);
        layer.paint(|p| map.project(p), &mut r);
        let center = r.alpha_at(100, 100);
        assert!((center - 1.0).abs() < 1e-4);
        assert!(r.alpha_at(135, 100) < center);
        assert_eq!(r.alpha_at(0, 0), 0.0);
        // Full density maps to the last stop
        let px = r.pixel(100, 100).unwrap();
        let top = Severity::VeryUnhealthy.rgb().with_alpha(1.0);
        assert!((px[0] - top.r).abs() < 1e-3);
    }

    #[test]
    fn overlapping_points_accumulate() {
        let map = RecordingMap::new(100, 100);
        let settings = HeatSettings { radius_px: 20.0, blur_px: 10.0, max: 1.2 };
        let single = HeatKernel::new(settings).build(&[point(0.6)]);
        let double = HeatKernel::new(settings).build(&[point(0.6), point(0.6)]);
        let (mut a, mut b) = (Raster::new(100, 100), Raster::new(100, 100));
        single.paint(|p| map.project(p), &mut a);
        double.paint(|p| map.project(p), &mut b);
        assert!(b.alpha_at(50, 50) > a.alpha_at(50, 50));
        assert!((a.alpha_at(50, 50) - 0.5).abs() < 1e-4);
    }
}
