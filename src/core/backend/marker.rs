//! Pulsing circle markers handed to the host map as a vector layer

use tracing::trace;

use super::{DrivenPoint, LayerSlot};
use crate::core::data::GeoPoint;
use crate::core::drift::METERS_PER_DEG_LAT;
use crate::core::intensity::phase_sin;
use crate::core::map::{MapHost, MapLayer, Marker};
use crate::core::raster::Raster;

const MIN_OPACITY: f32 = 0.25;
const MAX_OPACITY: f32 = 0.40;

/// Radius pulse factor in [0.6, 1.1]
#[inline]
pub fn marker_scale(tick: u32, index: usize) -> f64 {
    0.85 + 0.25 * phase_sin(tick, index)
}

/// Fill opacity for a pulse factor: 0.25 at rest, 0.40 at the peak,
/// floored at 0.25 while the marker contracts
#[inline]
pub fn marker_opacity(scale: f64) -> f32 {
    let swing = ((scale - 0.85) / 0.25) as f32;
    (MIN_OPACITY + (MAX_OPACITY - MIN_OPACITY) * swing).clamp(MIN_OPACITY, MAX_OPACITY)
}

#[derive(Debug, Default)]
pub struct VectorMarker {
    pub(super) layer: LayerSlot,
    attached: bool,
}

impl VectorMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn is_attached(&self) -> bool {
        self.attached
    }

    pub(super) fn attach(&mut self, map: &mut dyn MapHost) {
        self.layer.put(map, MapLayer::Markers(Vec::new()));
        self.attached = true;
    }

    pub(super) fn detach(&mut self, map: &mut dyn MapHost) {
        self.layer.release(map);
        self.attached = false;
    }

    pub(super) fn render(&mut self, map: &mut dyn MapHost, points: &[DrivenPoint], tick: u32) {
        if !self.attached {
            return;
        }
        let markers: Vec<Marker> = points.iter().map(|p| build_marker(p, tick)).collect();
        trace!(tick, markers = markers.len(), "Marker frame");
        self.layer.put(map, MapLayer::Markers(markers));
    }
}

fn build_marker(p: &DrivenPoint, tick: u32) -> Marker {
    let scale = marker_scale(tick, p.index);
    Marker {
        center: p.position,
        radius_m: p.radius * scale,
        color: p.color,
        fill_opacity: marker_opacity(scale),
        pm25: p.pm25,
        pm10: p.pm10,
        distance_m: p.distance_m,
    }
}

impl Marker {
    /// On-screen radius, measured along the meridian through the center
    pub fn pixel_radius(&self, map: &dyn MapHost) -> f32 {
        let center = map.project(self.center);
        let edge = map.project(GeoPoint::new(
            self.center.lat + self.radius_m / METERS_PER_DEG_LAT,
            self.center.lng,
        ));
        (edge.y - center.y).hypot(edge.x - center.x)
    }

    /// Rasterize into `raster` (headless export)
    pub fn paint(&self, map: &dyn MapHost, raster: &mut Raster) {
        let radius = self.pixel_radius(map);
        raster.fill_circle(
            map.project(self.center),
            radius,
            self.color.with_alpha(self.fill_opacity),
        );
    }
}
