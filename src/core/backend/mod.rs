//! Render backends
//!
//! Four interchangeable strategies share one frame contract: `attach`,
//! `render`, `detach`. Exactly one is active at a time; the scene swaps
//! them by [`RenderMode`] without touching the clock.

mod cloud;
mod heat;
mod marker;
mod particle;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use cloud::{cloud_core_alpha, cloud_radius, CloudVolume, CLOUD_FADE};
pub use heat::{heat_gradient, HeatKernel, HeatSettings};
pub use marker::{marker_opacity, marker_scale, VectorMarker};
pub use particle::{particle_alpha, particle_radius, trail_fade, ParticleTrail};

use super::data::{GeoPoint, Rgb};
use super::map::{LayerId, MapHost, MapLayer};
use super::raster::Raster;

/// Active visualization
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Circles,
    Heatmap,
    Particles,
    #[default]
    Clouds,
}

impl RenderMode {
    pub const ALL: &'static [RenderMode] = &[
        RenderMode::Circles,
        RenderMode::Heatmap,
        RenderMode::Particles,
        RenderMode::Clouds,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Circles => "circles",
            RenderMode::Heatmap => "heatmap",
            RenderMode::Particles => "particles",
            RenderMode::Clouds => "clouds",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Circles => "Circles",
            RenderMode::Heatmap => "Heatmap",
            RenderMode::Particles => "Particles",
            RenderMode::Clouds => "Clouds",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenderMode::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown render mode '{s}'"))
    }
}

/// A measurement point after drift projection and normalization
#[derive(Clone, Debug, PartialEq)]
pub struct DrivenPoint {
    /// Position in the source point set (drives per-point phase)
    pub index: usize,
    pub position: GeoPoint,
    /// Normalized weight in [0.2, 1.0]
    pub intensity: f64,
    pub color: Rgb,
    /// Base radius from the measurement point
    pub radius: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub distance_m: f64,
}

/// Per-frame parameters beyond the points themselves
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameParams {
    pub tick: u32,
    /// Trail persistence, only read by the particle backend
    pub trail_length: f64,
}

/// The active render strategy
pub enum RenderBackend {
    VectorMarker(VectorMarker),
    HeatKernel(HeatKernel),
    ParticleTrail(ParticleTrail),
    CloudVolume(CloudVolume),
    /// Stand-in when the host cannot draw the requested mode
    Unavailable(RenderMode),
}

impl RenderBackend {
    /// Build the backend for `mode`, falling back to a no-op backend when the
    /// host lacks the capability it needs.
    pub fn for_mode(mode: RenderMode, map: &dyn MapHost, heat: HeatSettings) -> Self {
        match mode {
            RenderMode::Circles => RenderBackend::VectorMarker(VectorMarker::new()),
            RenderMode::Heatmap if map.supports_heat_layer() => {
                RenderBackend::HeatKernel(HeatKernel::new(heat))
            }
            RenderMode::Heatmap => {
                warn!("Heat layer unavailable on this map, heatmap mode draws nothing");
                RenderBackend::Unavailable(mode)
            }
            RenderMode::Particles => RenderBackend::ParticleTrail(ParticleTrail::new()),
            RenderMode::Clouds => RenderBackend::CloudVolume(CloudVolume::new()),
        }
    }

    pub fn mode(&self) -> RenderMode {
        match self {
            RenderBackend::VectorMarker(_) => RenderMode::Circles,
            RenderBackend::HeatKernel(_) => RenderMode::Heatmap,
            RenderBackend::ParticleTrail(_) => RenderMode::Particles,
            RenderBackend::CloudVolume(_) => RenderMode::Clouds,
            RenderBackend::Unavailable(mode) => *mode,
        }
    }

    /// Acquire drawing resources. Repeated calls are no-ops.
    pub fn attach(&mut self, map: &mut dyn MapHost) {
        if self.is_attached() {
            return;
        }
        match self {
            RenderBackend::VectorMarker(b) => b.attach(map),
            RenderBackend::HeatKernel(b) => b.attach(),
            RenderBackend::ParticleTrail(b) => b.surface.attach(map),
            RenderBackend::CloudVolume(b) => b.surface.attach(map),
            RenderBackend::Unavailable(_) => return,
        }
        info!(mode = %self.mode(), "Backend attached");
    }

    /// Release drawing resources. Safe on an already detached backend;
    /// release failures are logged, never propagated.
    pub fn detach(&mut self, map: &mut dyn MapHost) {
        if !self.is_attached() {
            return;
        }
        match self {
            RenderBackend::VectorMarker(b) => b.detach(map),
            RenderBackend::HeatKernel(b) => b.detach(map),
            RenderBackend::ParticleTrail(b) => b.surface.detach(),
            RenderBackend::CloudVolume(b) => b.surface.detach(),
            RenderBackend::Unavailable(_) => {}
        }
        info!(mode = %self.mode(), "Backend detached");
    }

    pub fn is_attached(&self) -> bool {
        match self {
            RenderBackend::VectorMarker(b) => b.is_attached(),
            RenderBackend::HeatKernel(b) => b.is_attached(),
            RenderBackend::ParticleTrail(b) => b.surface.is_attached(),
            RenderBackend::CloudVolume(b) => b.surface.is_attached(),
            RenderBackend::Unavailable(_) => false,
        }
    }

    /// Paint one frame. A detached backend draws nothing.
    pub fn render(&mut self, map: &mut dyn MapHost, points: &[DrivenPoint], params: FrameParams) {
        match self {
            RenderBackend::VectorMarker(b) => b.render(map, points, params.tick),
            RenderBackend::HeatKernel(b) => b.render(map, points),
            RenderBackend::ParticleTrail(b) => b.render(map, points, params.trail_length),
            RenderBackend::CloudVolume(b) => b.render(map, points, params.tick),
            RenderBackend::Unavailable(_) => {}
        }
    }

    /// Persistent raster surface, for the canvas backends
    pub fn surface(&self) -> Option<&Raster> {
        match self {
            RenderBackend::ParticleTrail(b) => b.surface.raster(),
            RenderBackend::CloudVolume(b) => b.surface.raster(),
            _ => None,
        }
    }

    /// Host layer currently holding this backend's output
    pub fn layer(&self) -> Option<LayerId> {
        match self {
            RenderBackend::VectorMarker(b) => b.layer.id(),
            RenderBackend::HeatKernel(b) => b.layer.id(),
            _ => None,
        }
    }
}

/// A host layer owned by a backend
#[derive(Debug, Default)]
pub(crate) struct LayerSlot {
    id: Option<LayerId>,
}

impl LayerSlot {
    pub(crate) fn id(&self) -> Option<LayerId> {
        self.id
    }

    /// Replace the layer contents, creating the layer on first use
    pub(crate) fn put(&mut self, map: &mut dyn MapHost, layer: MapLayer) {
        let kind = layer.kind();
        match self.id {
            Some(id) => {
                if let Err(e) = map.update_layer(id, layer) {
                    warn!(error = %e, %id, kind, "Layer update failed");
                }
            }
            None => match map.add_layer(layer) {
                Ok(id) => {
                    debug!(%id, kind, "Layer added");
                    self.id = Some(id);
                }
                Err(e) => warn!(error = %e, kind, "Layer add failed"),
            },
        }
    }

    /// Remove the layer if present. The handle is dropped even if removal fails.
    pub(crate) fn release(&mut self, map: &mut dyn MapHost) {
        if let Some(id) = self.id.take() {
            match map.remove_layer(id) {
                Ok(()) => debug!(%id, "Layer removed"),
                Err(e) => warn!(error = %e, %id, "Layer removal failed"),
            }
        }
    }
}

/// Persistent raster surface owned by a canvas backend
#[derive(Debug, Default)]
pub(crate) struct SurfaceSlot {
    raster: Option<Raster>,
}

impl SurfaceSlot {
    pub(crate) fn attach(&mut self, map: &dyn MapHost) {
        let (w, h) = map.viewport_size();
        self.raster = Some(Raster::new(w, h));
    }

    pub(crate) fn detach(&mut self) {
        self.raster = None;
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.raster.is_some()
    }

    pub(crate) fn raster(&self) -> Option<&Raster> {
        self.raster.as_ref()
    }

    /// Surface sized to the current viewport, None when detached
    pub(crate) fn prepare(&mut self, map: &dyn MapHost) -> Option<&mut Raster> {
        let raster = self.raster.as_mut()?;
        let (w, h) = map.viewport_size();
        if raster.resize(w, h) {
            debug!(width = w, height = h, "Surface resized");
        }
        Some(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::map::testing::RecordingMap;

    fn driven(n: usize) -> Vec<DrivenPoint> {
        (0..n)
            .map(|i| DrivenPoint {
                index: i,
                position: GeoPoint::new(40.232 + i as f64 * 0.001, 28.949),
                intensity: 0.6,
                color: Rgb::new(0xe7, 0x4c, 0x3c),
                radius: 220.0,
                pm25: Some(40.0),
                pm10: None,
                distance_m: 0.0,
            })
            .collect()
    }

    const PARAMS: FrameParams = FrameParams { tick: 10, trail_length: 80.0 };

    #[test]
    fn mode_parse_roundtrip() {
        for &m in RenderMode::ALL {
            assert_eq!(m.as_str().parse::<RenderMode>(), Ok(m));
        }
        assert_eq!(" Heatmap ".parse::<RenderMode>(), Ok(RenderMode::Heatmap));
        assert!("smoke".parse::<RenderMode>().is_err());
        assert_eq!(RenderMode::default(), RenderMode::Clouds);
    }

    #[test]
    fn attach_and_detach_are_idempotent() {
        let mut map = RecordingMap::new(64, 64);
        for &mode in RenderMode::ALL {
            let mut b = RenderBackend::for_mode(mode, &map, HeatSettings::default());
            b.attach(&mut map);
            b.attach(&mut map);
            assert!(b.is_attached(), "{mode}");
            b.render(&mut map, &driven(3), PARAMS);
            b.detach(&mut map);
            b.detach(&mut map);
            assert!(!b.is_attached(), "{mode}");
            assert!(map.layers.is_empty(), "{mode} leaked a layer");
        }
        assert_eq!(map.added, map.removed);
    }

    #[test]
    fn marker_layer_added_once() {
        let mut map = RecordingMap::new(64, 64);
        let mut b = RenderBackend::for_mode(RenderMode::Circles, &map, HeatSettings::default());
        b.attach(&mut map);
        b.attach(&mut map);
        assert_eq!(map.added, 1);
        for tick in 0..5 {
            b.render(&mut map, &driven(2), FrameParams { tick, ..PARAMS });
        }
        assert_eq!(map.added, 1);
        assert_eq!(map.updated, 5);
    }

    #[test]
    fn heat_falls_back_when_unsupported() {
        let mut map = RecordingMap::new(64, 64);
        map.heat_supported = false;
        let mut b = RenderBackend::for_mode(RenderMode::Heatmap, &map, HeatSettings::default());
        assert!(matches!(b, RenderBackend::Unavailable(RenderMode::Heatmap)));
        assert_eq!(b.mode(), RenderMode::Heatmap);
        b.attach(&mut map);
        b.render(&mut map, &driven(3), PARAMS);
        b.detach(&mut map);
        assert!(map.layers.is_empty());
        assert!(b.surface().is_none());
    }

    #[test]
    fn removal_failure_is_swallowed() {
        let mut map = RecordingMap::new(64, 64);
        let mut b = RenderBackend::for_mode(RenderMode::Circles, &map, HeatSettings::default());
        b.attach(&mut map);
        map.fail_removals = true;
        b.detach(&mut map);
        assert!(!b.is_attached());
        assert!(b.layer().is_none());
        b.detach(&mut map);
    }

    #[test]
    fn detached_backend_draws_nothing() {
        let mut map = RecordingMap::new(32, 32);
        let mut b = RenderBackend::for_mode(RenderMode::Particles, &map, HeatSettings::default());
        b.render(&mut map, &driven(2), PARAMS);
        assert!(b.surface().is_none());
        let mut b = RenderBackend::for_mode(RenderMode::Circles, &map, HeatSettings::default());
        b.render(&mut map, &driven(2), PARAMS);
        assert_eq!(map.added, 0);
    }
}
