//! Scene controller
//!
//! Owns the animation state, the active backend and the current snapshot.
//! Every frame flows one way: tick → drift → intensity → backend.

use tracing::{debug, info, warn};

use super::backend::{DrivenPoint, FrameParams, RenderBackend, RenderMode};
use super::clock::{AnimationClock, FrameScheduler};
use super::config::{sanitize_flow_speed, sanitize_trail_length, SceneConfig};
use super::data::{MeasurementPoint, WindVector};
use super::map::{LayerId, MapHost};
use super::raster::Raster;
use super::{drift, intensity};
use crate::provider::{DataProvider, ProviderError};

/// Read-only view of the animation state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationState {
    pub tick: u32,
    pub playing: bool,
    pub flow_speed: f64,
    pub trail_length: f64,
}

pub struct DispersionScene {
    config: SceneConfig,
    clock: AnimationClock,
    playing: bool,
    /// None until the scene is attached to a map
    backend: Option<RenderBackend>,
    points: Vec<MeasurementPoint>,
    wind: WindVector,
}

impl DispersionScene {
    pub fn new(config: SceneConfig) -> Self {
        let config = config.sanitized();
        Self {
            playing: config.playing,
            config,
            clock: AnimationClock::new(),
            backend: None,
            points: Vec::new(),
            wind: WindVector::default(),
        }
    }

    /// Build and attach the configured backend, start the clock if playing
    pub fn attach(&mut self, map: &mut dyn MapHost, sched: &mut dyn FrameScheduler) {
        if self.backend.is_none() {
            self.backend = Some(RenderBackend::for_mode(self.config.mode, &*map, self.config.heat));
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.attach(map);
        }
        if self.playing {
            self.clock.start(sched);
        }
        info!(mode = %self.config.mode, playing = self.playing, "Scene attached");
    }

    /// Release the backend and stop the clock. Safe to repeat.
    pub fn detach(&mut self, map: &mut dyn MapHost, sched: &mut dyn FrameScheduler) {
        self.clock.stop(sched);
        if let Some(mut backend) = self.backend.take() {
            backend.detach(map);
            info!(mode = %backend.mode(), "Scene detached");
        }
    }

    /// Replace points and wind wholesale
    pub fn set_snapshot(&mut self, points: Vec<MeasurementPoint>, wind: Option<WindVector>) {
        self.wind = WindVector::resolve(wind);
        self.points = points;
        debug!(
            points = self.points.len(),
            speed = self.wind.speed_mps,
            dir = self.wind.direction_deg,
            "Snapshot replaced"
        );
    }

    /// Pull a new snapshot. On failure the previous snapshot stays.
    pub fn refresh(&mut self, provider: &mut dyn DataProvider) -> Result<(), ProviderError> {
        match provider.fetch() {
            Ok(snap) => {
                self.set_snapshot(snap.points, snap.wind);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Swap backends. The clock keeps running; same mode is a no-op.
    pub fn set_mode(&mut self, mode: RenderMode, map: &mut dyn MapHost) {
        if mode == self.mode() {
            return;
        }
        let prev = self.mode();
        self.config.mode = mode;
        if let Some(backend) = self.backend.as_mut() {
            backend.detach(map);
            let mut next = RenderBackend::for_mode(mode, map, self.config.heat);
            next.attach(map);
            *backend = next;
        }
        info!(from = %prev, to = %mode, tick = self.clock.tick(), "Render mode changed");
    }

    pub fn set_flow_speed(&mut self, v: f64) {
        self.config.flow_speed = sanitize_flow_speed(v);
    }

    pub fn set_trail_length(&mut self, v: f64) {
        self.config.trail_length = sanitize_trail_length(v);
    }

    pub fn toggle_play(&mut self, sched: &mut dyn FrameScheduler) {
        self.set_playing(!self.playing, sched);
    }

    pub fn set_playing(&mut self, playing: bool, sched: &mut dyn FrameScheduler) {
        self.playing = playing;
        if self.backend.is_none() {
            return;
        }
        if playing {
            self.clock.start(sched);
        } else {
            self.clock.stop(sched);
        }
    }

    /// Jump to `tick` and pause so the clock does not overwrite it
    pub fn seek(&mut self, tick: u32, sched: &mut dyn FrameScheduler) {
        self.set_playing(false, sched);
        self.clock.seek(tick);
        debug!(tick = self.clock.tick(), "Seek");
    }

    /// Scheduler callback, `ts` in seconds. Returns the ticks advanced.
    pub fn on_frame(&mut self, ts: f64, sched: &mut dyn FrameScheduler) -> u32 {
        self.clock.on_frame(ts, self.config.flow_speed, sched)
    }

    /// Paint the current tick through the active backend
    pub fn render(&mut self, map: &mut dyn MapHost) {
        let driven = self.driven_points();
        let params = FrameParams {
            tick: self.clock.tick(),
            trail_length: self.config.trail_length,
        };
        if let Some(backend) = self.backend.as_mut() {
            backend.render(map, &driven, params);
        }
    }

    /// Drifted and normalized points for the current tick
    pub fn driven_points(&self) -> Vec<DrivenPoint> {
        let tick = self.clock.tick();
        let flow = self.config.flow_speed;
        let intensities = intensity::normalize(&self.points, tick);
        self.points
            .iter()
            .zip(intensities)
            .enumerate()
            .map(|(index, (p, w))| DrivenPoint {
                index,
                position: drift::project(p.position(), &self.wind, tick, flow),
                intensity: w,
                color: p.rgb(),
                radius: if p.base_radius.is_finite() && p.base_radius > 0.0 {
                    p.base_radius
                } else {
                    self.config.default_base_radius_m
                },
                pm25: p.pm25,
                pm10: p.pm10,
                distance_m: p.distance_m,
            })
            .collect()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn tick(&self) -> u32 {
        self.clock.tick()
    }

    #[inline]
    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn mode(&self) -> RenderMode {
        self.backend.as_ref().map_or(self.config.mode, RenderBackend::mode)
    }

    pub fn state(&self) -> AnimationState {
        AnimationState {
            tick: self.clock.tick(),
            playing: self.playing,
            flow_speed: self.config.flow_speed,
            trail_length: self.config.trail_length,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn wind(&self) -> WindVector {
        self.wind
    }

    pub fn points(&self) -> &[MeasurementPoint] {
        &self.points
    }

    pub fn is_attached(&self) -> bool {
        self.backend.as_ref().is_some_and(RenderBackend::is_attached)
    }

    /// Raster surface of a canvas backend
    pub fn surface(&self) -> Option<&Raster> {
        self.backend.as_ref()?.surface()
    }

    /// Host layer of a marker or heat backend
    pub fn layer(&self) -> Option<LayerId> {
        self.backend.as_ref()?.layer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::testing::ManualScheduler;
    use crate::core::map::testing::RecordingMap;
    use crate::core::map::MapLayer;
    use crate::provider::PlumeProvider;

    fn stations() -> Vec<MeasurementPoint> {
        vec![
            MeasurementPoint::new(40.232, 28.949, Some(12.0), 220.0),
            MeasurementPoint::new(40.235, 28.952, Some(48.0), 220.0),
        ]
    }

    fn attached(mode: RenderMode) -> (DispersionScene, RecordingMap, ManualScheduler) {
        let mut map = RecordingMap::new(120, 120);
        let mut sched = ManualScheduler::default();
        let mut scene = DispersionScene::new(SceneConfig { mode, ..Default::default() });
        scene.set_snapshot(stations(), None);
        scene.attach(&mut map, &mut sched);
        (scene, map, sched)
    }

    #[test]
    fn test_attach_starts_clock() {
        let (mut scene, mut map, mut sched) = attached(RenderMode::Clouds);
        assert!(scene.playing());
        assert!(sched.pending);
        scene.on_frame(0.0, &mut sched);
        scene.render(&mut map);
        assert_eq!(scene.tick(), 1);
        assert!(!scene.surface().unwrap().is_clear());
    }

    #[test]
    fn test_mode_switch_keeps_clock() {
        let (mut scene, mut map, mut sched) = attached(RenderMode::Particles);
        scene.set_flow_speed(1.0);
        scene.on_frame(0.0, &mut sched);
        scene.on_frame(1.0, &mut sched);
        let tick = scene.tick();
        scene.set_mode(RenderMode::Circles, &mut map);
        assert_eq!(scene.tick(), tick);
        assert!(scene.playing());
        assert!(scene.surface().is_none());
        scene.render(&mut map);
        assert!(scene.layer().is_some());
        scene.on_frame(1.5, &mut sched);
        assert_eq!(scene.tick(), tick + 5);
    }

    #[test]
    fn test_same_mode_twice_is_noop() {
        let (mut scene, mut map, _) = attached(RenderMode::Circles);
        let layer = scene.layer();
        scene.set_mode(RenderMode::Circles, &mut map);
        scene.set_mode(RenderMode::Circles, &mut map);
        assert_eq!(map.added, 1);
        assert_eq!(scene.layer(), layer);
    }

    #[test]
    fn test_switching_releases_previous_layer() {
        let (mut scene, mut map, _) = attached(RenderMode::Circles);
        scene.render(&mut map);
        scene.set_mode(RenderMode::Heatmap, &mut map);
        scene.render(&mut map);
        assert_eq!(map.layers.len(), 1);
        assert!(matches!(map.layers.values().next(), Some(MapLayer::Heat(_))));
        scene.set_mode(RenderMode::Clouds, &mut map);
        assert!(map.layers.is_empty());
    }

    #[test]
    fn test_seek_pauses() {
        let (mut scene, _, mut sched) = attached(RenderMode::Clouds);
        scene.seek(1500, &mut sched);
        assert!(!scene.playing());
        assert!(!sched.pending);
        assert_eq!(scene.on_frame(10.0, &mut sched), 0);
        assert_eq!(scene.tick(), 1500);
        scene.toggle_play(&mut sched);
        assert!(scene.playing());
        assert_eq!(scene.on_frame(20.0, &mut sched), 1);
        assert_eq!(scene.tick(), 1501);
    }

    #[test]
    fn test_controls_are_sanitized() {
        let mut scene = DispersionScene::new(SceneConfig::default());
        scene.set_flow_speed(-2.0);
        scene.set_trail_length(9000.0);
        let s = scene.state();
        assert_eq!(s.flow_speed, 1.0);
        assert_eq!(s.trail_length, 1000.0);
        scene.set_flow_speed(1.4);
        assert_eq!(scene.state().flow_speed, 1.4);
    }

    #[test]
    fn test_missing_wind_uses_default() {
        let mut scene = DispersionScene::new(SceneConfig::default());
        scene.set_snapshot(stations(), WindVector::new(-1.0, 10.0));
        assert_eq!(scene.wind(), WindVector::default());
    }

    #[test]
    fn test_empty_heatmap_clears() {
        let (mut scene, mut map, _) = attached(RenderMode::Heatmap);
        scene.render(&mut map);
        assert_eq!(map.layers.len(), 1);
        scene.set_snapshot(Vec::new(), None);
        scene.render(&mut map);
        assert!(map.layers.is_empty());
        assert!(scene.layer().is_none());
    }

    #[test]
    fn test_driven_points_follow_tick() {
        let (mut scene, _, mut sched) = attached(RenderMode::Clouds);
        scene.seek(50, &mut sched);
        let driven = scene.driven_points();
        assert_eq!(driven.len(), 2);
        let d_lat = driven[0].position.lat - 40.232;
        assert!((d_lat - 3.5 * 45f64.to_radians().cos() / 111_320.0 * 50.0 * 0.6).abs() < 1e-12);
        assert!(driven.iter().all(|p| (0.2..=1.0).contains(&p.intensity)));
        // Drift repeats every 100 ticks
        scene.seek(150, &mut sched);
        let again: Vec<_> = scene.driven_points().iter().map(|p| p.position).collect();
        let first: Vec<_> = driven.iter().map(|p| p.position).collect();
        assert_eq!(again, first);
    }

    #[test]
    fn test_refresh_from_provider() {
        let mut scene = DispersionScene::new(SceneConfig::default());
        scene.refresh(&mut PlumeProvider::default()).unwrap();
        assert_eq!(scene.points().len(), 90);
        assert_eq!(scene.wind(), WindVector::default());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let (mut scene, mut map, mut sched) = attached(RenderMode::Circles);
        scene.detach(&mut map, &mut sched);
        scene.detach(&mut map, &mut sched);
        assert!(!scene.is_attached());
        assert!(map.layers.is_empty());
        assert!(!sched.pending);
        // Mode still reported from config
        assert_eq!(scene.mode(), RenderMode::Circles);
    }
}
