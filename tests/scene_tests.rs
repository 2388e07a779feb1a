//! End-to-end scene tests through the public API: provider → scene →
//! backend → host map, driven by a hand-cranked scheduler.

use std::collections::BTreeMap;

use plume_vis::core::map::{LayerId, MapError, MapHost, MapLayer};
use plume_vis::core::{
    DispersionScene, FrameScheduler, GeoPoint, MeasurementPoint, PixelPoint, RenderMode,
    SceneConfig, WindVector, DEFAULT_CENTER, TICK_MODULUS,
};
use plume_vis::provider::{DataProvider, PlumeProvider, ProviderError, Snapshot, StationFeed};

// ============================================================================
// Test hosts
// ============================================================================

struct FlatMap {
    layers: BTreeMap<u64, MapLayer>,
    next_id: u64,
    heat: bool,
}

impl FlatMap {
    fn new() -> Self {
        Self {
            layers: BTreeMap::new(),
            next_id: 1,
            heat: true,
        }
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.layers.values().map(MapLayer::kind).collect()
    }
}

impl MapHost for FlatMap {
    fn project(&self, pos: GeoPoint) -> PixelPoint {
        PixelPoint::new(
            (160.0 + (pos.lng - DEFAULT_CENTER.lng) * 10_000.0) as f32,
            (120.0 - (pos.lat - DEFAULT_CENTER.lat) * 10_000.0) as f32,
        )
    }

    fn viewport_size(&self) -> (u32, u32) {
        (320, 240)
    }

    fn supports_heat_layer(&self) -> bool {
        self.heat
    }

    fn add_layer(&mut self, layer: MapLayer) -> Result<LayerId, MapError> {
        let id = self.next_id;
        self.next_id += 1;
        self.layers.insert(id, layer);
        Ok(LayerId(id))
    }

    fn update_layer(&mut self, id: LayerId, layer: MapLayer) -> Result<(), MapError> {
        let slot = self.layers.get_mut(&id.0).ok_or(MapError::LayerNotFound(id))?;
        *slot = layer;
        Ok(())
    }

    fn remove_layer(&mut self, id: LayerId) -> Result<(), MapError> {
        self.layers
            .remove(&id.0)
            .map(|_| ())
            .ok_or(MapError::LayerNotFound(id))
    }
}

#[derive(Default)]
struct Crank {
    pending: bool,
}

impl FrameScheduler for Crank {
    fn request_frame(&mut self) {
        self.pending = true;
    }

    fn cancel_frame(&mut self) {
        self.pending = false;
    }
}

struct Failing;

impl DataProvider for Failing {
    fn fetch(&mut self) -> Result<Snapshot, ProviderError> {
        Err(ProviderError::Empty)
    }
}

fn scene(mode: RenderMode) -> (DispersionScene, FlatMap, Crank) {
    let config = SceneConfig {
        mode,
        flow_speed: 1.0,
        ..SceneConfig::default()
    };
    let mut scene = DispersionScene::new(config);
    scene.set_snapshot(
        vec![
            MeasurementPoint::new(DEFAULT_CENTER.lat, DEFAULT_CENTER.lng, Some(30.0), 220.0),
            MeasurementPoint::new(DEFAULT_CENTER.lat + 0.002, DEFAULT_CENTER.lng, Some(8.0), 220.0),
        ],
        WindVector::new(3.0, 90.0),
    );
    (scene, FlatMap::new(), Crank::default())
}

/// Serve one pending frame at `ts`
fn crank(scene: &mut DispersionScene, sched: &mut Crank, ts: f64) -> u32 {
    if !std::mem::take(&mut sched.pending) {
        return 0;
    }
    scene.on_frame(ts, sched)
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_playing_scene_animates_markers() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Circles);
    scene.attach(&mut map, &mut sched);
    assert!(sched.pending);

    assert_eq!(crank(&mut scene, &mut sched, 0.0), 1);
    assert_eq!(crank(&mut scene, &mut sched, 0.5), 5);
    assert_eq!(scene.tick(), 6);

    scene.render(&mut map);
    assert_eq!(map.kinds(), vec!["markers"]);
    let Some(MapLayer::Markers(markers)) = map.layers.values().next() else {
        panic!("expected a marker layer");
    };
    assert_eq!(markers.len(), 2);
    assert!(markers.iter().all(|m| (0.25..=0.40).contains(&m.fill_opacity)));
}

#[test]
fn test_paused_scene_does_not_request_frames() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Circles);
    scene.set_playing(false, &mut sched);
    scene.attach(&mut map, &mut sched);
    assert!(!sched.pending);
    assert_eq!(crank(&mut scene, &mut sched, 1.0), 0);
    assert_eq!(scene.tick(), 0);
}

#[test]
fn test_tick_wraps_around() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Particles);
    scene.attach(&mut map, &mut sched);
    scene.seek(TICK_MODULUS - 8, &mut sched);
    assert!(!scene.playing());

    scene.set_playing(true, &mut sched);
    crank(&mut scene, &mut sched, 0.0);
    crank(&mut scene, &mut sched, 1.0);
    assert_eq!(scene.tick(), 3);
}

#[test]
fn test_detach_releases_everything() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Heatmap);
    scene.attach(&mut map, &mut sched);
    scene.render(&mut map);
    assert_eq!(map.kinds(), vec!["heat"]);

    scene.detach(&mut map, &mut sched);
    assert!(map.layers.is_empty());
    assert!(!sched.pending);
    assert!(!scene.is_attached());

    scene.detach(&mut map, &mut sched);
    assert!(map.layers.is_empty());
}

// ============================================================================
// Mode switching
// ============================================================================

#[test]
fn test_cycle_through_all_modes() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Circles);
    scene.attach(&mut map, &mut sched);
    crank(&mut scene, &mut sched, 0.0);

    for &mode in RenderMode::ALL.iter().chain(RenderMode::ALL) {
        let tick = scene.tick();
        scene.set_mode(mode, &mut map);
        scene.render(&mut map);
        assert_eq!(scene.mode(), mode);
        assert_eq!(scene.tick(), tick);
        assert!(map.layers.len() <= 1, "{mode}: {:?}", map.kinds());

        match mode {
            RenderMode::Circles => assert_eq!(map.kinds(), vec!["markers"]),
            RenderMode::Heatmap => assert_eq!(map.kinds(), vec!["heat"]),
            RenderMode::Particles | RenderMode::Clouds => {
                assert!(map.layers.is_empty());
                let surface = scene.surface().expect("canvas surface");
                assert_eq!((surface.width(), surface.height()), (320, 240));
                assert!(!surface.is_clear());
            }
        }
        assert!(scene.playing());
    }
}

#[test]
fn test_heatmap_without_host_support_draws_nothing() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Heatmap);
    map.heat = false;
    scene.attach(&mut map, &mut sched);
    scene.render(&mut map);
    assert!(map.layers.is_empty());
    assert_eq!(scene.mode(), RenderMode::Heatmap);

    scene.set_mode(RenderMode::Clouds, &mut map);
    scene.render(&mut map);
    assert!(scene.surface().is_some());
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_empty_snapshot_clears_canvas() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Clouds);
    scene.attach(&mut map, &mut sched);
    scene.render(&mut map);
    assert!(!scene.surface().expect("surface").is_clear());

    scene.set_snapshot(Vec::new(), None);
    scene.render(&mut map);
    assert!(scene.surface().expect("surface").is_clear());
}

#[test]
fn test_empty_snapshot_removes_heat_layer() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Heatmap);
    scene.attach(&mut map, &mut sched);
    scene.render(&mut map);
    assert!(scene.layer().is_some());

    scene.set_snapshot(Vec::new(), None);
    scene.render(&mut map);
    assert!(scene.layer().is_none());
    assert!(map.layers.is_empty());
}

#[test]
fn test_failed_refresh_keeps_snapshot() {
    let (mut scene, _, _) = scene(RenderMode::Circles);
    let wind = scene.wind();
    assert!(scene.refresh(&mut Failing).is_err());
    assert_eq!(scene.points().len(), 2);
    assert_eq!(scene.wind(), wind);
}

#[test]
fn test_station_feed_into_scene() {
    let json = r#"{
        "points": [
            {"lat": 40.231, "lon": 28.948, "air_quality": {"pm2_5": 42.0, "pm10": 60.0},
             "wind": {"speed": 4.0, "direction": 200.0}},
            {"lat": 40.236, "lng": 28.955, "air_quality": {"pm2_5": 9.0}}
        ]
    }"#;
    let (mut scene, mut map, mut sched) = scene(RenderMode::Circles);
    scene
        .refresh(&mut StationFeed::from_json(json))
        .expect("feed parses");
    assert_eq!(scene.points().len(), 2);
    assert_eq!(scene.wind().direction_deg, 200.0);

    scene.attach(&mut map, &mut sched);
    scene.render(&mut map);
    let Some(MapLayer::Markers(markers)) = map.layers.values().next() else {
        panic!("expected a marker layer");
    };
    assert_eq!(markers[0].pm10, Some(60.0));
}

#[test]
fn test_simulated_plume_into_scene() {
    let (mut scene, mut map, mut sched) = scene(RenderMode::Heatmap);
    scene
        .refresh(&mut PlumeProvider::default())
        .expect("simulation never fails");
    assert!(!scene.points().is_empty());

    scene.attach(&mut map, &mut sched);
    scene.render(&mut map);
    let Some(MapLayer::Heat(heat)) = map.layers.values().next() else {
        panic!("expected a heat layer");
    };
    assert_eq!(heat.points.len(), scene.points().len());
    assert!(heat.points.iter().all(|&(_, _, w)| (0.0..=1.0).contains(&w)));
}
