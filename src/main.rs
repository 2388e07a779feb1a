//! Headless dispersion renderer
//!
//! Drives a scene on a fixed 60 Hz interval without a window and writes the
//! last frame as a PNG.
//!
//! Run with: cargo run --features cli --bin plume-cli
//!
//! Environment:
//! - `PLUME_CONFIG`  scene config JSON file
//! - `PLUME_MODE`    circles | heatmap | particles | clouds (overrides config)
//! - `PLUME_FEED`    station feed JSON file (default: simulated plume)
//! - `PLUME_FRAMES`  frames to run (default 300)
//! - `PLUME_OUT`     output PNG path (default plume.png)
//! - `PLUME_SIZE`    viewport as WIDTHxHEIGHT (default 960x640)

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::collections::BTreeMap;

    use plume_vis::core::map::{LayerId, MapError, MapHost, MapLayer};
    use plume_vis::core::{FrameScheduler, GeoBounds, GeoPoint, PixelPoint};

    /// Map host without tiles: equirectangular fit of the data bounds,
    /// scaled by the cosine of the center latitude
    pub struct HeadlessMap {
        bounds: GeoBounds,
        size: (u32, u32),
        pub layers: BTreeMap<u64, MapLayer>,
        next_id: u64,
    }

    impl HeadlessMap {
        pub fn new(bounds: GeoBounds, width: u32, height: u32) -> Self {
            Self {
                bounds,
                size: (width.max(1), height.max(1)),
                layers: BTreeMap::new(),
                next_id: 1,
            }
        }

        /// Pixels per degree of longitude and latitude
        fn scale(&self) -> (f64, f64) {
            let b = &self.bounds;
            let k = b.center().lat.to_radians().cos().max(0.01);
            let x_span = ((b.east - b.west) * k).max(1e-9);
            let y_span = (b.north - b.south).max(1e-9);
            let s = (self.size.0 as f64 / x_span).min(self.size.1 as f64 / y_span);
            (s * k, s)
        }
    }

    impl MapHost for HeadlessMap {
        fn project(&self, pos: GeoPoint) -> PixelPoint {
            let (sx, sy) = self.scale();
            let c = self.bounds.center();
            PixelPoint::new(
                (self.size.0 as f64 * 0.5 + (pos.lng - c.lng) * sx) as f32,
                (self.size.1 as f64 * 0.5 - (pos.lat - c.lat) * sy) as f32,
            )
        }

        fn viewport_size(&self) -> (u32, u32) {
            self.size
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

    /// Frame requests are served on the next interval tick
    #[derive(Default)]
    pub struct IntervalScheduler {
        pending: bool,
        pub requests: u64,
    }

    impl IntervalScheduler {
        pub fn take_pending(&mut self) -> bool {
            std::mem::take(&mut self.pending)
        }
    }

    impl FrameScheduler for IntervalScheduler {
        fn request_frame(&mut self) {
            self.pending = true;
            self.requests += 1;
        }

        fn cancel_frame(&mut self) {
            self.pending = false;
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::time::{Duration, Instant};

    use anyhow::Context;
    use tracing::{debug, info, warn};
    use tracing_subscriber::{fmt, EnvFilter};

    use headless::{HeadlessMap, IntervalScheduler};
    use plume_vis::core::map::{MapHost, MapLayer};
    use plume_vis::core::{DispersionScene, GeoBounds, Raster, RenderMode, Rgba, SceneConfig};
    use plume_vis::provider::{DataProvider, PlumeProvider, StationFeed};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,plume_vis=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    // =========================================================================
    // Configuration
    // =========================================================================

    let mut config = match std::env::var("PLUME_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            SceneConfig::from_json(&text).with_context(|| format!("parsing config {path}"))?
        }
        Err(_) => SceneConfig::default(),
    };
    if let Ok(mode) = std::env::var("PLUME_MODE") {
        config.mode = mode.parse::<RenderMode>().map_err(anyhow::Error::msg)?;
    }
    let frames: u64 = match std::env::var("PLUME_FRAMES") {
        Ok(v) => v.parse().with_context(|| format!("PLUME_FRAMES={v}"))?,
        Err(_) => 300,
    };
    let out = std::env::var("PLUME_OUT").unwrap_or_else(|_| "plume.png".to_string());
    let (width, height) = match std::env::var("PLUME_SIZE") {
        Ok(v) => {
            let (w, h) = v
                .split_once('x')
                .with_context(|| format!("PLUME_SIZE={v}, expected WIDTHxHEIGHT"))?;
            (w.trim().parse::<u32>()?, h.trim().parse::<u32>()?)
        }
        Err(_) => (960, 640),
    };

    let mut provider: Box<dyn DataProvider> = match std::env::var("PLUME_FEED") {
        Ok(path) => Box::new(StationFeed::from_file(&path).with_context(|| format!("feed {path}"))?),
        Err(_) => Box::new(PlumeProvider::default()),
    };

    // =========================================================================
    // Scene
    // =========================================================================

    let mut scene = DispersionScene::new(config);
    scene
        .refresh(provider.as_mut())
        .context("initial snapshot")?;

    let mut map = HeadlessMap::new(GeoBounds::for_viewport(scene.points()), width, height);
    let (width, height) = map.viewport_size();
    let mut sched = IntervalScheduler::default();
    scene.attach(&mut map, &mut sched);

    info!(
        mode = %scene.mode(),
        points = scene.points().len(),
        wind = %scene.wind().compass(),
        frames,
        "Rendering"
    );

    let start = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_millis(16));
    let mut rendered = 0u64;

    while rendered < frames {
        tokio::select! {
            _ = interval.tick() => {
                if sched.take_pending() {
                    let advanced = scene.on_frame(start.elapsed().as_secs_f64(), &mut sched);
                    debug!(tick = scene.tick(), advanced, "frame");
                }
                scene.render(&mut map);
                rendered += 1;

                if rendered % 60 == 0 {
                    let state = scene.state();
                    info!(
                        frames = rendered,
                        tick = state.tick,
                        layers = map.layers.len(),
                        requests = sched.requests,
                        "stats"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!(frames = rendered, "Interrupted, writing current frame");
                break;
            }
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    let mut frame = Raster::new(width, height);
    frame.fill(Rgba::new(226.0 / 255.0, 230.0 / 255.0, 233.0 / 255.0, 1.0));

    if let Some(surface) = scene.surface() {
        frame.blend_from(surface);
    } else {
        let mut overlay = Raster::new(width, height);
        for layer in map.layers.values() {
            match layer {
                MapLayer::Heat(heat) => heat.paint(|p| map.project(p), &mut overlay),
                MapLayer::Markers(markers) => {
                    for m in markers {
                        m.paint(&map, &mut overlay);
                    }
                }
            }
        }
        frame.blend_from(&overlay);
    }

    frame
        .to_image()
        .save(&out)
        .with_context(|| format!("writing {out}"))?;
    info!(out = %out, tick = scene.tick(), "Frame written");

    scene.detach(&mut map, &mut sched);
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
