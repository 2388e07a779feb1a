//! Air-quality dispersion visualization
//!
//! Animates pollutant measurement points drifting with the wind over a
//! map, through one of four interchangeable render backends:
//! - Vector markers pulsing around each station
//! - A heat layer whose intensity breathes with the animation
//! - Particle trails on a fading raster surface
//! - Soft radial clouds on a raster surface
//!
//! `core` and `provider` are platform independent. The browser viewer
//! lives behind the `wasm` feature, the headless renderer behind `cli`.

pub mod core;
pub mod provider;
pub mod time;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod app;
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod theme;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod web {
    use tracing::{info, warn};
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    use crate::app::PlumeApp;
    use crate::core::SceneConfig;
    use crate::provider::{
        parse_station_feed, DataProvider, PlumeProvider, StationFeed, STATION_BASE_RADIUS_M,
    };

    /// Read an optional string global set by the hosting page
    fn page_global(name: &str) -> Option<String> {
        js_sys::eval(&format!("window.{name}"))
            .ok()
            .and_then(|v| v.as_string())
    }

    fn initial_provider() -> Box<dyn DataProvider> {
        match page_global("__plume_feed") {
            Some(json) => match parse_station_feed(&json, STATION_BASE_RADIUS_M) {
                Ok(snapshot) => {
                    info!(points = snapshot.points.len(), "Using station feed from page");
                    Box::new(StationFeed::from_json(json))
                }
                Err(e) => {
                    warn!(error = %e, "Page station feed unusable, simulating plume");
                    Box::new(PlumeProvider::default())
                }
            },
            None => {
                info!("No station feed on page, simulating plume");
                Box::new(PlumeProvider::default())
            }
        }
    }

    fn initial_config() -> SceneConfig {
        match page_global("__plume_config").map(|s| SceneConfig::from_json(&s)) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring invalid page config");
                SceneConfig::default()
            }
            None => SceneConfig::default(),
        }
    }

    #[wasm_bindgen(start)]
    pub fn main() {
        console_error_panic_hook::set_once();

        // Initialize tracing for browser console
        tracing_wasm::set_as_global_default();

        let web_options = eframe::WebOptions::default();

        wasm_bindgen_futures::spawn_local(async {
            let canvas = web_sys::window()
                .expect("no window")
                .document()
                .expect("no document")
                .get_element_by_id("canvas")
                .expect("no canvas element")
                .dyn_into::<web_sys::HtmlCanvasElement>()
                .expect("not a canvas element");

            let config = initial_config();
            let provider = initial_provider();

            eframe::WebRunner::new()
                .start(
                    canvas,
                    web_options,
                    Box::new(move |cc| Ok(Box::new(PlumeApp::new(cc, config, provider)))),
                )
                .await
                .expect("Failed to start eframe");
        });
    }
}
