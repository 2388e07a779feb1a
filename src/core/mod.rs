//! Platform-agnostic engine - shared between the WASM viewer and the CLI

pub mod backend;
pub mod clock;
pub mod config;
pub mod data;
pub mod drift;
pub mod intensity;
pub mod map;
pub mod raster;
pub mod scene;

pub use backend::{DrivenPoint, FrameParams, HeatSettings, RenderBackend, RenderMode};
pub use clock::{AnimationClock, FrameScheduler, TICK_MODULUS};
pub use config::SceneConfig;
pub use data::{
    aqi_from_pm25, compass_label, GeoBounds, GeoPoint, MeasurementPoint, PixelPoint, Rgb, Severity,
    WindVector, DEFAULT_CENTER,
};
pub use map::{HeatLayer, LayerId, MapError, MapHost, MapLayer, Marker};
pub use raster::{GradientStop, Raster, Rgba};
pub use scene::{AnimationState, DispersionScene};
