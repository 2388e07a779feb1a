//! Map collaborator seam
//!
//! The engine never draws map tiles itself. It asks the host map for
//! geographic → pixel projection (raster backends) and hands geographic
//! layers to it (marker and heat backends).

use thiserror::Error;

use super::data::{GeoPoint, PixelPoint, Rgb};
use super::raster::GradientStop;

/// Handle to a layer owned by the host map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("{0} not found")]
    LayerNotFound(LayerId),
    #[error("layer kind not supported: {0}")]
    Unsupported(&'static str),
    #[error("map host error: {0}")]
    Host(String),
}

/// Filled circle in geographic space, radius in meters
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub center: GeoPoint,
    pub radius_m: f64,
    pub color: Rgb,
    pub fill_opacity: f32,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub distance_m: f64,
}

/// Density-field input for a heat layer
#[derive(Clone, Debug, PartialEq)]
pub struct HeatLayer {
    /// `(lat, lng, intensity)` triples
    pub points: Vec<(f64, f64, f64)>,
    /// Kernel radius in pixels, independent of zoom
    pub radius_px: f32,
    /// Kernel blur in pixels, independent of zoom
    pub blur_px: f32,
    /// Intensity that maps to full opacity
    pub max: f64,
    pub gradient: Vec<GradientStop>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MapLayer {
    Markers(Vec<Marker>),
    Heat(HeatLayer),
}

impl MapLayer {
    pub fn kind(&self) -> &'static str {
        match self {
            MapLayer::Markers(_) => "markers",
            MapLayer::Heat(_) => "heat",
        }
    }
}

/// Host map: projection for the current viewport plus a layer registry
pub trait MapHost {
    /// Geographic → container pixel position in the current viewport
    fn project(&self, pos: GeoPoint) -> PixelPoint;

    /// Viewport size in pixels
    fn viewport_size(&self) -> (u32, u32);

    /// Whether the host can draw [`MapLayer::Heat`]
    fn supports_heat_layer(&self) -> bool {
        true
    }

    fn add_layer(&mut self, layer: MapLayer) -> Result<LayerId, MapError>;

    /// Replace the contents of an existing layer
    fn update_layer(&mut self, id: LayerId, layer: MapLayer) -> Result<(), MapError>;

    fn remove_layer(&mut self, id: LayerId) -> Result<(), MapError>;
}
