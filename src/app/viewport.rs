//! Map host for the viewer: web-mercator viewport fitted to the data bounds

use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_4;

use eframe::egui;
use tracing::trace;

use crate::core::map::{LayerId, MapError, MapHost, MapLayer, Marker};
use crate::core::{GeoBounds, GeoPoint, PixelPoint};

/// Mercator y for a latitude, in radians of arc
fn mercator_y(lat: f64) -> f64 {
    let lat = lat.clamp(-85.0, 85.0).to_radians();
    (FRAC_PI_4 + lat / 2.0).tan().ln()
}

pub struct EguiMap {
    bounds: GeoBounds,
    rect: egui::Rect,
    layers: BTreeMap<u64, MapLayer>,
    next_id: u64,
}

impl EguiMap {
    pub fn new(bounds: GeoBounds) -> Self {
        Self {
            bounds,
            rect: egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(1.0, 1.0)),
            layers: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn set_bounds(&mut self, bounds: GeoBounds) {
        self.bounds = bounds;
    }

    pub fn set_rect(&mut self, rect: egui::Rect) {
        self.rect = rect;
    }

    pub fn rect(&self) -> egui::Rect {
        self.rect
    }

    pub fn layers(&self) -> impl Iterator<Item = &MapLayer> {
        self.layers.values()
    }

    /// Screen position of a geographic point
    pub fn to_screen(&self, pos: GeoPoint) -> egui::Pos2 {
        let p = self.project(pos);
        self.rect.min + egui::vec2(p.x, p.y)
    }

    /// Geographic position under a screen position
    pub fn unproject(&self, screen: egui::Pos2) -> GeoPoint {
        let (scale, off_x, off_y) = self.fit();
        let local = screen - self.rect.min;
        let lng = self.bounds.west + ((local.x as f64 - off_x) / scale).to_degrees();
        let y = mercator_y(self.bounds.north) - (local.y as f64 - off_y) / scale;
        let lat = (2.0 * y.exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
        GeoPoint::new(lat, lng)
    }

    /// Topmost marker under `pointer`
    pub fn marker_at(&self, pointer: egui::Pos2) -> Option<&Marker> {
        self.layers
            .values()
            .filter_map(|l| match l {
                MapLayer::Markers(ms) => Some(ms),
                MapLayer::Heat(_) => None,
            })
            .flatten()
            .filter(|m| self.to_screen(m.center).distance(pointer) <= m.pixel_radius(self))
            .last()
    }

    /// Pixels per mercator unit, with the offset that centers the bounds
    fn fit(&self) -> (f64, f64, f64) {
        let b = &self.bounds;
        let x_span = (b.east - b.west).to_radians().max(1e-9);
        let y_span = (mercator_y(b.north) - mercator_y(b.south)).max(1e-9);
        let w = self.rect.width().max(1.0) as f64;
        let h = self.rect.height().max(1.0) as f64;
        let scale = (w / x_span).min(h / y_span);
        let off_x = (w - x_span * scale) / 2.0;
        let off_y = (h - y_span * scale) / 2.0;
        (scale, off_x, off_y)
    }
}

impl MapHost for EguiMap {
    fn project(&self, pos: GeoPoint) -> PixelPoint {
        let (scale, off_x, off_y) = self.fit();
        let x = (pos.lng - self.bounds.west).to_radians() * scale + off_x;
        let y = (mercator_y(self.bounds.north) - mercator_y(pos.lat)) * scale + off_y;
        PixelPoint::new(x as f32, y as f32)
    }

    fn viewport_size(&self) -> (u32, u32) {
        (
            self.rect.width().max(1.0).round() as u32,
            self.rect.height().max(1.0).round() as u32,
        )
    }

    fn add_layer(&mut self, layer: MapLayer) -> Result<LayerId, MapError> {
        let id = self.next_id;
        self.next_id += 1;
        trace!(id, kind = layer.kind(), "Viewer layer added");
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
