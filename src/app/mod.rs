//! Dispersion viewer
//!
//! egui app hosting one [`DispersionScene`]. The viewer is the scene's map
//! (projection + layer registry) and its frame scheduler (repaint requests).

mod controls;
mod header;
mod viewport;

use eframe::egui;
use tracing::{info, warn};

use crate::core::map::{MapHost, MapLayer};
use crate::core::{DispersionScene, FrameScheduler, GeoBounds, Raster, SceneConfig};
use crate::provider::DataProvider;
use crate::theme::{self, colors, dark_visuals};
use crate::time::now_seconds;

use viewport::EguiMap;

/// Frame scheduler backed by egui repaint requests
pub(crate) struct RepaintScheduler {
    ctx: egui::Context,
    pending: bool,
}

impl RepaintScheduler {
    fn new(ctx: egui::Context) -> Self {
        Self { ctx, pending: false }
    }

    /// Consume the pending request, true if a frame callback is due
    fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

impl FrameScheduler for RepaintScheduler {
    fn request_frame(&mut self) {
        self.pending = true;
        self.ctx.request_repaint();
    }

    fn cancel_frame(&mut self) {
        self.pending = false;
    }
}

pub struct PlumeApp {
    pub(crate) scene: DispersionScene,
    pub(crate) map: EguiMap,
    pub(crate) sched: RepaintScheduler,
    provider: Box<dyn DataProvider>,
    pub(crate) fps_counter: header::FpsCounter,
    /// Show controls sidebar
    pub(crate) show_settings: bool,
    /// Last refresh error, shown in the header
    pub(crate) last_error: Option<String>,
    /// Offscreen surface for the heat layer
    heat_scratch: Raster,
    heat_texture: Option<egui::TextureHandle>,
    surface_texture: Option<egui::TextureHandle>,
}

impl PlumeApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: SceneConfig,
        provider: Box<dyn DataProvider>,
    ) -> Self {
        cc.egui_ctx.set_visuals(dark_visuals());

        let mut app = Self {
            scene: DispersionScene::new(config),
            map: EguiMap::new(GeoBounds::for_viewport(&[])),
            sched: RepaintScheduler::new(cc.egui_ctx.clone()),
            provider,
            fps_counter: header::FpsCounter::new(),
            show_settings: true,
            last_error: None,
            heat_scratch: Raster::new(1, 1),
            heat_texture: None,
            surface_texture: None,
        };
        app.refresh();
        app.scene.attach(&mut app.map, &mut app.sched);
        info!(points = app.scene.points().len(), mode = %app.scene.mode(), "Viewer ready");
        app
    }

    /// Pull a new snapshot and refit the viewport to it
    pub(crate) fn refresh(&mut self) {
        match self.scene.refresh(self.provider.as_mut()) {
            Ok(()) => {
                self.last_error = None;
                self.map.set_bounds(GeoBounds::for_viewport(self.scene.points()));
            }
            Err(e) => {
                warn!(error = %e, "Viewer refresh failed");
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn render_map(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::hover());
        let rect = response.rect;
        self.map.set_rect(rect);

        if self.sched.take_pending() {
            self.scene.on_frame(now_seconds(), &mut self.sched);
        }
        self.scene.render(&mut self.map);

        painter.rect_filled(rect, 0.0, colors::BG_MAP);
        draw_graticule(&painter, &self.map);

        let ctx = ui.ctx();
        for layer in self.map.layers() {
            match layer {
                MapLayer::Heat(heat) => {
                    let (w, h) = self.map.viewport_size();
                    self.heat_scratch.resize(w, h);
                    self.heat_scratch.clear();
                    heat.paint(|p| self.map.project(p), &mut self.heat_scratch);
                    let id = upload(ctx, &mut self.heat_texture, "heat", &self.heat_scratch);
                    paint_texture(&painter, id, rect);
                }
                MapLayer::Markers(markers) => {
                    for m in markers {
                        let color = theme::rgb(m.color);
                        painter.circle(
                            self.map.to_screen(m.center),
                            m.pixel_radius(&self.map),
                            color.gamma_multiply(m.fill_opacity),
                            egui::Stroke::new(1.5, color),
                        );
                    }
                }
            }
        }

        if let Some(surface) = self.scene.surface() {
            let id = upload(ctx, &mut self.surface_texture, "surface", surface);
            paint_texture(&painter, id, rect);
        }

        let hovered = response
            .hover_pos()
            .and_then(|pos| self.map.marker_at(pos))
            .cloned();
        if let Some(m) = hovered {
            response.on_hover_ui_at_pointer(|ui| {
                let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
                ui.label(format!("PM2.5: {} µg/m³", fmt(m.pm25)));
                ui.label(format!("PM10: {} µg/m³", fmt(m.pm10)));
                if m.distance_m > 0.0 {
                    ui.label(format!("Distance: {:.0} m", m.distance_m));
                }
            });
        }
    }
}

/// Upload a raster into a reusable texture slot
fn upload(
    ctx: &egui::Context,
    slot: &mut Option<egui::TextureHandle>,
    name: &str,
    raster: &Raster,
) -> egui::TextureId {
    let image = egui::ColorImage::from_rgba_unmultiplied(
        [raster.width() as usize, raster.height() as usize],
        raster.to_image().as_raw(),
    );
    match slot {
        Some(handle) => {
            handle.set(image, egui::TextureOptions::LINEAR);
            handle.id()
        }
        None => {
            let handle = ctx.load_texture(name, image, egui::TextureOptions::LINEAR);
            let id = handle.id();
            *slot = Some(handle);
            id
        }
    }
}

fn paint_texture(painter: &egui::Painter, id: egui::TextureId, rect: egui::Rect) {
    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
    painter.image(id, rect, uv, egui::Color32::WHITE);
}

/// Faint lat/lng lines in place of map tiles
fn draw_graticule(painter: &egui::Painter, map: &EguiMap) {
    use crate::core::GeoPoint;

    let rect = map.rect();
    let top_left = map.unproject(rect.min);
    let bottom_right = map.unproject(rect.max);
    let span = (bottom_right.lng - top_left.lng).abs().max(1e-6);
    let step = [0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0]
        .into_iter()
        .find(|s| span / s <= 12.0)
        .unwrap_or(1.0);
    let stroke = egui::Stroke::new(1.0, colors::GRID);

    let mut lng = (top_left.lng / step).ceil() * step;
    while lng <= bottom_right.lng {
        let x = map.to_screen(GeoPoint::new(top_left.lat, lng)).x;
        painter.vline(x, rect.y_range(), stroke);
        lng += step;
    }
    let mut lat = (bottom_right.lat / step).ceil() * step;
    while lat <= top_left.lat {
        let y = map.to_screen(GeoPoint::new(lat, top_left.lng)).y;
        painter.hline(rect.x_range(), y, stroke);
        lat += step;
    }
}

impl eframe::App for PlumeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::new().fill(colors::BG_PRIMARY).inner_margin(4.0))
            .show(ctx, |ui| {
                self.render_header(ui);
            });

        // Controls sidebar (must be shown before CentralPanel)
        if self.show_settings {
            self.render_controls(ctx);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(colors::BG_PRIMARY))
            .show(ctx, |ui| {
                self.render_map(ui);
            });
    }
}
