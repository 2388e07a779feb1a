//! Header bar with the controls toggle and live stats

use eframe::egui;

use super::PlumeApp;
use crate::core::{aqi_from_pm25, Severity};
use crate::theme::{self, colors};
use crate::time::now_seconds;

impl PlumeApp {
    pub(crate) fn render_header(&mut self, ui: &mut egui::Ui) {
        self.fps_counter.tick();

        let wind = self.scene.wind();
        let max_pm25 = self
            .scene
            .points()
            .iter()
            .filter_map(|p| p.pm25)
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        ui.horizontal(|ui| {
            let toggle = if self.show_settings { "Controls <<<" } else { "Controls >>>" };
            if ui.button(egui::RichText::new(toggle)).clicked() {
                self.show_settings = !self.show_settings;
            }

            ui.add_space(10.0);
            ui.label(egui::RichText::new("Dispersion").color(colors::TEXT_PRIMARY));

            if let Some(pm) = max_pm25 {
                let sev = Severity::from_pm25(pm);
                if let Some(text) = sev.advisory() {
                    ui.add_space(10.0);
                    ui.colored_label(
                        theme::severity(sev),
                        format!("Warning: {text} (PM2.5: {pm:.1})"),
                    );
                }
            }

            // RIGHT: stats (right-to-left order)
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(pm) = max_pm25 {
                    let sev = Severity::from_pm25(pm);
                    ui.label(
                        egui::RichText::new(format!("max AQI {}", aqi_from_pm25(pm)))
                            .color(theme::severity(sev)),
                    )
                    .on_hover_text(sev.label());
                    ui.label(egui::RichText::new("/").color(colors::TEXT_MUTED));
                }

                ui.label(
                    egui::RichText::new(format!(
                        "wind {:.1} m/s {} ({:.0}°)",
                        wind.speed_mps,
                        wind.compass(),
                        wind.direction_deg
                    ))
                    .color(colors::TEXT_SECONDARY),
                );
                ui.label(egui::RichText::new("/").color(colors::TEXT_MUTED));

                ui.label(
                    egui::RichText::new(format!("{} points", self.scene.points().len()))
                        .color(colors::TEXT_MUTED),
                );
                ui.label(egui::RichText::new("/").color(colors::TEXT_MUTED));

                ui.label(
                    egui::RichText::new(format!("tick {}", self.scene.tick()))
                        .color(colors::TEXT_MUTED)
                        .monospace(),
                );
                ui.label(egui::RichText::new("/").color(colors::TEXT_MUTED));

                ui.label(
                    egui::RichText::new(format!("{:.0} fps", self.fps_counter.fps()))
                        .color(colors::TEXT_SECONDARY),
                );

                if let Some(err) = &self.last_error {
                    ui.add_space(10.0);
                    ui.colored_label(theme::severity(Severity::Unhealthy), "Feed error")
                        .on_hover_text(err);
                }
            });
        });
    }
}

/// FPS counter over the last 60 frames
pub struct FpsCounter {
    frames: Vec<f64>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            frames: Vec::with_capacity(60),
        }
    }

    pub fn tick(&mut self) {
        self.frames.push(now_seconds());
        if self.frames.len() > 60 {
            self.frames.remove(0);
        }
    }

    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frames.first(), self.frames.last()) else {
            return 0.0;
        };
        let elapsed = last - first;
        if self.frames.len() < 2 || elapsed <= 0.0 {
            return 0.0;
        }
        (self.frames.len() as f64 - 1.0) / elapsed
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}
