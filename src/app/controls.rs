//! Controls sidebar: render mode, playback, flow speed, trail length

use eframe::egui;

use super::PlumeApp;
use crate::core::{RenderMode, Severity, TICK_MODULUS};
use crate::theme::{self, colors};

const FLOW_RANGE: std::ops::RangeInclusive<f64> = 0.3..=2.0;
const TRAIL_RANGE: std::ops::RangeInclusive<f64> = 10.0..=200.0;

impl PlumeApp {
    pub(crate) fn render_controls(&mut self, ctx: &egui::Context) {
        let width = ctx.screen_rect().width() * 0.18;
        egui::SidePanel::left("controls")
            .default_width(width)
            .min_width(220.0)
            .resizable(true)
            .frame(egui::Frame::new().fill(colors::BG_PRIMARY).inner_margin(8.0))
            .show(ctx, |ui| {
                let group_frame = egui::Frame::new()
                    .stroke(egui::Stroke::new(1.0, colors::TEXT_MUTED.gamma_multiply(0.6)))
                    .corner_radius(4.0)
                    .inner_margin(6.0);

                group_frame.show(ui, |ui| {
                    ui.set_min_width(ui.available_width());
                    ui.label(egui::RichText::new("Mode:").color(colors::TEXT_MUTED));
                    let mut mode = self.scene.mode();
                    for &m in RenderMode::ALL {
                        ui.radio_value(&mut mode, m, m.label());
                    }
                    if mode != self.scene.mode() {
                        self.scene.set_mode(mode, &mut self.map);
                    }
                });

                ui.add_space(8.0);

                group_frame.show(ui, |ui| {
                    ui.set_min_width(ui.available_width());
                    ui.spacing_mut().slider_width = ui.available_width();

                    let label = if self.scene.playing() { "Pause" } else { "Play" };
                    if ui.button(label).clicked() {
                        self.scene.toggle_play(&mut self.sched);
                    }

                    ui.add_space(4.0);
                    let mut tick = self.scene.tick();
                    ui.label(egui::RichText::new(format!("Tick: {tick}")).color(colors::TEXT_MUTED));
                    let seek = ui.add(
                        egui::Slider::new(&mut tick, 0..=TICK_MODULUS - 1)
                            .clamping(egui::SliderClamping::Always)
                            .show_value(false),
                    );
                    if seek.changed() {
                        self.scene.seek(tick, &mut self.sched);
                    }

                    ui.add_space(4.0);
                    let mut flow = self.scene.state().flow_speed;
                    ui.label(
                        egui::RichText::new(format!("Flow speed: {flow:.1}x"))
                            .color(colors::TEXT_MUTED),
                    );
                    let flow_response = ui.add(
                        egui::Slider::new(&mut flow, FLOW_RANGE)
                            .step_by(0.1)
                            .clamping(egui::SliderClamping::Always)
                            .show_value(false),
                    );
                    if flow_response.double_clicked() {
                        flow = 1.0;
                    }
                    if flow_response.changed() || flow_response.double_clicked() {
                        self.scene.set_flow_speed(flow);
                    }

                    if self.scene.mode() == RenderMode::Particles {
                        ui.add_space(4.0);
                        let mut trail = self.scene.state().trail_length;
                        ui.label(
                            egui::RichText::new(format!("Trail length: {trail:.0}"))
                                .color(colors::TEXT_MUTED),
                        );
                        let trail_response = ui.add(
                            egui::Slider::new(&mut trail, TRAIL_RANGE)
                                .step_by(10.0)
                                .clamping(egui::SliderClamping::Always)
                                .show_value(false),
                        );
                        if trail_response.changed() {
                            self.scene.set_trail_length(trail);
                        }
                    }
                });

                ui.add_space(8.0);

                group_frame.show(ui, |ui| {
                    ui.set_min_width(ui.available_width());
                    if ui.button("Refresh data").clicked() {
                        self.refresh();
                    }
                });

                ui.add_space(8.0);

                group_frame.show(ui, |ui| {
                    ui.set_min_width(ui.available_width());
                    ui.label(egui::RichText::new("PM2.5:").color(colors::TEXT_MUTED));
                    for &sev in Severity::ALL {
                        ui.horizontal(|ui| {
                            let (rect, _) =
                                ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
                            ui.painter().circle_filled(rect.center(), 5.0, theme::severity(sev));
                            ui.label(egui::RichText::new(sev.label()).small());
                        });
                    }
                });
            });
    }
}
