//! Main application struct and eframe integration.

use crate::ui::components::{InputBar, MessageList};
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, CentralPanel, RichText, TopBottomPanel};
use std::time::Duration;

pub struct ReverieApp {
    state: AppState,
    theme: Theme,
}

impl ReverieApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: AppState) -> Self {
        let theme = Theme::dark();
        theme.apply(&cc.egui_ctx);

        Self { state, theme }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("header")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_secondary)
                    .inner_margin(12.0),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new("Reverie")
                            .size(20.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );

                    ui.label(
                        RichText::new("Dream interpreter")
                            .size(14.0)
                            .color(self.theme.text_muted),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui
                            .button("🗑")
                            .on_hover_text("New conversation")
                            .clicked()
                        {
                            self.state.reset();
                        }
                    });
                });
            });
    }

    fn show_input_area(&mut self, ctx: &egui::Context) {
        TopBottomPanel::bottom("input_area")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_primary)
                    .inner_margin(self.theme.spacing),
            )
            .show(ctx, |ui| {
                ui.vertical(|ui| {
                    if let Some(notice) = self.state.notice().map(str::to_string) {
                        ui.label(RichText::new(notice).size(12.0).color(self.theme.warning));
                        ui.add_space(self.theme.spacing_sm);
                    }

                    InputBar::new(&mut self.state, &self.theme).show(ui);
                });
            });
    }

    fn show_content(&mut self, ctx: &egui::Context) {
        CentralPanel::default()
            .frame(egui::Frame::none().fill(self.theme.bg_primary))
            .show(ctx, |ui| {
                MessageList::new(&mut self.state, &self.theme).show(ui);
            });
    }
}

impl eframe::App for ReverieApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll_events();

        self.show_header(ctx);
        self.show_input_area(ctx);
        self.show_content(ctx);

        // Background workers deliver over channels; keep polling even
        // when no input arrives.
        ctx.request_repaint_after(Duration::from_millis(150));
    }
}
