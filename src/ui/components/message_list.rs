//! Message list component
//!
//! Conversation bubbles with timestamps, a copy action on assistant
//! messages, and a typing indicator while a request is in flight.

use crate::messages::{Message, Sender};
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, Align, Color32, RichText, Vec2};

pub struct MessageList<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
}

impl<'a> MessageList<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        let messages = self.state.orchestrator.messages();
        let in_flight = self.state.orchestrator.is_in_flight();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.add_space(self.theme.spacing);

                    if messages.is_empty() && !in_flight {
                        self.show_empty_state(ui);
                    } else {
                        for message in &messages {
                            self.show_message(ui, message);
                            ui.add_space(self.theme.spacing_sm);
                        }

                        if in_flight {
                            self.show_typing_indicator(ui);
                        }
                    }

                    ui.add_space(self.theme.spacing);
                });
            });
    }

    fn show_empty_state(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(100.0);

            ui.label(
                RichText::new("Welcome to Reverie")
                    .size(24.0)
                    .color(self.theme.text_primary),
            );

            ui.add_space(self.theme.spacing);

            ui.label(
                RichText::new("Tell me about a dream by typing or using the microphone.")
                    .size(14.0)
                    .color(self.theme.text_muted),
            );

            ui.add_space(self.theme.spacing_lg);

            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing = Vec2::splat(self.theme.spacing);

                self.show_hint_card(ui, "Type", "Describe your dream below");
                self.show_hint_card(ui, "Speak", "Tap the mic and just talk");
                self.show_hint_card(ui, "Reset", "Start over any time");
            });
        });
    }

    fn show_hint_card(&self, ui: &mut egui::Ui, title: &str, description: &str) {
        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.set_width(150.0);
                ui.vertical(|ui| {
                    ui.label(
                        RichText::new(title)
                            .size(14.0)
                            .strong()
                            .color(self.theme.primary),
                    );
                    ui.label(
                        RichText::new(description)
                            .size(12.0)
                            .color(self.theme.text_muted),
                    );
                });
            });
    }

    fn show_message(&mut self, ui: &mut egui::Ui, message: &Message) {
        let is_user = message.sender == Sender::User;
        let bubble_color = if is_user {
            self.theme.user_bubble
        } else {
            self.theme.assistant_bubble
        };
        let text_color = if is_user {
            Color32::WHITE
        } else {
            self.theme.text_primary
        };
        let align = if is_user { Align::RIGHT } else { Align::LEFT };

        ui.with_layout(egui::Layout::top_down(align), |ui| {
            ui.label(
                RichText::new(if is_user { "You" } else { "Reverie" })
                    .size(12.0)
                    .color(self.theme.text_muted),
            );

            ui.add_space(2.0);

            let max_width = ui.available_width() * 0.75;

            egui::Frame::none()
                .fill(bubble_color)
                .rounding(self.theme.bubble_rounding)
                .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                .show(ui, |ui| {
                    ui.set_max_width(max_width);
                    ui.label(RichText::new(&message.content).color(text_color));

                    if !is_user {
                        self.show_copy_control(ui, message);
                    }
                });

            let time_str = message.timestamp.format("%H:%M").to_string();
            ui.label(
                RichText::new(time_str)
                    .size(10.0)
                    .color(self.theme.text_muted),
            );
        });
    }

    fn show_copy_control(&mut self, ui: &mut egui::Ui, message: &Message) {
        let copied = self.state.just_copied(&message.id);
        let label = if copied { "Copied" } else { "Copy" };

        let response = ui.add(
            egui::Button::new(
                RichText::new(label).size(11.0).color(self.theme.text_muted),
            )
            .small()
            .fill(Color32::TRANSPARENT),
        );

        if response.clicked() {
            ui.ctx()
                .output_mut(|o| o.copied_text = message.content.clone());
            self.state.mark_copied(&message.id);
        }

        if copied {
            ui.ctx().request_repaint();
        }
    }

    fn show_typing_indicator(&self, ui: &mut egui::Ui) {
        ui.with_layout(egui::Layout::top_down(Align::LEFT), |ui| {
            ui.label(
                RichText::new("Reverie")
                    .size(12.0)
                    .color(self.theme.text_muted),
            );

            ui.add_space(2.0);

            egui::Frame::none()
                .fill(self.theme.assistant_bubble)
                .rounding(self.theme.bubble_rounding)
                .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        for i in 0..3 {
                            let t = ui.ctx().input(|input| input.time);
                            let alpha = ((t * 3.0 + i as f64 * 0.5).sin() * 0.5 + 0.5) as f32;
                            ui.label(
                                RichText::new("●")
                                    .size(10.0)
                                    .color(self.theme.text_muted.gamma_multiply(alpha)),
                            );
                        }
                    });
                });
        });

        ui.ctx().request_repaint();
    }
}
