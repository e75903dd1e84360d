//! Input bar component
//!
//! Text entry, mic toggle, and send control.

use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, Key, RichText, Vec2};

pub struct InputBar<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
}

impl<'a> InputBar<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    // Hidden entirely when the capability probe failed.
                    if self.state.voice.is_supported() {
                        self.show_mic_button(ui);
                        ui.add_space(self.theme.spacing_sm);
                    }

                    self.show_text_input(ui);

                    ui.add_space(self.theme.spacing_sm);

                    self.show_send_button(ui);
                });
            });
    }

    fn show_mic_button(&mut self, ui: &mut egui::Ui) {
        use crate::speech::CaptureState;

        let capture_state = self.state.voice.state();
        let (icon, tooltip, color) = match capture_state {
            CaptureState::Idle => ("🎤", "Start voice input", self.theme.text_secondary),
            CaptureState::Listening => ("⏹", "Stop voice input", self.theme.listening),
            CaptureState::Restarting => ("⏳", "Reconnecting", self.theme.warning),
            CaptureState::Unsupported => return,
        };

        let is_listening = capture_state == CaptureState::Listening;

        let button = egui::Button::new(RichText::new(icon).size(20.0).color(color))
            .min_size(Vec2::splat(44.0))
            .rounding(self.theme.button_rounding);

        let button = if is_listening {
            button.fill(self.theme.listening.gamma_multiply(0.2))
        } else {
            button
        };

        let response = ui.add(button);
        let button_rect = response.rect;

        if response.clicked() {
            self.state.toggle_voice();
        }
        response.on_hover_text(tooltip);

        // Pulsing ring while capturing.
        if is_listening {
            let t = ui.ctx().input(|i| i.time);
            let pulse = ((t * 3.0).sin() * 0.5 + 0.5) as f32;

            let painter = ui.painter();
            let center = button_rect.center();
            let radius = button_rect.width() / 2.0 + 2.0 + pulse * 3.0;

            painter.circle_stroke(
                center,
                radius,
                egui::Stroke::new(
                    2.0 * pulse,
                    self.theme.listening.gamma_multiply(1.0 - pulse * 0.5),
                ),
            );

            ui.ctx().request_repaint();
        }
    }

    fn show_text_input(&mut self, ui: &mut egui::Ui) {
        // Reserve space for the send button.
        let available_width = ui.available_width() - 60.0;

        let text_edit = egui::TextEdit::multiline(self.state.orchestrator.input_mut())
            .hint_text("Describe your dream...")
            .desired_rows(1)
            .desired_width(available_width)
            .font(egui::TextStyle::Body)
            .margin(egui::Margin::symmetric(12.0, 8.0));

        let response = ui.add(text_edit);

        // Enter submits; Shift+Enter keeps the newline the editor just
        // inserted.
        if response.has_focus() {
            let enter_pressed = ui.input(|i| i.key_pressed(Key::Enter));
            let shift_held = ui.input(|i| i.modifiers.shift);

            if enter_pressed && !shift_held {
                let input = self.state.orchestrator.input_mut();
                if input.ends_with('\n') {
                    input.pop();
                }
                self.state.send_message();
            }
        }
    }

    fn show_send_button(&mut self, ui: &mut egui::Ui) {
        let in_flight = self.state.orchestrator.is_in_flight();
        let can_send = !self.state.orchestrator.input().trim().is_empty() && !in_flight;

        let icon = if in_flight { "⏳" } else { "➤" };
        let button_color = if can_send {
            self.theme.primary
        } else {
            self.theme.text_muted
        };

        let button = egui::Button::new(RichText::new(icon).size(18.0).color(egui::Color32::WHITE))
            .min_size(Vec2::splat(44.0))
            .rounding(self.theme.button_rounding)
            .fill(button_color);

        let response = ui.add_enabled(can_send, button);

        if response.clicked() {
            self.state.send_message();
        }

        response.on_hover_text(if in_flight {
            "Waiting for the interpretation"
        } else {
            "Send (Enter)"
        });
    }
}
