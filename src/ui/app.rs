//! Main window of the service viewer.
//!
//! Renders the foreground snapshot, forwards clicks and drags to the viewer,
//! and runs the per-frame scan handoff after rendering. The viewer, and with
//! it the scan worker, shuts down when the app is dropped.

use eframe::egui;
use std::time::Duration;

use super::canvas::{self, Hit};
use crate::log_collector::LogCollector;
use crate::models::{Point, Size};
use crate::viewer::{ClickModifier, ClickOutcome, FrameOutcome, Viewer, ViewerState};

/// How often to wake up and poll the scan worker when nothing else happens.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Transient UI state
#[derive(Debug, Clone, Default)]
pub struct UIState {
    /// Grab point inside the dragged entity
    pub drag_grab: Option<egui::Vec2>,
    /// Result of the last connection gesture, shown in the status bar
    pub gesture_message: Option<String>,
    /// Last frame that had a finished scan to look at
    pub last_frame_outcome: Option<FrameOutcome>,
}

/// Status bar text for the last handled scan result.
fn outcome_label(outcome: FrameOutcome) -> Option<&'static str> {
    match outcome {
        FrameOutcome::Idle => None,
        FrameOutcome::Accepted => Some("Last scan shown"),
        FrameOutcome::Deferred => Some("Last scan held back during a gesture"),
        FrameOutcome::Discarded => Some("Last scan dropped after a gesture"),
        FrameOutcome::Unavailable => Some("No live data"),
    }
}

pub struct ViewerApp {
    viewer: Viewer,
    log: Option<LogCollector>,
    ui_state: UIState,
}

impl ViewerApp {
    pub fn new(viewer: Viewer, log: Option<LogCollector>) -> Self {
        ViewerApp {
            viewer,
            log,
            ui_state: UIState::default(),
        }
    }

    fn modifier(input: &egui::InputState) -> ClickModifier {
        if input.modifiers.command {
            ClickModifier::Remove
        } else if input.modifiers.shift {
            ClickModifier::Add
        } else {
            ClickModifier::None
        }
    }

    fn handle_pointer(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let origin = response.rect.min.to_vec2();
        let (pressed, released, down, position, modifier) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.primary_down(),
                i.pointer.interact_pos(),
                Self::modifier(i),
            )
        });
        let Some(position) = position else {
            return;
        };
        let local = position - origin;

        if pressed && response.contains_pointer() {
            let hit = self.viewer.buffer().with_foreground(|fg| canvas::hit_test(fg, local));
            match (hit, modifier) {
                (Hit::Port { port, .. }, ClickModifier::Add | ClickModifier::Remove) => {
                    let outcome = self.viewer.click_port(port.as_str(), modifier);
                    self.record_click(outcome);
                }
                (Hit::Port { entity, .. }, ClickModifier::None) => {
                    let grab = self.viewer.buffer().with_foreground(|fg| {
                        fg.entity(entity.as_str())
                            .and_then(canvas::entity_rect)
                            .map(|rect| local - rect.min)
                    });
                    if self.viewer.begin_drag(entity.as_str()) {
                        self.ui_state.drag_grab = grab;
                    }
                }
                (Hit::Entity { entity, grab }, _) => {
                    if self.viewer.begin_drag(entity.as_str()) {
                        self.ui_state.drag_grab = Some(grab);
                    }
                }
                (Hit::Nothing, _) => {
                    let outcome = self.viewer.click_empty(modifier);
                    self.record_click(outcome);
                }
            }
        } else if down {
            if let Some(grab) = self.ui_state.drag_grab {
                let corner = local - grab;
                self.viewer.drag_to(Point::new(corner.x, corner.y));
            }
        }

        if released && self.viewer.gestures().drag_active() {
            self.viewer.end_drag();
            self.ui_state.drag_grab = None;
        }
    }

    fn record_click(&mut self, outcome: ClickOutcome) {
        let message = match outcome {
            ClickOutcome::Ignored => return,
            ClickOutcome::Armed(port) => format!("Selected {}; click a destination port", port),
            ClickOutcome::Connected { from, to } => format!("Connected {} -> {}", from, to),
            ClickOutcome::Disconnected { from, to } => format!("Disconnected {} -> {}", from, to),
            ClickOutcome::Failed(e) => e.user_message(),
            ClickOutcome::Cleared => "Cancelled".to_string(),
        };
        self.ui_state.gesture_message = Some(message);
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let (generation, entities, connections) = self.viewer.buffer().with_foreground(|fg| {
                (fg.generation(), fg.entity_count(), fg.connection_count())
            });
            ui.label(format!(
                "Generation {} | {} entities | {} connections | {} scans",
                generation,
                entities,
                connections,
                self.viewer.scans_completed()
            ));
            if let Some(label) = self.ui_state.last_frame_outcome.and_then(outcome_label) {
                ui.separator();
                ui.label(label);
            }
            if let Some(message) = &self.ui_state.gesture_message {
                ui.separator();
                ui.label(message);
            }
            if let Some(problem) = self.log.as_ref().and_then(|l| l.last_problem()) {
                ui.separator();
                ui.colored_label(egui::Color32::from_rgb(230, 160, 60), problem.message);
            }
        });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));

        let mut bounds = Size::default();
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.viewer.state() == ViewerState::Unavailable {
                ui.centered_and_justified(|ui| {
                    ui.heading("The network is not running.");
                });
                return;
            }

            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let origin = response.rect.min.to_vec2();
            bounds = Size::new(response.rect.width(), response.rect.height());

            self.handle_pointer(ui, &response);
            self.viewer
                .buffer()
                .with_foreground(|fg| canvas::paint(&painter, fg, origin, self.viewer.gestures()));
        });

        // Rendering has released the foreground; hand off the latest scan.
        let outcome = self.viewer.frame(bounds);
        if outcome == FrameOutcome::Accepted {
            ctx.request_repaint();
        }
        if outcome != FrameOutcome::Idle {
            self.ui_state.last_frame_outcome = Some(outcome);
        }
        ctx.request_repaint_after(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(FrameOutcome::Idle), None);
        assert_eq!(outcome_label(FrameOutcome::Accepted), Some("Last scan shown"));
        assert!(outcome_label(FrameOutcome::Deferred).unwrap().contains("gesture"));
        assert!(outcome_label(FrameOutcome::Discarded).unwrap().contains("dropped"));
    }

    #[test]
    fn test_ui_state_starts_empty() {
        let state = UIState::default();
        assert!(state.last_frame_outcome.is_none());
        assert!(state.drag_grab.is_none());
    }
}
