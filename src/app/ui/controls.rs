use std::ops::RangeInclusive;

use eframe::egui::{self, Key, Response, Ui, Vec2};
use fuzzy_matcher::skim::SkimMatcherV2;

use super::super::ViewModel;
use super::super::graph::fuzzy_match_score;

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;
const SEARCH_RESULT_ROWS: usize = 30;
const SETTLE_BUTTON_TICKS: usize = 600;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f32,
    negative_secs: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

/// Holding an arrow key on a focused slider speeds up the longer it is held.
fn apply_slider_arrow_acceleration(
    ui: &Ui,
    response: &Response,
    value: &mut f32,
    range: &RangeInclusive<f32>,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });

    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    hold_state.positive_secs = if increase_down {
        hold_state.positive_secs + delta_time
    } else {
        0.0
    };
    hold_state.negative_secs = if decrease_down {
        hold_state.negative_secs + delta_time
    } else {
        0.0
    };
    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));

    let direction = (increase_down as i8) - (decrease_down as i8);
    if direction == 0 {
        return false;
    }

    let hold_secs = if direction > 0 {
        hold_state.positive_secs
    } else {
        hold_state.negative_secs
    };
    let step = ((range.end() - range.start()) / 200.0).max(0.0005);
    let delta = direction as f32 * step * SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs) * delta_time;

    let old_value = *value;
    *value = (*value + delta).clamp(*range.start(), *range.end());
    ui.ctx().request_repaint();
    (*value - old_value).abs() > f32::EPSILON
}

fn physics_slider(
    ui: &mut Ui,
    value: &mut f32,
    range: RangeInclusive<f32>,
    text: &str,
    hover: &str,
    logarithmic: bool,
) -> bool {
    let slider = ui
        .add(
            egui::Slider::new(value, range.clone())
                .text(text)
                .logarithmic(logarithmic)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hover);
    if slider.hovered() {
        slider.request_focus();
    }
    slider.changed() | apply_slider_arrow_acceleration(ui, &slider, value, &range)
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Search (URL or node id)")
            .on_hover_text("Fuzzy-highlight matching nodes without changing the layout.");
        ui.text_edit_singleline(&mut self.search)
            .on_hover_text("Type to highlight matching nodes, then pick one below to select it.");
        self.draw_search_results(ui);

        ui.separator();

        ui.checkbox(&mut self.live_physics, "Live physics simulation")
            .on_hover_text("Keep ticking the layout every frame until it settles.");

        ui.horizontal(|ui| {
            if ui
                .button("Settle now")
                .on_hover_text("Run the layout to rest in one go.")
                .clicked()
            {
                self.session.settle(SETTLE_BUTTON_TICKS, &mut self.canvas);
            }
            if ui.button("Reset view").clicked() {
                self.pan = Vec2::ZERO;
                self.zoom = 1.0;
            }
        });

        let layout = self.session.layout();
        ui.small(format!(
            "alpha {:.3}  ticks {}  {}",
            layout.alpha(),
            layout.ticks(),
            if layout.is_settled() { "settled" } else { "moving" }
        ));

        let mut changed = false;
        ui.collapsing("Physics tuning", |ui| {
            changed |= physics_slider(
                ui,
                &mut self.physics.repulsion_strength,
                100.0..=40_000.0,
                "Repulsion",
                "How strongly every pair of nodes pushes apart.",
                true,
            );
            changed |= physics_slider(
                ui,
                &mut self.physics.link_distance,
                10.0..=400.0,
                "Link distance",
                "Rest length of the spring along each link.",
                false,
            );
            changed |= physics_slider(
                ui,
                &mut self.physics.spring_strength,
                0.001..=0.5,
                "Spring",
                "How hard links pull toward their rest length.",
                true,
            );
            changed |= physics_slider(
                ui,
                &mut self.physics.center_strength,
                0.0..=0.1,
                "Centering",
                "Pull of every node toward the canvas origin.",
                false,
            );
            changed |= physics_slider(
                ui,
                &mut self.physics.velocity_damping,
                0.05..=0.95,
                "Velocity damping",
                "Share of velocity a node keeps from one tick to the next.",
                false,
            );

            if ui.button("Restore defaults").clicked() {
                self.physics = Default::default();
                changed = true;
            }
        });

        if changed {
            self.session.set_layout_config(self.physics);
        }
    }

    fn draw_search_results(&mut self, ui: &mut Ui) {
        let query = self.search.trim();
        if query.is_empty() {
            return;
        }

        let matcher = SkimMatcherV2::default();
        let mut results = self
            .canvas
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                fuzzy_match_score(&matcher, &node.label, query).map(|score| (score, index))
            })
            .collect::<Vec<_>>();
        results.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        ui.small(format!("{} matching nodes", results.len()));
        let mut picked = None;
        egui::ScrollArea::vertical()
            .id_salt("search_results_scroll")
            .max_height(220.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for &(_, index) in results.iter().take(SEARCH_RESULT_ROWS) {
                    let node = &self.canvas.nodes[index];
                    if ui
                        .selectable_label(self.selected == Some(index), node.label.as_str())
                        .on_hover_text(node.id.as_str())
                        .clicked()
                    {
                        picked = Some(index);
                    }
                }
            });

        if let Some(index) = picked {
            self.set_selected(Some(index));
        }
    }
}
