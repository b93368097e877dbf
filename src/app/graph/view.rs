use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{self, Align2, Color32, FontId, Rect, Sense, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::super::render_utils::{
    SELECTED_COLOR, blend_color, dim_color, draw_background, edge_visible, node_color, node_radius,
    world_to_screen,
};
use super::super::{SearchMatchCache, ViewModel};

pub(in crate::app) fn fuzzy_match_score(
    matcher: &SkimMatcherV2,
    text: &str,
    query: &str,
) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    fn update_screen_space(&mut self, rect: Rect) {
        let scratch = &mut self.view_scratch;
        scratch.screen_positions.clear();
        scratch.screen_radii.clear();

        let radius_scale = self.zoom.powf(0.40);
        for (index, node) in self.canvas.nodes.iter().enumerate() {
            scratch.screen_positions.push(world_to_screen(
                rect,
                self.pan,
                self.zoom,
                vec2(node.x, node.y),
            ));

            let degree = self.stats.in_degree.get(index).copied().unwrap_or(0)
                + self.stats.out_degree.get(index).copied().unwrap_or(0);
            scratch
                .screen_radii
                .push((node_radius(degree, self.stats.max_degree) * radius_scale).clamp(2.0, 30.0));
        }

        Self::visible_indices_into(
            rect,
            &scratch.screen_positions,
            &scratch.screen_radii,
            &mut scratch.visible_indices,
        );
        scratch.visible_mask.clear();
        scratch.visible_mask.resize(self.canvas.nodes.len(), false);
        for &index in &scratch.visible_indices {
            scratch.visible_mask[index] = true;
        }
        self.visible_node_count = scratch.visible_indices.len();
    }

    /// Indices of painted nodes whose label or id fuzzily matches the search.
    pub(in crate::app) fn cached_search_matches(&mut self) -> Option<Arc<HashSet<usize>>> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        let node_count = self.canvas.nodes.len();
        if let Some(cached) = &self.search_match_cache
            && cached.node_count == node_count
            && cached.query == query
        {
            return Some(Arc::clone(&cached.matches));
        }

        let matcher = SkimMatcherV2::default();
        let matches = self
            .canvas
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                fuzzy_match_score(&matcher, &node.label, query).is_some()
                    || fuzzy_match_score(&matcher, &node.id, query).is_some()
            })
            .map(|(index, _)| index)
            .collect::<HashSet<_>>();
        let matches = Arc::new(matches);

        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            node_count,
            matches: Arc::clone(&matches),
        });
        Some(matches)
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        draw_background(&painter, rect, self.pan, self.zoom);
        self.handle_graph_zoom(ui, rect, &response);

        self.update_screen_space(rect);
        let hovered = Self::hovered_index(
            ui,
            &self.view_scratch.visible_indices,
            &self.view_scratch.screen_positions,
            &self.view_scratch.screen_radii,
        );

        if response.clicked_by(egui::PointerButton::Primary) {
            self.set_selected(hovered);
        }
        let node_dragged = self.handle_node_drag(rect, &response, hovered);
        self.handle_graph_pan(&response);

        let frame_delta_seconds = ui
            .ctx()
            .input(|input| input.stable_dt)
            .clamp(1.0 / 240.0, 1.0 / 20.0);
        let physics_moving =
            self.live_physics && self.session.advance_layout(frame_delta_seconds, &mut self.canvas);
        if physics_moving || node_dragged || response.dragged() {
            ui.ctx().request_repaint();
        }

        self.update_screen_space(rect);
        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = if node_dragged {
                    egui::CursorIcon::Grabbing
                } else {
                    egui::CursorIcon::PointingHand
                };
            });
        }

        let search_matches = self.cached_search_matches();
        let search_active = search_matches
            .as_ref()
            .is_some_and(|matches| !matches.is_empty());
        let selected = self.selected;
        let zoom_sqrt = self.zoom.sqrt();
        let scratch = &self.view_scratch;

        let mut visible_edge_count = 0usize;
        for edge in &self.canvas.edges {
            let (Some(&start), Some(&end)) = (
                scratch.screen_positions.get(edge.source),
                scratch.screen_positions.get(edge.target),
            ) else {
                continue;
            };

            let endpoint_visible =
                scratch.visible_mask[edge.source] || scratch.visible_mask[edge.target];
            if !endpoint_visible && !edge_visible(rect, start, end, 2.5) {
                continue;
            }

            let touches_selected =
                selected.is_some_and(|index| index == edge.source || index == edge.target);
            let (line_width, line_color) = if touches_selected {
                (
                    (2.2 * zoom_sqrt).clamp(1.2, 4.0),
                    Color32::from_rgb(241, 146, 94),
                )
            } else if selected.is_some() || search_active {
                (
                    (0.8 * zoom_sqrt).clamp(0.45, 2.0),
                    Color32::from_rgba_unmultiplied(80, 90, 104, 110),
                )
            } else {
                (
                    (1.1 * zoom_sqrt).clamp(0.6, 3.0),
                    Color32::from_rgba_unmultiplied(110, 118, 128, 170),
                )
            };

            painter.line_segment([start, end], Stroke::new(line_width, line_color));
            visible_edge_count += 1;
        }
        self.visible_edge_count = visible_edge_count;

        let show_all_labels = self.zoom >= 1.8;
        for &index in &scratch.visible_indices {
            let node = &self.canvas.nodes[index];
            let position = scratch.screen_positions[index];
            let radius = scratch.screen_radii[index];
            let is_selected = selected == Some(index);
            let is_hovered = hovered == Some(index);
            let is_match = search_matches
                .as_ref()
                .is_some_and(|matches| matches.contains(&index));

            let base = node_color(node.external);
            let fill = if is_selected {
                SELECTED_COLOR
            } else if is_hovered {
                blend_color(base, Color32::WHITE, 0.35)
            } else if search_active && !is_match {
                dim_color(base, 0.35)
            } else {
                base
            };

            painter.circle_filled(position, radius, fill);
            if is_selected || is_match {
                painter.circle_stroke(
                    position,
                    radius + 2.0,
                    Stroke::new(1.6, blend_color(fill, Color32::WHITE, 0.5)),
                );
            }

            if show_all_labels || is_selected || is_hovered || is_match {
                painter.text(
                    position + vec2(radius + 4.0, 0.0),
                    Align2::LEFT_CENTER,
                    &node.label,
                    FontId::proportional(12.0),
                    Color32::from_gray(220),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_match_ignores_case() {
        let matcher = SkimMatcherV2::default();
        assert!(fuzzy_match_score(&matcher, "https://Example.org/About", "about").is_some());
        assert!(fuzzy_match_score(&matcher, "https://example.org/", "zzz").is_none());
    }
}
