use crawl_graph_view::{GraphSession, StreamState};
use eframe::egui::{self, Align, Color32, Context, Layout, RichText, Vec2};

use crate::source::GraphSource;

use super::super::{GraphStats, ViewModel, ViewScratch};

fn state_color(state: StreamState) -> Color32 {
    match state {
        StreamState::Streaming => Color32::from_rgb(120, 190, 255),
        StreamState::Done => Color32::from_rgb(120, 210, 140),
        StreamState::Truncated => Color32::from_rgb(240, 190, 90),
        StreamState::Failed => Color32::from_rgb(235, 100, 90),
        StreamState::Cancelled => Color32::GRAY,
    }
}

impl ViewModel {
    pub(in crate::app) fn new(session: GraphSession) -> Self {
        let physics = *session.layout().config();

        Self {
            session,
            canvas: Default::default(),
            search: String::new(),
            selected: None,
            dragging: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            live_physics: true,
            physics,
            stats: GraphStats::default(),
            search_match_cache: None,
            view_scratch: ViewScratch::default(),
            visible_node_count: 0,
            visible_edge_count: 0,
        }
    }

    /// Recounts degrees and dangling edges when the store has grown.
    pub(in crate::app) fn refresh_stats(&mut self) {
        let store = self.session.store();
        let size = store.size();
        if size == self.stats.size && self.stats.in_degree.len() == size.nodes {
            return;
        }

        let stats = &mut self.stats;
        stats.size = size;
        stats.in_degree.clear();
        stats.in_degree.resize(size.nodes, 0);
        stats.out_degree.clear();
        stats.out_degree.resize(size.nodes, 0);

        let mut resolved = 0;
        for (source, target) in store.resolved_edges() {
            stats.out_degree[source] += 1;
            stats.in_degree[target] += 1;
            resolved += 1;
        }
        stats.dangling = size.edges - resolved;
        stats.max_degree = stats
            .in_degree
            .iter()
            .zip(&stats.out_degree)
            .map(|(incoming, outgoing)| incoming + outgoing)
            .max()
            .unwrap_or(0);
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context, source: &GraphSource) {
        self.refresh_stats();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("crawl-graph-view");
                    ui.separator();
                    ui.label(format!("job: {}", self.session.job_id()));
                    ui.label(format!("nodes: {}", self.stats.size.nodes));
                    ui.label(format!("edges: {}", self.stats.size.edges));
                    ui.label(format!("dangling: {}", self.stats.dangling))
                        .on_hover_text("Edges whose source or target has not arrived yet.");

                    let state = self.session.state();
                    ui.add(
                        egui::ProgressBar::new(self.session.progress() / 100.0)
                            .desired_width(180.0)
                            .show_percentage()
                            .animate(state == StreamState::Streaming),
                    );
                    ui.label(RichText::new(state.label()).color(state_color(state)));

                    let cancel_button =
                        ui.add_enabled(!state.is_terminal(), egui::Button::new("Cancel"));
                    if cancel_button.clicked() {
                        self.session.cancel();
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!(
                            "visible: {} nodes / {} edges",
                            self.visible_node_count, self.visible_edge_count
                        ));
                        ui.small(source.to_string());
                    });
                });

                if let Some(failure) = self.session.failure() {
                    ui.colored_label(state_color(self.session.state()), failure);
                }
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.canvas.nodes.is_empty() && self.session.state() == StreamState::Streaming {
                ui.vertical_centered(|ui| {
                    ui.add_space(120.0);
                    ui.heading("Waiting for graph data...");
                    ui.add_space(8.0);
                    ui.spinner();
                });
            } else {
                self.draw_graph(ui);
            }
        });
    }

    pub(in crate::app) fn set_selected(&mut self, selected: Option<usize>) {
        self.selected = selected;
    }
}

#[cfg(test)]
mod tests {
    use crawl_graph_view::SnapshotRecorder;

    use super::*;

    #[test]
    fn stats_track_degrees_and_dangling_edges() {
        let mut session = GraphSession::default();
        let mut recorder = SnapshotRecorder::new();
        session
            .feed_chunk(
                br#"{"nodes":[{"id":"a"},{"id":"b"}],"edges":[{"source":"a","target":"b"},{"source":"a","target":"zz"}]}"#,
                &mut recorder,
            )
            .expect("valid chunk");

        let mut model = ViewModel::new(session);
        model.refresh_stats();

        assert_eq!(model.stats.dangling, 1);
        assert_eq!(model.stats.out_degree, vec![1, 0]);
        assert_eq!(model.stats.in_degree, vec![0, 1]);
        assert_eq!(model.stats.max_degree, 1);
    }
}
