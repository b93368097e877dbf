use eframe::egui::{self, RichText, Ui};

use super::super::ViewModel;

const RELATED_ROWS: usize = 48;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(selected) = self.selected else {
            ui.label("Select a node from the graph or the search results.");
            return;
        };

        let Some(node) = self.session.store().nodes().get(selected) else {
            ui.label("Selected node is not part of the graph.");
            return;
        };

        ui.label(RichText::new(node.label.as_str()).strong());
        ui.small(format!("id: {}", node.id));
        ui.add_space(6.0);

        ui.label(if node.external {
            "External link (outside the crawled site)"
        } else {
            "Internal page"
        });
        ui.label(format!(
            "Outgoing links: {}",
            self.stats.out_degree.get(selected).copied().unwrap_or(0)
        ));
        ui.label(format!(
            "Incoming links: {}",
            self.stats.in_degree.get(selected).copied().unwrap_or(0)
        ));
        if let Some(position) = self.session.layout().position(selected) {
            ui.label(format!("Position: ({:.1}, {:.1})", position.x, position.y));
        }

        ui.separator();
        ui.label(RichText::new("Linked nodes").strong());

        let store = self.session.store();
        let mut related = store
            .resolved_edges()
            .filter_map(|(source, target)| {
                if source == selected && target != selected {
                    Some((target, "out"))
                } else if target == selected && source != selected {
                    Some((source, "in"))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        related.sort_unstable();
        related.dedup();

        if related.is_empty() {
            ui.label("No resolved links yet.");
            return;
        }

        let mut picked = None;
        egui::ScrollArea::vertical()
            .id_salt("related_nodes_scroll")
            .max_height(420.0)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for &(index, direction) in related.iter().take(RELATED_ROWS) {
                    let Some(other) = store.nodes().get(index) else {
                        continue;
                    };
                    let label = format!("[{direction}] {}", other.label);
                    if ui.link(label).on_hover_text(other.id.as_str()).clicked() {
                        picked = Some(index);
                    }
                }
                if related.len() > RELATED_ROWS {
                    ui.small(format!("... and {} more", related.len() - RELATED_ROWS));
                }
            });

        if let Some(index) = picked {
            self.set_selected(Some(index));
        }
    }
}
