use std::collections::HashMap;

use super::fragment::{EdgeUpdate, Fragment, NodeUpdate};

pub type NodeId = String;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub external: bool,
}

/// A hyperlink as admitted. Either endpoint may name a node the store has not
/// seen yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphSize {
    pub nodes: usize,
    pub edges: usize,
}

impl GraphSize {
    pub fn total(self) -> usize {
        self.nodes + self.edges
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeReport {
    pub appended: usize,
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FragmentReport {
    pub nodes: UpsertReport,
    pub edges: EdgeReport,
}

/// Deduplicated nodes plus every admitted edge, in arrival order.
///
/// Nodes are append-only: the index a node receives on first insert never
/// changes, which lets the layout keep per-node state in parallel vectors.
#[derive(Clone, Debug, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    index_by_id: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts unseen ids and overwrites label/external on known ones.
    /// Entries without an id are dropped and counted as skipped.
    pub fn upsert_nodes(&mut self, nodes: impl IntoIterator<Item = NodeUpdate>) -> UpsertReport {
        let mut report = UpsertReport::default();

        for update in nodes {
            let Some(id) = update.id.filter(|id| !id.is_empty()) else {
                report.skipped += 1;
                continue;
            };

            if let Some(&index) = self.index_by_id.get(&id) {
                let node = &mut self.nodes[index];
                if let Some(label) = update.label {
                    node.label = label;
                }
                if let Some(external) = update.external {
                    node.external = external;
                }
                report.updated += 1;
                continue;
            }

            let label = update.label.unwrap_or_else(|| id.clone());
            self.index_by_id.insert(id.clone(), self.nodes.len());
            self.nodes.push(Node {
                id,
                label,
                external: update.external.unwrap_or(false),
            });
            report.added += 1;
        }

        report
    }

    /// Appends every well-formed edge, known endpoints or not. Repeats are
    /// kept.
    pub fn append_edges(&mut self, edges: impl IntoIterator<Item = EdgeUpdate>) -> EdgeReport {
        let mut report = EdgeReport::default();

        for update in edges {
            match (update.source, update.target) {
                (Some(source), Some(target)) if !source.is_empty() && !target.is_empty() => {
                    self.edges.push(Edge { source, target });
                    report.appended += 1;
                }
                _ => report.skipped += 1,
            }
        }

        report
    }

    pub fn apply_fragment(&mut self, fragment: Fragment) -> FragmentReport {
        FragmentReport {
            nodes: self.upsert_nodes(fragment.nodes),
            edges: self.append_edges(fragment.edges),
        }
    }

    pub fn size(&self) -> GraphSize {
        GraphSize {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Node indices of both endpoints, once both have arrived.
    pub fn endpoints(&self, edge: &Edge) -> Option<(usize, usize)> {
        Some((self.index_of(&edge.source)?, self.index_of(&edge.target)?))
    }

    pub fn resolved_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edges.iter().filter_map(|edge| self.endpoints(edge))
    }

    pub fn dangling_edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| self.endpoints(edge).is_none())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, external: bool) -> NodeUpdate {
        NodeUpdate::new(id, format!("http://x/{id}"), external)
    }

    #[test]
    fn upsert_counts_only_new_ids() {
        let mut store = GraphStore::new();

        let first = store.upsert_nodes([node("a", false), node("b", false)]);
        assert_eq!(first.added, 2);

        let second = store.upsert_nodes([node("a", true), node("c", false)]);
        assert_eq!(second.added, 1);
        assert_eq!(second.updated, 1);
        assert_eq!(store.size().nodes, 3);
        assert!(store.node("a").is_some_and(|node| node.external));
    }

    #[test]
    fn duplicate_ids_within_one_batch_are_merged() {
        let mut store = GraphStore::new();
        let report = store.upsert_nodes([node("a", false), node("a", true)]);

        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(store.size().nodes, 1);
    }

    #[test]
    fn missing_fields_keep_existing_values() {
        let mut store = GraphStore::new();
        store.upsert_nodes([NodeUpdate::new("a", "Home", true)]);
        store.upsert_nodes([NodeUpdate {
            id: Some("a".into()),
            label: None,
            external: None,
        }]);

        let stored = store.node("a").expect("node a");
        assert_eq!(stored.label, "Home");
        assert!(stored.external);
    }

    #[test]
    fn new_node_without_label_uses_its_id() {
        let mut store = GraphStore::new();
        store.upsert_nodes([NodeUpdate {
            id: Some("42".into()),
            ..NodeUpdate::default()
        }]);

        let stored = store.node("42").expect("node 42");
        assert_eq!(stored.label, "42");
        assert!(!stored.external);
    }

    #[test]
    fn entries_without_id_are_skipped() {
        let mut store = GraphStore::new();
        let report = store.upsert_nodes([
            NodeUpdate::default(),
            NodeUpdate {
                id: Some(String::new()),
                ..NodeUpdate::default()
            },
            node("a", false),
        ]);

        assert_eq!(report.skipped, 2);
        assert_eq!(report.added, 1);
    }

    #[test]
    fn dangling_edges_resolve_once_endpoint_arrives() {
        let mut store = GraphStore::new();
        store.upsert_nodes([node("a", false)]);
        store.append_edges([EdgeUpdate::new("a", "b")]);

        assert_eq!(store.size().edges, 1);
        assert_eq!(store.dangling_edge_count(), 1);
        assert_eq!(store.resolved_edges().count(), 0);

        store.upsert_nodes([node("b", true)]);

        assert_eq!(store.dangling_edge_count(), 0);
        assert_eq!(store.resolved_edges().collect::<Vec<_>>(), vec![(0, 1)]);
    }

    #[test]
    fn repeated_edges_are_kept() {
        let mut store = GraphStore::new();
        let report = store.append_edges([EdgeUpdate::new("a", "b"), EdgeUpdate::new("a", "b")]);

        assert_eq!(report.appended, 2);
        assert_eq!(store.size().edges, 2);
    }

    #[test]
    fn edges_missing_an_endpoint_are_skipped() {
        let mut store = GraphStore::new();
        let report = store.append_edges([
            EdgeUpdate {
                source: Some("a".into()),
                target: None,
            },
            EdgeUpdate::default(),
            EdgeUpdate::new("a", "b"),
        ]);

        assert_eq!(report, EdgeReport { appended: 1, skipped: 2 });
    }

    #[test]
    fn node_indices_are_stable() {
        let mut store = GraphStore::new();
        store.upsert_nodes([node("a", false), node("b", false)]);
        store.upsert_nodes([node("b", true), node("c", false)]);

        assert_eq!(store.index_of("a"), Some(0));
        assert_eq!(store.index_of("b"), Some(1));
        assert_eq!(store.index_of("c"), Some(2));
    }
}
