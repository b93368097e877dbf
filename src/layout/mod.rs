mod forces;
mod quadtree;

use std::f32::consts::PI;

use eframe::egui::{Vec2, vec2};

use crate::graph::{GraphSize, GraphStore};
use crate::util::{separation_direction, stable_pair};
use forces::{RepulsionParams, accumulate_repulsion};
use quadtree::BarnesHutTree;

const GOLDEN_ANGLE: f32 = PI * 0.763_932;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Numerator of the inverse-square push between every pair of nodes.
    pub repulsion_strength: f32,
    /// Rest length of a link spring.
    pub link_distance: f32,
    pub spring_strength: f32,
    /// Pull toward `center`, proportional to distance from it.
    pub center_strength: f32,
    /// Fraction of velocity kept per tick.
    pub velocity_damping: f32,
    /// Distances below this are clamped before dividing.
    pub min_distance: f32,
    /// Mean node speed under which the layout counts as settled.
    pub settle_speed: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    /// Alpha restored whenever the graph or a position changes.
    pub reheat_alpha: f32,
    /// Barnes-Hut opening angle.
    pub theta: f32,
    pub max_force: f32,
    pub max_speed: f32,
    pub center: Vec2,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            repulsion_strength: 4_000.0,
            link_distance: 60.0,
            spring_strength: 0.05,
            center_strength: 0.01,
            velocity_damping: 0.6,
            min_distance: 1.0,
            settle_speed: 0.02,
            alpha_decay: 0.0228,
            alpha_min: 0.001,
            reheat_alpha: 0.6,
            theta: 0.72,
            max_force: 240.0,
            max_speed: 40.0,
            center: Vec2::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Default)]
struct PhysicsScratch {
    forces: Vec<Vec2>,
    positions: Vec<Vec2>,
}

/// Force-directed placement for the nodes of a [`GraphStore`].
///
/// Bodies are indexed like the store's nodes. The simulation only sees the
/// graph as of the last [`sync`](Self::sync); it never mutates the store.
#[derive(Debug)]
pub struct LayoutSimulation {
    config: LayoutConfig,
    bodies: Vec<Body>,
    links: Vec<(usize, usize)>,
    synced: GraphSize,
    alpha: f32,
    settled: bool,
    ticks: u64,
    scratch: PhysicsScratch,
}

impl LayoutSimulation {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            bodies: Vec::new(),
            links: Vec::new(),
            synced: GraphSize::default(),
            alpha: 1.0,
            settled: true,
            ticks: 0,
            scratch: PhysicsScratch::default(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Replaces the tuning and wakes the simulation if anything changed.
    pub fn set_config(&mut self, config: LayoutConfig) {
        if self.config != config {
            self.config = config;
            self.reheat();
        }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn position(&self, index: usize) -> Option<Vec2> {
        self.bodies.get(index).map(|body| body.position)
    }

    /// Deduplicated, undirected, resolved links between distinct nodes.
    pub fn links(&self) -> &[(usize, usize)] {
        &self.links
    }

    pub fn synced_size(&self) -> GraphSize {
        self.synced
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Picks up nodes and edges added since the last sync. New nodes are
    /// placed before the next tick: next to an already placed neighbour when
    /// one exists, otherwise on a spiral around the center.
    pub fn sync(&mut self, store: &GraphStore) -> bool {
        let size = store.size();
        if size == self.synced {
            return false;
        }

        let mut links = store
            .resolved_edges()
            .filter(|(source, target)| source != target)
            .map(|(source, target)| (source.min(target), source.max(target)))
            .collect::<Vec<_>>();
        links.sort_unstable();
        links.dedup();
        self.links = links;

        let placed = self.bodies.len();
        let nodes = store.nodes();
        if nodes.len() > placed {
            let mut anchors = vec![None; nodes.len() - placed];
            for &(low, high) in &self.links {
                if low < placed && high >= placed {
                    anchors[high - placed].get_or_insert(low);
                }
            }

            self.bodies.reserve(nodes.len() - placed);
            for (offset, node) in nodes[placed..].iter().enumerate() {
                let index = placed + offset;
                let position = self.initial_position(index, &node.id, anchors[offset]);
                self.bodies.push(Body {
                    position,
                    velocity: Vec2::ZERO,
                });
            }
        }

        tracing::debug!(
            nodes = size.nodes,
            links = self.links.len(),
            new_bodies = nodes.len() - placed,
            "layout synced with graph"
        );

        self.synced = size;
        self.reheat();
        true
    }

    fn initial_position(&self, index: usize, id: &str, anchor: Option<usize>) -> Vec2 {
        let (jx, jy) = stable_pair(id);
        let jitter = vec2(jx, jy);

        if let Some(anchor) = anchor {
            let direction = if jitter.length_sq() > 1e-6 {
                jitter.normalized()
            } else {
                separation_direction(anchor, index)
            };
            return self.bodies[anchor].position + direction * self.config.link_distance;
        }

        let radius = self.config.link_distance * 0.5 * (0.5 + index as f32).sqrt();
        let angle = index as f32 * GOLDEN_ANGLE;
        self.config.center
            + vec2(angle.cos(), angle.sin()) * radius
            + jitter * (self.config.link_distance * 0.1)
    }

    /// Moves one body, e.g. when dragged, and wakes the simulation.
    pub fn set_position(&mut self, index: usize, position: Vec2) -> bool {
        let Some(body) = self.bodies.get_mut(index) else {
            return false;
        };
        if !(position.x.is_finite() && position.y.is_finite()) {
            return false;
        }

        body.position = position;
        body.velocity = Vec2::ZERO;
        self.reheat();
        true
    }

    fn reheat(&mut self) {
        self.alpha = self.alpha.max(self.config.reheat_alpha);
        self.settled = false;
    }

    /// One tick at the nominal 60 Hz frame time.
    pub fn tick(&mut self) -> bool {
        self.step(1.0 / 60.0)
    }

    /// Advances the simulation by `delta_seconds`. Returns whether anything is
    /// still moving; a settled simulation is a no-op until the next sync.
    pub fn step(&mut self, delta_seconds: f32) -> bool {
        if self.settled {
            return false;
        }

        let node_count = self.bodies.len();
        if node_count == 0 {
            self.settled = true;
            return false;
        }
        self.ticks += 1;

        let config = self.config;
        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(node_count, Vec2::ZERO);
        scratch.positions.clear();
        scratch
            .positions
            .extend(self.bodies.iter().map(|body| body.position));

        let forces = &mut scratch.forces;
        let positions = &scratch.positions;

        if node_count > 1
            && let Some(tree) = BarnesHutTree::build(positions)
        {
            let params = RepulsionParams {
                strength: config.repulsion_strength,
                min_distance_sq: config.min_distance * config.min_distance,
                theta: config.theta,
            };
            for (index, force) in forces.iter_mut().enumerate() {
                accumulate_repulsion(&tree, tree.root(), index, positions, params, force);
            }
        }

        for &(source, target) in &self.links {
            if source >= node_count || target >= node_count {
                continue;
            }

            let delta = positions[target] - positions[source];
            let length = delta.length();
            let direction = if length > 1e-4 {
                delta / length
            } else {
                separation_direction(source, target)
            };
            let stretch =
                (length.max(config.min_distance) - config.link_distance) * config.spring_strength;

            forces[source] += direction * stretch;
            forces[target] -= direction * stretch;
        }

        for (force, position) in forces.iter_mut().zip(positions) {
            *force += (config.center - *position) * config.center_strength;
        }

        let time_step_scale = (delta_seconds * 60.0).clamp(0.25, 3.0);
        let damping_factor = config.velocity_damping.clamp(0.0, 0.99).powf(time_step_scale);
        let max_force_sq = config.max_force * config.max_force;
        let max_speed_sq = config.max_speed * config.max_speed;
        let min_sleep_speed_sq = 0.02 * 0.02;
        let min_sleep_force_sq = 0.08 * 0.08;
        let mut speed_sum = 0.0;
        let mut average_velocity = Vec2::ZERO;

        for (body, force_value) in self.bodies.iter_mut().zip(forces.iter()) {
            let mut force = *force_value * self.alpha;
            if !force.is_finite() {
                force = Vec2::ZERO;
            }
            let force_sq = force.length_sq();
            if force_sq > max_force_sq {
                force *= config.max_force / force_sq.sqrt();
            }

            let mut velocity = (body.velocity + force * time_step_scale) * damping_factor;
            let mut speed_sq = velocity.length_sq();
            if speed_sq > max_speed_sq {
                velocity *= config.max_speed / speed_sq.sqrt();
                speed_sq = max_speed_sq;
            }

            if speed_sq < min_sleep_speed_sq && force_sq < min_sleep_force_sq {
                velocity = Vec2::ZERO;
                speed_sq = 0.0;
            }

            body.velocity = velocity;
            body.position += velocity * time_step_scale;
            average_velocity += velocity;
            speed_sum += speed_sq.sqrt();
        }

        if node_count > 1 {
            average_velocity /= node_count as f32;
            if average_velocity.length_sq() > 1e-12 {
                for body in &mut self.bodies {
                    body.velocity -= average_velocity;
                }
            }
        }

        let mut centroid = Vec2::ZERO;
        for body in &self.bodies {
            centroid += body.position;
        }
        let drift = centroid / node_count as f32 - config.center;
        if drift.is_finite() && drift.length_sq() > 1e-12 {
            for body in &mut self.bodies {
                body.position -= drift;
            }
        }

        let mean_speed = speed_sum / node_count as f32;
        self.alpha *= 1.0 - config.alpha_decay.clamp(0.0, 1.0);
        if mean_speed < config.settle_speed || self.alpha < config.alpha_min {
            tracing::debug!(ticks = self.ticks, mean_speed, alpha = self.alpha, "layout settled");
            self.settled = true;
        }

        !self.settled
    }

    /// Ticks until settled or `max_ticks` have run. Returns ticks executed.
    pub fn run_until_settled(&mut self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && !self.settled {
            self.tick();
            ticks += 1;
        }
        ticks
    }
}

impl Default for LayoutSimulation {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeUpdate, NodeUpdate};

    fn store_with(ids: &[&str], edges: &[(&str, &str)]) -> GraphStore {
        let mut store = GraphStore::new();
        store.upsert_nodes(ids.iter().map(|id| NodeUpdate::new(*id, *id, false)));
        store.append_edges(edges.iter().map(|(s, t)| EdgeUpdate::new(*s, *t)));
        store
    }

    fn pair_distance_after_settling(edges: &[(&str, &str)]) -> (f32, usize) {
        let store = store_with(&["a", "b"], edges);
        let mut layout = LayoutSimulation::default();
        layout.sync(&store);
        layout.set_position(0, vec2(-50.0, 0.0));
        layout.set_position(1, vec2(50.0, 0.0));

        let ticks = layout.run_until_settled(2_000);
        assert!(layout.is_settled());
        let distance = (layout.position(0).expect("a") - layout.position(1).expect("b")).length();
        (distance, ticks)
    }

    #[test]
    fn linked_pair_settles_closer_than_unlinked_pair() {
        let (linked, linked_ticks) = pair_distance_after_settling(&[("a", "b")]);
        let (unlinked, unlinked_ticks) = pair_distance_after_settling(&[]);

        assert!(linked_ticks < 2_000);
        assert!(unlinked_ticks < 2_000);
        assert!(linked < unlinked, "linked {linked} vs unlinked {unlinked}");
        assert!(linked < 90.0);
    }

    #[test]
    fn new_nodes_get_finite_positions_on_sync() {
        let mut store = store_with(&["a"], &[]);
        let mut layout = LayoutSimulation::default();
        assert!(layout.sync(&store));
        assert_eq!(layout.bodies().len(), 1);

        store.upsert_nodes([NodeUpdate::new("b", "b", true)]);
        store.append_edges([EdgeUpdate::new("a", "b")]);
        assert!(layout.sync(&store));

        assert_eq!(layout.bodies().len(), 2);
        for body in layout.bodies() {
            assert!(body.position.is_finite());
        }
        let gap = (layout.position(0).expect("a") - layout.position(1).expect("b")).length();
        assert!((gap - layout.config().link_distance).abs() < 1e-3);
    }

    #[test]
    fn sync_without_changes_is_a_no_op() {
        let store = store_with(&["a", "b"], &[("a", "b")]);
        let mut layout = LayoutSimulation::default();
        assert!(layout.sync(&store));
        layout.run_until_settled(5_000);

        assert!(!layout.sync(&store));
        assert!(layout.is_settled());
        assert!(!layout.tick());
    }

    #[test]
    fn links_are_deduplicated_and_skip_dangling_and_self_edges() {
        let store = store_with(
            &["a", "b"],
            &[("a", "b"), ("b", "a"), ("a", "b"), ("a", "a"), ("a", "zzz")],
        );
        let mut layout = LayoutSimulation::default();
        layout.sync(&store);

        assert_eq!(layout.links(), &[(0, 1)]);
    }

    #[test]
    fn coincident_nodes_separate_without_nan() {
        let store = store_with(&["a", "b", "c"], &[]);
        let mut layout = LayoutSimulation::default();
        layout.sync(&store);
        for index in 0..3 {
            layout.set_position(index, Vec2::ZERO);
        }

        for _ in 0..20 {
            layout.tick();
        }

        let positions = layout
            .bodies()
            .iter()
            .map(|body| body.position)
            .collect::<Vec<_>>();
        assert!(positions.iter().all(|position| position.is_finite()));
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                assert!((positions[i] - positions[j]).length() > 1.0);
            }
        }
    }

    #[test]
    fn isolated_nodes_do_not_collapse() {
        let ids = (0..30).map(|i| format!("n{i}")).collect::<Vec<_>>();
        let refs = ids.iter().map(String::as_str).collect::<Vec<_>>();
        let store = store_with(&refs, &[]);
        let mut layout = LayoutSimulation::default();
        layout.sync(&store);
        layout.run_until_settled(3_000);

        let bodies = layout.bodies();
        let mut closest = f32::INFINITY;
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                closest = closest.min((bodies[i].position - bodies[j].position).length());
            }
        }
        assert!(closest > 5.0, "closest pair {closest}");

        let centroid = bodies.iter().fold(Vec2::ZERO, |sum, body| sum + body.position)
            / bodies.len() as f32;
        assert!(centroid.length() < 1e-2);
    }

    #[test]
    fn settles_within_bounded_ticks_for_larger_graphs() {
        let ids = (0..120).map(|i| format!("n{i}")).collect::<Vec<_>>();
        let refs = ids.iter().map(String::as_str).collect::<Vec<_>>();
        let edges = (1..120)
            .map(|i| (refs[i], refs[(i - 1) / 3]))
            .collect::<Vec<_>>();
        let store = store_with(&refs, &edges);
        let mut layout = LayoutSimulation::default();
        layout.sync(&store);

        let ticks = layout.run_until_settled(10_000);
        assert!(layout.is_settled());
        assert!(ticks <= 400, "took {ticks} ticks");
        assert!(layout.bodies().iter().all(|body| body.position.is_finite()));
    }

    #[test]
    fn empty_graph_is_settled() {
        let mut layout = LayoutSimulation::default();
        assert!(layout.is_settled());
        assert!(!layout.tick());
        assert_eq!(layout.run_until_settled(10), 0);
    }

    #[test]
    fn set_position_rejects_unknown_index_and_non_finite_points() {
        let store = store_with(&["a"], &[]);
        let mut layout = LayoutSimulation::default();
        layout.sync(&store);

        assert!(!layout.set_position(3, Vec2::ZERO));
        assert!(!layout.set_position(0, vec2(f32::NAN, 0.0)));
        assert!(layout.set_position(0, vec2(10.0, 10.0)));
    }
}
