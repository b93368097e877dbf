use crate::graph::GraphSize;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleConfig {
    /// Repaint whenever the node count passes a multiple of this.
    pub node_step: usize,
    /// Repaint whenever the edge count passes a multiple of this.
    pub edge_step: usize,
    /// Smoothing term `K` in `seen / (seen + K)`.
    pub smoothing: f32,
    /// Ceiling for progress while the stream is still open.
    pub streaming_cap: f32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            node_step: 50,
            edge_step: 100,
            smoothing: 1_000.0,
            streaming_cap: 95.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepaintReason {
    NodeBoundary,
    EdgeBoundary,
    StreamEnd,
}

impl RepaintReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::NodeBoundary => "node boundary",
            Self::EdgeBoundary => "edge boundary",
            Self::StreamEnd => "stream end",
        }
    }
}

/// Decides when a growing graph is worth a layout pass and repaint, and keeps
/// the progress estimate shown while it streams.
#[derive(Clone, Debug)]
pub struct RenderScheduler {
    config: ScheduleConfig,
    progress: f32,
    completed: bool,
    repaints: u64,
}

/// True when growing from `before` to `after` passes at least one multiple of
/// `step`, however many units arrived at once.
fn crosses_boundary(before: usize, after: usize, step: usize) -> bool {
    step > 0 && after / step > before / step
}

impl RenderScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            progress: 0.0,
            completed: false,
            repaints: 0,
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Percentage in `[0, 100]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn repaints(&self) -> u64 {
        self.repaints
    }

    /// Estimate for a graph of `size` while the stream is open, before the
    /// monotonic clamp.
    pub fn estimate(&self, size: GraphSize) -> f32 {
        let seen = size.total() as f32;
        let denominator = seen + self.config.smoothing.max(0.0);
        let raw = if denominator > 0.0 {
            seen / denominator * 100.0
        } else {
            0.0
        };
        raw.min(self.config.streaming_cap.clamp(0.0, 100.0))
    }

    /// Records growth from `before` to `after`. Returns a reason when the
    /// growth passed a node or edge boundary.
    pub fn observe(&mut self, before: GraphSize, after: GraphSize) -> Option<RepaintReason> {
        if self.completed {
            return None;
        }

        self.advance_progress(after);

        let reason = if crosses_boundary(before.nodes, after.nodes, self.config.node_step) {
            Some(RepaintReason::NodeBoundary)
        } else if crosses_boundary(before.edges, after.edges, self.config.edge_step) {
            Some(RepaintReason::EdgeBoundary)
        } else {
            None
        };

        if let Some(reason) = reason {
            self.repaints += 1;
            tracing::debug!(
                reason = reason.label(),
                nodes = after.nodes,
                edges = after.edges,
                progress = self.progress,
                "repaint scheduled"
            );
        }
        reason
    }

    /// Raises progress for a graph of `size` without making a repaint
    /// decision, for growth that is painted some other way.
    pub fn advance_progress(&mut self, size: GraphSize) {
        if !self.completed {
            self.progress = self.progress.max(self.estimate(size));
        }
    }

    /// Marks the stream finished: progress jumps to 100 and exactly one final
    /// repaint is requested. Later calls return `None`.
    pub fn complete(&mut self) -> Option<RepaintReason> {
        if self.completed {
            return None;
        }

        self.completed = true;
        self.progress = 100.0;
        self.repaints += 1;
        Some(RepaintReason::StreamEnd)
    }

    /// Stops further repaint decisions without claiming completion. Progress
    /// stays where it was.
    pub fn halt(&mut self) {
        self.completed = true;
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn size(nodes: usize, edges: usize) -> GraphSize {
        GraphSize { nodes, edges }
    }

    #[test]
    fn boundary_crossing_catches_multi_unit_jumps() {
        assert!(crosses_boundary(49, 50, 50));
        assert!(crosses_boundary(30, 130, 50));
        assert!(!crosses_boundary(50, 99, 50));
        assert!(!crosses_boundary(0, 10, 0));
    }

    #[test]
    fn repaints_at_each_node_boundary() {
        let mut scheduler = RenderScheduler::default();
        let mut repainted_at = Vec::new();
        let mut before = size(0, 0);

        for nodes in (7..=160).step_by(7) {
            let after = size(nodes, 0);
            if scheduler.observe(before, after).is_some() {
                repainted_at.push(nodes);
            }
            before = after;
        }

        assert_eq!(repainted_at, vec![56, 105, 154]);
    }

    #[test]
    fn edge_boundary_triggers_without_node_growth() {
        let mut scheduler = RenderScheduler::default();
        assert_eq!(
            scheduler.observe(size(3, 90), size(3, 120)),
            Some(RepaintReason::EdgeBoundary)
        );
        assert_eq!(scheduler.observe(size(3, 120), size(3, 150)), None);
    }

    #[test]
    fn completion_repaints_exactly_once() {
        let mut scheduler = RenderScheduler::default();
        scheduler.observe(size(0, 0), size(3, 1));

        assert_eq!(scheduler.complete(), Some(RepaintReason::StreamEnd));
        assert_eq!(scheduler.complete(), None);
        assert_eq!(scheduler.observe(size(3, 1), size(500, 1)), None);
        assert_eq!(scheduler.progress(), 100.0);
        assert_eq!(scheduler.repaints(), 1);
    }

    #[test]
    fn progress_is_capped_while_streaming() {
        let mut scheduler = RenderScheduler::default();
        scheduler.observe(size(0, 0), size(1_000_000, 5_000_000));
        assert_eq!(scheduler.progress(), 95.0);
    }

    #[test]
    fn advancing_progress_does_not_count_a_repaint() {
        let mut scheduler = RenderScheduler::default();
        scheduler.advance_progress(size(60, 0));

        assert!(scheduler.progress() > 0.0);
        assert_eq!(scheduler.repaints(), 0);
        assert_eq!(scheduler.complete(), Some(RepaintReason::StreamEnd));
        assert_eq!(scheduler.repaints(), 1);
    }

    #[test]
    fn halted_scheduler_keeps_progress() {
        let mut scheduler = RenderScheduler::default();
        scheduler.observe(size(0, 0), size(500, 500));
        let before = scheduler.progress();
        scheduler.halt();

        assert_eq!(scheduler.progress(), before);
        assert_eq!(scheduler.complete(), None);
    }

    proptest! {
        #[test]
        fn progress_never_decreases_and_stays_below_cap(
            steps in proptest::collection::vec((0usize..80, 0usize..200), 1..60),
        ) {
            let mut scheduler = RenderScheduler::default();
            let mut current = size(0, 0);
            let mut last = scheduler.progress();

            for (nodes, edges) in steps {
                let next = size(current.nodes + nodes, current.edges + edges);
                scheduler.observe(current, next);
                prop_assert!(scheduler.progress() >= last);
                prop_assert!(scheduler.progress() <= 95.0);
                last = scheduler.progress();
                current = next;
            }

            scheduler.complete();
            prop_assert_eq!(scheduler.progress(), 100.0);
        }
    }
}
