mod state;

use std::io::{ErrorKind, Read};

use eframe::egui::vec2;

pub use state::{CancelToken, StreamState};

use crate::error::StreamError;
use crate::graph::GraphStore;
use crate::ingest::{Framing, StreamIngestor};
use crate::layout::{LayoutConfig, LayoutSimulation};
use crate::render::{PositionedEdge, PositionedNode, Renderer};
use crate::schedule::{RenderScheduler, RepaintReason, ScheduleConfig};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub job_id: String,
    pub framing: Framing,
    pub layout: LayoutConfig,
    pub schedule: ScheduleConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            job_id: "local".to_owned(),
            framing: Framing::default(),
            layout: LayoutConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

/// Everything that belongs to one crawl job's graph stream.
///
/// The store is written only through [`feed_chunk`](Self::feed_chunk) and
/// [`finish`](Self::finish); layout and scheduling only read it.
pub struct GraphSession {
    job_id: String,
    store: GraphStore,
    ingestor: StreamIngestor,
    layout: LayoutSimulation,
    scheduler: RenderScheduler,
    state: StreamState,
    cancel: CancelToken,
    failure: Option<String>,
    frame_nodes: Vec<PositionedNode>,
    frame_edges: Vec<PositionedEdge>,
}

impl GraphSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            job_id: config.job_id,
            store: GraphStore::new(),
            ingestor: StreamIngestor::new(config.framing),
            layout: LayoutSimulation::new(config.layout),
            scheduler: RenderScheduler::new(config.schedule),
            state: StreamState::Streaming,
            cancel: CancelToken::new(),
            failure: None,
            frame_nodes: Vec::new(),
            frame_edges: Vec::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn progress(&self) -> f32 {
        self.scheduler.progress()
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn layout(&self) -> &LayoutSimulation {
        &self.layout
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    /// Message of the error that ended the stream, if one did.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn transition(&mut self, next: StreamState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::debug!(
                from = self.state.label(),
                to = next.label(),
                "ignoring stream state transition"
            );
            return false;
        }

        tracing::info!(
            job = %self.job_id,
            from = self.state.label(),
            to = next.label(),
            nodes = self.store.size().nodes,
            edges = self.store.size().edges,
            "graph stream state changed"
        );
        self.state = next;
        true
    }

    /// Applies a cancel requested through a token clone.
    fn observe_cancellation(&mut self) -> bool {
        if self.state == StreamState::Streaming && self.cancel.is_cancelled() {
            self.transition(StreamState::Cancelled);
            self.scheduler.halt();
        }
        self.state == StreamState::Cancelled
    }

    /// Stops reading and ticking. The store and the last painted positions are
    /// left as they are.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.observe_cancellation();
    }

    /// Ingests one chunk. Returns the repaint reason when the chunk pushed the
    /// graph across a throttle boundary; the repaint has already happened.
    pub fn feed_chunk(
        &mut self,
        chunk: &[u8],
        renderer: &mut dyn Renderer,
    ) -> Result<Option<RepaintReason>, StreamError> {
        if self.observe_cancellation() || self.state.is_terminal() {
            return Ok(None);
        }

        let before = self.store.size();
        if let Err(error) = self.ingestor.push_chunk(chunk, &mut self.store) {
            self.record_failure(&error, renderer);
            return Err(error);
        }

        let reason = self.scheduler.observe(before, self.store.size());
        if reason.is_some() {
            self.repaint(renderer);
        }
        Ok(reason)
    }

    /// Closes the stream, forcing the final repaint. A truncated tail is
    /// reported as an error; the graph built so far is kept as final.
    pub fn finish(&mut self, renderer: &mut dyn Renderer) -> Result<StreamState, StreamError> {
        if self.observe_cancellation() || self.state.is_terminal() {
            return Ok(self.state);
        }

        let closed = self.ingestor.finish(&mut self.store);
        self.scheduler.advance_progress(self.store.size());

        match closed {
            Ok(_) => {
                self.transition(StreamState::Done);
                self.complete(renderer);
                Ok(StreamState::Done)
            }
            Err(error @ StreamError::Truncated { .. }) => {
                self.failure = Some(error.to_string());
                self.transition(StreamState::Truncated);
                self.complete(renderer);
                Err(error)
            }
            Err(error) => {
                self.record_failure(&error, renderer);
                Err(error)
            }
        }
    }

    /// Ends the stream because the byte source itself failed.
    pub fn fail(&mut self, error: StreamError, renderer: &mut dyn Renderer) {
        if self.observe_cancellation() || self.state.is_terminal() {
            return;
        }
        self.record_failure(&error, renderer);
    }

    fn record_failure(&mut self, error: &StreamError, renderer: &mut dyn Renderer) {
        tracing::warn!(job = %self.job_id, %error, "graph stream failed");
        self.failure = Some(error.to_string());
        if self.transition(StreamState::Failed) {
            self.scheduler.halt();
            self.repaint(renderer);
        }
    }

    fn complete(&mut self, renderer: &mut dyn Renderer) {
        if self.scheduler.complete().is_some() {
            self.repaint(renderer);
        }
    }

    /// Brings the layout up to date with the store, runs one tick and paints.
    fn repaint(&mut self, renderer: &mut dyn Renderer) {
        self.layout.sync(&self.store);
        self.layout.tick();
        self.paint(renderer);
    }

    /// Animation-frame step: one tick over the structure seen at the last
    /// repaint, then paint. No-op once settled or cancelled.
    pub fn advance_layout(&mut self, delta_seconds: f32, renderer: &mut dyn Renderer) -> bool {
        if self.observe_cancellation() || self.layout.is_settled() {
            return false;
        }

        let moving = self.layout.step(delta_seconds);
        self.paint(renderer);
        moving
    }

    /// Ticks until settled or `max_ticks`, then paints once. Returns ticks run.
    pub fn settle(&mut self, max_ticks: usize, renderer: &mut dyn Renderer) -> usize {
        if self.observe_cancellation() {
            return 0;
        }

        let ticks = self.layout.run_until_settled(max_ticks);
        if ticks > 0 {
            self.paint(renderer);
        }
        ticks
    }

    pub fn set_layout_config(&mut self, config: LayoutConfig) {
        self.layout.set_config(config);
    }

    /// Drags node `index` to `position` in layout space.
    pub fn move_node(&mut self, index: usize, x: f32, y: f32) -> bool {
        if self.state == StreamState::Cancelled {
            return false;
        }
        self.layout.set_position(index, vec2(x, y))
    }

    /// Paints the current positions of every laid-out node.
    pub fn paint(&mut self, renderer: &mut dyn Renderer) {
        let nodes = self.store.nodes();
        let bodies = self.layout.bodies();
        let count = bodies.len().min(nodes.len());

        self.frame_nodes.truncate(count);
        for (index, (node, body)) in nodes.iter().zip(bodies).take(count).enumerate() {
            match self.frame_nodes.get_mut(index) {
                Some(frame) => {
                    if frame.label != node.label {
                        frame.label.clone_from(&node.label);
                    }
                    frame.external = node.external;
                    frame.x = body.position.x;
                    frame.y = body.position.y;
                }
                None => self.frame_nodes.push(PositionedNode {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    external: node.external,
                    x: body.position.x,
                    y: body.position.y,
                }),
            }
        }

        self.frame_edges.clear();
        self.frame_edges.extend(
            self.layout
                .links()
                .iter()
                .filter(|(source, target)| *source < count && *target < count)
                .map(|&(source, target)| PositionedEdge { source, target }),
        );

        renderer.paint(&self.frame_nodes, &self.frame_edges);
    }

    /// Blocking read loop: one chunk per read, cancellation checked before
    /// every read. Returns the terminal state.
    pub fn run_stream<R: Read>(
        &mut self,
        mut reader: R,
        chunk_size: usize,
        renderer: &mut dyn Renderer,
    ) -> Result<StreamState, StreamError> {
        let mut buffer = vec![0u8; chunk_size.max(1)];

        loop {
            if self.observe_cancellation() || self.state.is_terminal() {
                return Ok(self.state);
            }

            let read = match reader.read(&mut buffer) {
                Ok(read) => read,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => {
                    let error = StreamError::Io(error);
                    self.record_failure(&error, renderer);
                    return Err(error);
                }
            };

            if read == 0 {
                return self.finish(renderer);
            }
            self.feed_chunk(&buffer[..read], renderer)?;
        }
    }
}

impl Default for GraphSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
