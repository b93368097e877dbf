//! Painter-facing frame types. Drawing itself belongs to whoever implements
//! [`Renderer`].

use std::io::Write;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    pub external: bool,
    pub x: f32,
    pub y: f32,
}

/// Indices into the node slice of the same frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PositionedEdge {
    pub source: usize,
    pub target: usize,
}

pub trait Renderer {
    fn paint(&mut self, nodes: &[PositionedNode], edges: &[PositionedEdge]);
}

/// Keeps the latest frame in memory.
#[derive(Clone, Debug, Default)]
pub struct SnapshotRecorder {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<PositionedEdge>,
    pub paints: usize,
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

impl Renderer for SnapshotRecorder {
    fn paint(&mut self, nodes: &[PositionedNode], edges: &[PositionedEdge]) {
        self.nodes.clear();
        self.nodes.extend_from_slice(nodes);
        self.edges.clear();
        self.edges.extend_from_slice(edges);
        self.paints += 1;
    }
}

#[derive(Serialize)]
struct Frame<'a> {
    frame: usize,
    nodes: &'a [PositionedNode],
    edges: &'a [PositionedEdge],
}

/// Writes every frame as one JSON line. Painting cannot fail, so the first
/// write error is kept and returned by [`finish`](Self::finish).
pub struct JsonLinesRenderer<W: Write> {
    writer: W,
    frames: usize,
    error: Option<std::io::Error>,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames: 0,
            error: None,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn finish(mut self) -> std::io::Result<W> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_frame(&mut self, nodes: &[PositionedNode], edges: &[PositionedEdge]) -> std::io::Result<()> {
        let frame = Frame {
            frame: self.frames,
            nodes,
            edges,
        };
        serde_json::to_writer(&mut self.writer, &frame)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn paint(&mut self, nodes: &[PositionedNode], edges: &[PositionedEdge]) {
        if self.error.is_some() {
            return;
        }

        match self.write_frame(nodes, edges) {
            Ok(()) => self.frames += 1,
            Err(error) => {
                tracing::warn!(%error, "failed to write layout frame");
                self.error = Some(error);
            }
        }
    }
}
