//! Incremental link-graph builder, force layout and repaint scheduling for a
//! crawl graph that arrives as a live byte stream.

pub mod error;
pub mod graph;
pub mod ingest;
pub mod layout;
pub mod render;
pub mod schedule;
pub mod session;

mod util;

pub use error::StreamError;
pub use graph::{Edge, GraphSize, GraphStore, Node};
pub use ingest::{Framing, StreamIngestor};
pub use layout::{LayoutConfig, LayoutSimulation};
pub use render::{JsonLinesRenderer, PositionedEdge, PositionedNode, Renderer, SnapshotRecorder};
pub use schedule::{RenderScheduler, RepaintReason, ScheduleConfig};
pub use session::{CancelToken, GraphSession, SessionConfig, StreamState};
