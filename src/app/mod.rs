use std::collections::HashSet;
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::thread;
use std::time::Duration;

use crawl_graph_view::{
    CancelToken, GraphSession, GraphSize, LayoutConfig, SessionConfig, SnapshotRecorder, StreamError,
};
use eframe::egui::{self, Context, Pos2, Vec2};

use crate::source::GraphSource;

mod graph;
mod render_utils;
mod ui;

/// Chunks applied per UI frame; the rest wait for the next frame.
const MAX_CHUNKS_PER_FRAME: usize = 64;
const FEED_BACKLOG: usize = 256;

enum FeedMessage {
    Chunk(Vec<u8>),
    End,
    Failed(io::Error),
}

pub struct GraphViewerApp {
    source: GraphSource,
    feed: Option<Receiver<FeedMessage>>,
    model: ViewModel,
}

struct ViewModel {
    session: GraphSession,
    canvas: SnapshotRecorder,
    search: String,
    selected: Option<usize>,
    dragging: Option<usize>,
    pan: Vec2,
    zoom: f32,
    live_physics: bool,
    physics: LayoutConfig,
    stats: GraphStats,
    search_match_cache: Option<SearchMatchCache>,
    view_scratch: ViewScratch,
    visible_node_count: usize,
    visible_edge_count: usize,
}

/// Per-node link counts, rebuilt whenever the store grows.
#[derive(Default)]
struct GraphStats {
    size: GraphSize,
    dangling: usize,
    in_degree: Vec<u32>,
    out_degree: Vec<u32>,
    max_degree: u32,
}

struct SearchMatchCache {
    query: String,
    node_count: usize,
    matches: Arc<HashSet<usize>>,
}

#[derive(Default)]
struct ViewScratch {
    screen_positions: Vec<Pos2>,
    screen_radii: Vec<f32>,
    visible_indices: Vec<usize>,
    visible_mask: Vec<bool>,
}

/// Copies the source into the channel in chunks of `chunk_size` until the
/// source ends, fails, the receiver goes away or `cancel` is set.
fn pump_feed(
    mut reader: impl Read,
    chunk_size: usize,
    cancel: &CancelToken,
    tx: &SyncSender<FeedMessage>,
    notify: impl Fn(),
) {
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let message = match reader.read(&mut buffer) {
            Ok(0) => FeedMessage::End,
            Ok(read) => FeedMessage::Chunk(buffer[..read].to_vec()),
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => FeedMessage::Failed(error),
        };
        let last = !matches!(message, FeedMessage::Chunk(_));

        if tx.send(message).is_err() {
            return;
        }
        notify();
        if last {
            return;
        }
    }
}

impl GraphViewerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        source: GraphSource,
        config: SessionConfig,
        chunk_size: usize,
    ) -> Self {
        let model = ViewModel::new(GraphSession::new(config));
        let feed = Self::spawn_feed(
            source.clone(),
            chunk_size,
            model.session.cancel_token(),
            cc.egui_ctx.clone(),
        );

        Self {
            source,
            feed: Some(feed),
            model,
        }
    }

    /// Reads the source on a worker thread. Only raw bytes cross the channel;
    /// the session is touched on the UI thread alone.
    fn spawn_feed(
        source: GraphSource,
        chunk_size: usize,
        cancel: CancelToken,
        ctx: Context,
    ) -> Receiver<FeedMessage> {
        let (tx, rx) = mpsc::sync_channel(FEED_BACKLOG);

        thread::spawn(move || {
            match source.open() {
                Ok(reader) => pump_feed(reader, chunk_size, &cancel, &tx, || ctx.request_repaint()),
                Err(error) => {
                    let _ = tx.send(FeedMessage::Failed(io::Error::other(format!("{error:#}"))));
                }
            }
            ctx.request_repaint();
        });

        rx
    }
}

impl ViewModel {
    /// Applies queued feed messages. Returns false once the feed is spent.
    fn apply_feed(&mut self, rx: &Receiver<FeedMessage>) -> bool {
        if self.session.state().is_terminal() {
            return false;
        }

        for _ in 0..MAX_CHUNKS_PER_FRAME {
            let outcome = match rx.try_recv() {
                Ok(FeedMessage::Chunk(chunk)) => self
                    .session
                    .feed_chunk(&chunk, &mut self.canvas)
                    .map(|_| ()),
                Ok(FeedMessage::End) => self.session.finish(&mut self.canvas).map(|_| ()),
                Ok(FeedMessage::Failed(error)) => {
                    self.session.fail(StreamError::Io(error), &mut self.canvas);
                    Ok(())
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    self.session.fail(
                        StreamError::Io(io::Error::other("graph feed worker disconnected")),
                        &mut self.canvas,
                    );
                    return false;
                }
            };

            if let Err(error) = outcome {
                tracing::debug!(%error, "graph feed stopped");
            }
            if self.session.state().is_terminal() {
                return false;
            }
        }
        true
    }
}

impl eframe::App for GraphViewerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        if let Some(rx) = self.feed.take()
            && self.model.apply_feed(&rx)
        {
            self.feed = Some(rx);
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        self.model.show(ctx, &self.source);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::Cursor;

    use super::*;

    fn drain(rx: &Receiver<FeedMessage>) -> Vec<FeedMessage> {
        rx.try_iter().collect()
    }

    #[test]
    fn pump_splits_source_and_ends() {
        let (tx, rx) = mpsc::sync_channel(16);
        let notified = Cell::new(0);

        pump_feed(Cursor::new(b"0123456789".to_vec()), 4, &CancelToken::new(), &tx, || {
            notified.set(notified.get() + 1)
        });

        let messages = drain(&rx);
        let chunks = messages
            .iter()
            .filter_map(|message| match message {
                FeedMessage::Chunk(bytes) => Some(bytes.len()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(chunks, vec![4, 4, 2]);
        assert!(matches!(messages.last(), Some(FeedMessage::End)));
        assert_eq!(notified.get(), 4);
    }

    #[test]
    fn pump_stops_when_cancelled() {
        let (tx, rx) = mpsc::sync_channel(16);
        let cancel = CancelToken::new();
        cancel.cancel();

        pump_feed(Cursor::new(b"{}".to_vec()), 4, &cancel, &tx, || {});
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn feed_messages_drive_the_session() {
        let (tx, rx) = mpsc::sync_channel(16);
        let mut model = ViewModel::new(GraphSession::default());

        tx.send(FeedMessage::Chunk(br#"{"nodes":[{"id":"a"},{"id":"b"}]}"#.to_vec()))
            .expect("open channel");
        assert!(model.apply_feed(&rx));
        assert_eq!(model.session.store().size().nodes, 2);

        tx.send(FeedMessage::Chunk(br#"{"edges":[{"source":"a","target":"b"}]}"#.to_vec()))
            .expect("open channel");
        tx.send(FeedMessage::End).expect("open channel");
        assert!(!model.apply_feed(&rx));

        assert!(model.session.state().is_terminal());
        assert_eq!(model.canvas.nodes.len(), 2);
        assert_eq!(model.canvas.edges.len(), 1);
    }

    #[test]
    fn worker_failure_ends_the_session() {
        let (tx, rx) = mpsc::sync_channel(16);
        let mut model = ViewModel::new(GraphSession::default());

        tx.send(FeedMessage::Failed(io::Error::other("connection reset")))
            .expect("open channel");
        assert!(!model.apply_feed(&rx));
        assert!(model.session.failure().is_some_and(|message| message.contains("connection reset")));
    }
}
