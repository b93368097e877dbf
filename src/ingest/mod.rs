mod decode;
mod framing;

pub use framing::Framing;

use decode::Utf8Decoder;

use crate::error::StreamError;
use crate::graph::{Fragment, FragmentReport, GraphStore};

/// What one `push_chunk`/`finish` call committed to the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub fragments: usize,
    pub ignored_fragments: usize,
    pub report: FragmentReport,
    /// Bytes still buffered, waiting for the rest of a fragment.
    pub pending: usize,
}

impl ChunkOutcome {
    fn absorb(&mut self, report: FragmentReport) {
        self.fragments += 1;
        self.report.nodes.added += report.nodes.added;
        self.report.nodes.updated += report.nodes.updated;
        self.report.nodes.skipped += report.nodes.skipped;
        self.report.edges.appended += report.edges.appended;
        self.report.edges.skipped += report.edges.skipped;
    }
}

/// Recovers complete fragments from a chunked byte stream and forwards each to
/// a [`GraphStore`] exactly once.
#[derive(Debug)]
pub struct StreamIngestor {
    framing: Framing,
    decoder: Utf8Decoder,
    /// Decoded text, always valid UTF-8.
    buffer: Vec<u8>,
    /// Absolute offset of `buffer[0]` in the decoded stream.
    drained: usize,
    fragments: usize,
    closed: bool,
}

impl StreamIngestor {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            decoder: Utf8Decoder::default(),
            buffer: Vec::new(),
            drained: 0,
            fragments: 0,
            closed: false,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len() + self.decoder.pending()
    }

    pub fn fragments_applied(&self) -> usize {
        self.fragments
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Appends a chunk and commits every fragment it completes. An incomplete
    /// trailing fragment stays buffered and is not an error.
    pub fn push_chunk(
        &mut self,
        chunk: &[u8],
        store: &mut GraphStore,
    ) -> Result<ChunkOutcome, StreamError> {
        if self.closed {
            tracing::debug!(bytes = chunk.len(), "ignoring chunk after ingestor closed");
            return Ok(ChunkOutcome {
                pending: self.pending_bytes(),
                ..ChunkOutcome::default()
            });
        }

        let replaced = self.decoder.decode(chunk, &mut self.buffer);
        self.log_replacements(replaced);
        let extracted = self.framing.extract(&self.buffer, self.drained);
        self.commit(extracted, store)
    }

    /// Closes the stream. Anything still buffered that does not decode,
    /// including half of a multibyte character, is a truncation; fragments
    /// committed earlier stay in the store.
    pub fn finish(&mut self, store: &mut GraphStore) -> Result<ChunkOutcome, StreamError> {
        if self.closed {
            return Ok(ChunkOutcome::default());
        }

        let extracted = self.framing.extract_final(&self.buffer, self.drained);
        let outcome = self.commit(extracted, store);
        self.closed = true;
        let outcome = outcome?;

        let leftover = self.buffer.trim_ascii().len() + self.decoder.pending();
        if leftover > 0 {
            tracing::warn!(
                pending = leftover,
                framing = self.framing.label(),
                "graph stream closed mid-fragment"
            );
            return Err(StreamError::Truncated { pending: leftover });
        }

        self.buffer.clear();
        Ok(outcome)
    }

    fn log_replacements(&self, replaced: usize) {
        if replaced > 0 {
            tracing::warn!(
                replaced,
                offset = self.drained,
                "replaced invalid utf-8 in graph stream"
            );
        }
    }

    fn commit(
        &mut self,
        extracted: framing::Extracted,
        store: &mut GraphStore,
    ) -> Result<ChunkOutcome, StreamError> {
        let mut outcome = ChunkOutcome::default();

        for value in extracted.values {
            let Some(fragment) = Fragment::from_value(value) else {
                tracing::warn!("skipping graph fragment that is not a JSON object");
                outcome.ignored_fragments += 1;
                continue;
            };

            let report = store.apply_fragment(fragment);
            if report.nodes.skipped > 0 || report.edges.skipped > 0 {
                tracing::warn!(
                    skipped_nodes = report.nodes.skipped,
                    skipped_edges = report.edges.skipped,
                    "dropped malformed fragment entries"
                );
            }
            tracing::debug!(
                added = report.nodes.added,
                updated = report.nodes.updated,
                edges = report.edges.appended,
                "applied graph fragment"
            );
            outcome.absorb(report);
        }

        self.fragments += outcome.fragments;
        self.buffer.drain(..extracted.consumed);
        self.drained += extracted.consumed;
        outcome.pending = self.pending_bytes();

        if let Some(error) = extracted.error {
            self.closed = true;
            return Err(error);
        }

        Ok(outcome)
    }
}

impl Default for StreamIngestor {
    fn default() -> Self {
        Self::new(Framing::default())
    }
}
