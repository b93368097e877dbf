use thiserror::Error;

/// Terminal failures of a graph stream.
///
/// An incomplete buffer while the stream is still open is not an error; the
/// ingestor simply waits for more bytes.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream closed with {pending} unparsed bytes buffered")]
    Truncated { pending: usize },

    #[error("malformed graph fragment at byte {offset}: {source}")]
    Syntax {
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read graph stream: {0}")]
    Io(#[from] std::io::Error),
}
