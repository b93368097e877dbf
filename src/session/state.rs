use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle of one graph stream. `Streaming` is the only non-terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Streaming,
    /// The producer closed the stream cleanly.
    Done,
    /// The producer closed the stream mid-fragment.
    Truncated,
    /// Unrecoverable syntax or I/O error.
    Failed,
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Streaming)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Streaming,
                Self::Done | Self::Truncated | Self::Failed | Self::Cancelled
            )
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Done => "done",
            Self::Truncated => "truncated",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Shared flag asking a stream to stop. Cheap to clone into a reader thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StreamState; 5] = [
        StreamState::Streaming,
        StreamState::Done,
        StreamState::Truncated,
        StreamState::Failed,
        StreamState::Cancelled,
    ];

    #[test]
    fn only_streaming_has_successors() {
        for from in ALL {
            for to in ALL {
                let expected = from == StreamState::Streaming && to != StreamState::Streaming;
                assert_eq!(from.can_transition_to(to), expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let reader_side = token.clone();
        assert!(!reader_side.is_cancelled());

        token.cancel();
        assert!(reader_side.is_cancelled());
    }
}
