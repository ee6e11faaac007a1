use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Blockdec's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Blockdec's crate-wide error type.
///
/// Two failure channels exist and they deliberately do not mix:
/// - [`Error::InsufficientCapacity`] is raised synchronously to whoever is
///   writing into an [`crate::input_buffer::InputBuffer`] with growth
///   disabled. The engine never records it.
/// - [`Error::Decode`] wraps the engine's single declared failure kind. Once
///   the engine records a [`DecodeError`], every later call on the decoder
///   contract (except flush/release) re-raises it.
#[derive(Debug, Error)]
pub enum Error {
    /// Growth is disabled on the buffer and the requested write does not fit.
    ///
    /// Carries the exact sizes so the writer can decide whether to re-chunk,
    /// drop the sample, or rebuild its buffers.
    #[error("insufficient buffer capacity: current {current} bytes, required {required} bytes")]
    InsufficientCapacity { current: usize, required: usize },

    /// A decode step failed. Recorded once by the engine and permanent.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The engine could not start its worker thread.
    #[error("failed to start decode worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// The engine's declared decode failure kind.
///
/// This is intentionally a single cloneable type rather than a codec-specific
/// generic: the engine records one of these the first time anything goes
/// wrong in a decode step and hands out clones to every subsequent caller on
/// any thread. Codec-specific detail travels in the message and the optional
/// source.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl DecodeError {
    /// Create a decode error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error wrapping an underlying codec error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

}

/// Extract a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_clones_share_the_source() {
        let err = DecodeError::with_source(
            "bitstream desync",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "bad header"),
        );
        let clone = err.clone();
        assert_eq!(err.to_string(), clone.to_string());
        assert!(StdError::source(&clone).is_some());
    }

    #[test]
    fn panic_payloads_keep_their_message() {
        let msg = panic_message(Box::new("index out of range".to_string()));
        assert_eq!(msg, "index out of range");

        let msg = panic_message(Box::new(42u32));
        assert_eq!(msg, "non-string panic payload");
    }

    #[test]
    fn capacity_error_reports_exact_sizes() {
        let err = Error::InsufficientCapacity {
            current: 16,
            required: 64,
        };
        let text = err.to_string();
        assert!(text.contains("16"));
        assert!(text.contains("64"));
    }
}
