use thiserror::Error;

/// Failures that abort an erasure insertion run.
///
/// Anomalies that are corrected on the fly (a declared format that differs
/// from the detected one, a headerless stream with a short tail) are not
/// errors; they are reported through `tracing::warn!` instead.
#[derive(Error, Debug)]
pub enum EidError {
    /// Inconsistent layer setup, pattern files or stream formats.
    #[error("config error: {0}")]
    Config(String),

    /// Input frame length is neither zero nor one of the layer boundaries.
    #[error("illegal frame length {len} in input frame {frame}")]
    IllegalFrameLength { frame: u64, len: usize },

    /// A frame with an explicit length header ended early.
    #[error("frame {frame} truncated: expected {expected} soft bits, read {got}")]
    TruncatedFrame {
        frame: u64,
        expected: usize,
        got: usize,
    },

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EidError {
    /// Process exit status used by the command line tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            EidError::Config(_) | EidError::IllegalFrameLength { .. } => 5,
            EidError::Io(_) => 7,
            EidError::TruncatedFrame { .. } => 9,
        }
    }
}

pub type Result<T> = std::result::Result<T, EidError>;
