//! Error type shared by the framing, snapshot and capture modules.
use std::path::PathBuf;

/// Errors raised while reading a capture or one of its derived text logs.
///
/// None of these are recovered from; callers propagate them up to `main`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The byte source ended inside a frame payload.
    #[error("truncated frame at offset {offset}: declared {declared} bytes, only {available} available")]
    TruncatedFrame { offset: u64, declared: u16, available: usize },

    /// A payload does not fit in the 16-bit length prefix.
    #[error("frame payload of {0} bytes exceeds the 65535 byte limit")]
    FrameTooLarge(usize),

    /// A text line could not be parsed.
    #[error("malformed line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    /// The input file does not exist.
    #[error("input file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A frame payload is not a well-formed ITCH message.
    #[error("malformed message {kind:?}: expected {expected} body bytes, got {actual}")]
    MalformedMessage { kind: char, expected: usize, actual: usize },

    /// A message referenced a stock locate that was never registered.
    #[error("unknown stock locate {0}")]
    UnknownInstrument(u16),

    /// A message referenced an order that is not on the book.
    #[error("unknown order reference {0}")]
    UnknownOrder(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
