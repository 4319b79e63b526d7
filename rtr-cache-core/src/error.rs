use thiserror::Error;

/// Errors raised while decoding or encoding a PDU.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unsupported protocol version {0}, expected 0")]
    VersionMismatch(u8),

    #[error("unknown PDU kind {0}")]
    UnknownKind(u8),

    #[error("reserved field was {0:#x}, expected zero")]
    ReservedNonZero(u16),

    #[error("prefix length {prefixlen} exceeds max length {max_prefixlen} for this family")]
    PrefixLenOutOfRange { prefixlen: u8, max_prefixlen: u8 },

    #[error("max prefix length {max_prefixlen} exceeds family width {family_bits} bits")]
    MaxLenOutOfRange { max_prefixlen: u8, family_bits: u8 },

    #[error("error-report message was not valid UTF-8: {0}")]
    BadErrorMessage(#[from] std::str::Utf8Error),
}

/// Errors raised by the snapshot/delta store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("wire error reading {path}: {source}")]
    Wire {
        path: std::path::PathBuf,
        #[source]
        source: WireError,
    },

    #[error("current pointer is unreadable or absent")]
    NoCurrent,
}

/// Errors raised while decoding an external ROA object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoaError {
    #[error("truncated ROA content at offset {0}")]
    Truncated(usize),

    #[error("unexpected DER tag {tag:#x} at offset {offset}, expected {expected:#x}")]
    UnexpectedTag { tag: u8, offset: usize, expected: u8 },

    #[error("ROA version {0} is not supported, expected 0")]
    UnsupportedVersion(u8),

    #[error("unknown address family identifier {0}")]
    UnknownAfi(u16),

    #[error("address prefix longer than the address family permits")]
    PrefixTooLong,
}

/// Errors raised while a producer run is in progress.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("validated ROA tree {0:?} does not exist or is not a directory")]
    MissingTree(std::path::PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error walking validator tree: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that terminate a server or client session outright.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("peer closed the connection")]
    PeerClosed,
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
