#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The datagram was shorter than the fixed 33-byte header.
    Truncated,
    /// `uci_len` exceeded [`crate::frame::MAX_UCI_LENGTH`].
    UciTooLong,
    /// The `ctrl` byte did not match any known [`crate::Control`] value.
    UnknownControl(u8),
    /// A non-ACK frame carried an all-zero token.
    EmptyToken,
    /// The client's declared version is newer than this server understands.
    UnsupportedVersion,
    /// No ACK arrived within `timeout_ms * (max_retries + 1)`.
    NoAck,
    /// The underlying socket returned an I/O error.
    Io(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame shorter than header"),
            Self::UciTooLong => write!(f, "uci_len exceeds maximum"),
            Self::UnknownControl(b) => write!(f, "unknown control code: {b}"),
            Self::EmptyToken => write!(f, "non-ack frame with empty token"),
            Self::UnsupportedVersion => write!(f, "client version unsupported"),
            Self::NoAck => write!(f, "no ack received before retries exhausted"),
            Self::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
