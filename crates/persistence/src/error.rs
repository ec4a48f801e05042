#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The query had no matching row. Kept distinct from `Backend` so the
    /// intent-apply retry path can tell "nothing to do" from "try again".
    NotFound,
    /// The backend itself failed (connection, constraint, timeout, ...).
    Backend(String),
}

impl std::error::Error for DriverError {}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no matching row"),
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}
