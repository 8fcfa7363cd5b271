use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A shape or size contract was violated by a kernel or backend operation.
    DimensionMismatch(String),
    /// `train`/`test` was invoked without a loaded dataset.
    EmptyDataset(String),
    /// Opening, reading, writing or decoding a file failed.
    Io(String),
    /// Work was submitted to (or dropped by) a pool that has shut down.
    PoolClosed,
    /// A pool task panicked before producing its result.
    TaskPanicked,
    InvalidConfig(String),
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionMismatch(msg) => write!(f, "dimension mismatch: {msg}"),
            Error::EmptyDataset(msg) => write!(f, "empty dataset: {msg}"),
            Error::Io(msg) => write!(f, "i/o failure: {msg}"),
            Error::PoolClosed => write!(f, "thread pool is closed"),
            Error::TaskPanicked => write!(f, "thread pool task panicked"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub(crate) fn shape(op: &str, lhs: (usize, usize), rhs: (usize, usize)) -> Self {
        Error::DimensionMismatch(format!(
            "{op}: {}x{} is incompatible with {}x{}",
            lhs.0, lhs.1, rhs.0, rhs.1
        ))
    }

    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        Error::Io(format!("{context}: {err}"))
    }
}
