use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Process has exited")]
    ProcessExited,

    #[error("Engine is not attached to a process")]
    NotAttached,

    #[error("Process handle has been detached")]
    Detached,

    #[error("Invalid address {address:#x}")]
    AddressInvalid { address: u64 },

    #[error("Access denied reading {size} bytes at {address:#x}")]
    AccessDenied { address: u64, size: usize },

    #[error("Partial read at {address:#x}: expected {expected} bytes, got {actual}")]
    PartialRead {
        address: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Read of {size} bytes exceeds the limit of {max} bytes")]
    ReadTooLarge { size: usize, max: usize },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Schema '{schema}' is malformed: {reason}")]
    SchemaMismatch { schema: String, reason: String },

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("Object at {address:#x} failed self-consistency check (self field = {found:#x})")]
    SelfConsistencyFailure { address: u64, found: u64 },

    #[error("Unknown object handle: {0}")]
    UnknownObject(u32),

    #[error("Address {address:#x} is already tracked by object {handle}")]
    AlreadyTracked { address: u64, handle: u32 },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Failures that only affect one object for one tick.
    ///
    /// The cache recovers from these locally; everything else is a caller or
    /// configuration error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::AddressInvalid { .. }
                | Error::AccessDenied { .. }
                | Error::PartialRead { .. }
                | Error::ReadTooLarge { .. }
                | Error::Detached
                | Error::SelfConsistencyFailure { .. }
        )
    }
}
