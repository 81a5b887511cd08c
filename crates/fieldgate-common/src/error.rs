use thiserror::Error;

/// Gateway error types covering configuration, protocol preconditions, and
/// fieldbus failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Fieldbus backend failure.
    #[error("fieldbus error: {0}")]
    Fieldbus(String),

    /// Operation requires the bus to be active.
    #[error("network not active")]
    NetworkInactive,

    /// Slave index outside the configured slave table.
    #[error("slave {slave} not found")]
    SlaveNotFound {
        /// Requested slave identifier.
        slave: u32,
    },

    /// Process-image access outside the mapped region.
    #[error("pdo access out of range: offset {offset} + size {size} exceeds {limit}")]
    PdoOutOfRange {
        /// Requested byte offset.
        offset: u32,
        /// Requested access size.
        size: u32,
        /// Mapped image size in bytes.
        limit: u32,
    },

    /// Invalid bus lifecycle transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Source state.
        from: &'static str,
        /// Attempted target state.
        to: &'static str,
    },

    /// I/O operation error.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenience type alias for gateway operations.
pub type GateResult<T> = Result<T, GateError>;
