/// Errors from domain validation and input parsing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A value is outside its allowed range (palette index, shape size).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A batch file or response body is not the expected JSON.
    #[error("Malformed input: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A chunk payload does not hold exactly one byte per cell.
    #[error("Invalid chunk payload: expected {expected} bytes, got {actual}")]
    ChunkSize {
        /// Bytes a full chunk carries.
        expected: usize,
        /// Bytes actually received.
        actual: usize,
    },
}
