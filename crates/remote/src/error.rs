use pixelfleet_core::error::CoreError;

/// Errors from the remote API layer.
///
/// Submission outcomes the server reports (throttling, rejection, expired
/// tokens, failing statuses) are not errors; see
/// [`SubmissionOutcome`](pixelfleet_core::outcome::SubmissionOutcome).
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request could not be built or sent.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote returned a non-2xx status where a payload was required.
    #[error("Remote API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The item or payload failed domain validation.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// The challenge solver could not produce a token.
    #[error("Challenge failed: {0}")]
    Challenge(String),
}
