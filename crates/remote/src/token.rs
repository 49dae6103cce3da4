//! Authorization token acquisition.
//!
//! Tokens come from an external challenge system behind the
//! [`ChallengeSolver`] trait. [`TokenProvider::acquire`] races every solve
//! attempt against a fixed timeout and keeps retrying until a token
//! arrives or the caller's abort predicate says to stop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RemoteError;

/// How long a single solve attempt may take before it is abandoned.
pub const TOKEN_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause after a solver error before the next attempt.
const SOLVER_ERROR_DELAY: Duration = Duration::from_secs(1);

/// Default transport timeout of one [`HttpChallenge`] request. Attempts the
/// provider has already abandoned still finish within this bound.
pub const CHALLENGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Opaque bearer credential with a server-enforced expiry.
///
/// The engine cannot inspect how long a token stays valid; it only learns
/// of expiry from a submission outcome.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Challenge solvers
// ---------------------------------------------------------------------------

/// One attempt at obtaining a token from the external challenge system.
///
/// An attempt may never resolve; [`TokenProvider`] enforces the timeout.
#[async_trait]
pub trait ChallengeSolver: Send + Sync + 'static {
    async fn solve(&self) -> Result<Token, RemoteError>;
}

/// Hands out one pre-issued token.
#[derive(Debug, Clone)]
pub struct StaticChallenge {
    token: Token,
}

impl StaticChallenge {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Token::new(token),
        }
    }
}

#[async_trait]
impl ChallengeSolver for StaticChallenge {
    async fn solve(&self) -> Result<Token, RemoteError> {
        Ok(self.token.clone())
    }
}

/// Fetches a freshly solved token from an external solver service.
///
/// The service answers `GET {url}` with the token as the plain-text body.
#[derive(Debug, Clone)]
pub struct HttpChallenge {
    client: reqwest::Client,
    url: String,
    request_timeout: Duration,
}

impl HttpChallenge {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            request_timeout: CHALLENGE_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[async_trait]
impl ChallengeSolver for HttpChallenge {
    async fn solve(&self) -> Result<Token, RemoteError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let token = body.trim();
        if token.is_empty() {
            return Err(RemoteError::Challenge("solver returned an empty token".into()));
        }
        Ok(Token::new(token))
    }
}

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

/// Acquires tokens with a per-attempt timeout and cooperative abort.
pub struct TokenProvider {
    solver: Arc<dyn ChallengeSolver>,
    attempt_timeout: Duration,
}

impl TokenProvider {
    pub fn new(solver: Arc<dyn ChallengeSolver>) -> Self {
        Self {
            solver,
            attempt_timeout: TOKEN_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Keep requesting a token on behalf of `worker` until one arrives.
    ///
    /// `should_abort` is consulted before every attempt; once it returns
    /// `true` the provider gives up and returns `None`. An attempt that
    /// exceeds the timeout is left running in the background and its
    /// eventual result is discarded.
    pub async fn acquire<F>(&self, worker: usize, should_abort: F) -> Option<Token>
    where
        F: Fn() -> bool,
    {
        let mut attempt = 0u32;

        loop {
            if should_abort() {
                tracing::info!(worker, attempt, "Token acquisition aborted");
                return None;
            }

            attempt += 1;
            tracing::debug!(worker, attempt, "Requesting token");

            let solver = Arc::clone(&self.solver);
            let mut task = tokio::spawn(async move { solver.solve().await });

            match tokio::time::timeout(self.attempt_timeout, &mut task).await {
                Ok(Ok(Ok(token))) => {
                    tracing::debug!(worker, attempt, "Token acquired");
                    return Some(token);
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(worker, attempt, error = %e, "Challenge solver failed, retrying");
                    tokio::time::sleep(SOLVER_ERROR_DELAY).await;
                }
                Ok(Err(e)) => {
                    tracing::warn!(worker, attempt, error = %e, "Challenge solver task died, retrying");
                    tokio::time::sleep(SOLVER_ERROR_DELAY).await;
                }
                Err(_) => {
                    tracing::warn!(
                        worker,
                        attempt,
                        timeout_ms = self.attempt_timeout.as_millis() as u64,
                        "Token request timed out, retrying",
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
