//! In-memory fakes of the engine's remote collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pixelfleet_core::canvas::{CanvasSnapshot, SharedCanvas};
use pixelfleet_core::identity::WorkerIdentity;
use pixelfleet_core::item::WorkItem;
use pixelfleet_core::outcome::SubmissionOutcome;
use pixelfleet_remote::api::Submitter;
use pixelfleet_remote::chunks::CanvasRefresher;
use pixelfleet_remote::error::RemoteError;
use pixelfleet_remote::token::{ChallengeSolver, Token, TokenProvider};
use pixelfleet_worker::control::EngineControl;
use pixelfleet_worker::engine::{Engine, EngineSettings};

pub const ACCEPTED: SubmissionOutcome = SubmissionOutcome::Accepted { retry_after_secs: 0.0 };

/// One submission seen by [`FakeSubmitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub item: WorkItem,
    pub fingerprint: String,
    pub token: String,
}

/// Replays scripted outcomes, then repeats a fallback. Like the real
/// client it never touches the local canvas.
pub struct FakeSubmitter {
    script: Mutex<VecDeque<SubmissionOutcome>>,
    fallback: SubmissionOutcome,
    calls: Mutex<Vec<Call>>,
}

impl FakeSubmitter {
    pub fn new(fallback: SubmissionOutcome) -> Arc<Self> {
        Self::scripted(Vec::new(), fallback)
    }

    pub fn scripted(script: Vec<SubmissionOutcome>, fallback: SubmissionOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    async fn submit(
        &self,
        item: &WorkItem,
        identity: &WorkerIdentity,
        token: &Token,
    ) -> Result<SubmissionOutcome, RemoteError> {
        self.calls.lock().unwrap().push(Call {
            item: *item,
            fingerprint: identity.derived_id.clone(),
            token: token.as_str().to_string(),
        });

        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback))
    }
}

/// Issues `tok-1`, `tok-2`, ... and counts how often it was asked.
#[derive(Default)]
pub struct CountingSolver {
    calls: AtomicU32,
}

impl CountingSolver {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeSolver for CountingSolver {
    async fn solve(&self) -> Result<Token, RemoteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Token::new(format!("tok-{call}")))
    }
}

/// Counts refreshes; optionally fails every one of them.
#[derive(Default)]
pub struct CountingRefresher {
    pub calls: AtomicU32,
    pub fail: bool,
}

#[async_trait]
impl CanvasRefresher for CountingRefresher {
    async fn refresh(&self, items: &[WorkItem]) -> Result<usize, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RemoteError::ApiError {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(items.len())
    }
}

pub fn blank_canvas() -> SharedCanvas {
    SharedCanvas::new(CanvasSnapshot::new())
}

pub fn settings(parallelism: usize, max_item_attempts: u32) -> EngineSettings {
    EngineSettings {
        parallelism: NonZeroUsize::new(parallelism).unwrap(),
        max_item_attempts: NonZeroU32::new(max_item_attempts),
        disabled_poll: Duration::from_secs(1),
        ..EngineSettings::default()
    }
}

pub fn engine(
    submitter: Arc<FakeSubmitter>,
    canvas: SharedCanvas,
    solver: Arc<CountingSolver>,
    control: Arc<EngineControl>,
    settings: EngineSettings,
) -> Engine {
    Engine::new(
        submitter,
        Arc::new(canvas),
        Arc::new(TokenProvider::new(solver)),
        control,
        settings,
    )
}
