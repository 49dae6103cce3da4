//! Process-wide kill switch for the engine.
//!
//! One [`EngineControl`] is created per process run and shared with every
//! worker. Workers only read it; an external channel flips it. While the
//! engine is disabled, workers idle without consuming items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct EngineControl {
    enabled: AtomicBool,
}

impl EngineControl {
    /// A control that starts enabled.
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Flip the switch and return the new state.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Default for EngineControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Toggle `control` on every `SIGUSR1` until `cancel` is triggered.
#[cfg(unix)]
pub async fn listen_for_toggles(control: Arc<EngineControl>, cancel: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut signals = match signal(SignalKind::user_defined1()) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGUSR1 handler");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = signals.recv() => {
                if received.is_none() {
                    break;
                }
                let enabled = control.toggle();
                tracing::info!(enabled, "Engine toggled by SIGUSR1");
            }
        }
    }
}

/// Without unix signals there is no control channel; wait for shutdown.
#[cfg(not(unix))]
pub async fn listen_for_toggles(_control: Arc<EngineControl>, cancel: CancellationToken) {
    cancel.cancelled().await;
}

/// [`listen_for_toggles`] running as a background task.
pub struct ToggleListener {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ToggleListener {
    pub fn spawn(control: Arc<EngineControl>) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listen_for_toggles(control, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stop listening and wait for the task. Returns `false` if the task
    /// panicked or was aborted.
    pub async fn shutdown(self) -> bool {
        self.cancel.cancel();
        match self.handle.await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Control listener task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_enabled() {
        assert!(EngineControl::new().is_enabled());
    }

    #[test]
    fn toggle_returns_new_state() {
        let control = EngineControl::default();
        assert!(!control.toggle());
        assert!(!control.is_enabled());
        assert!(control.toggle());
        assert!(control.is_enabled());
    }

    #[tokio::test]
    async fn listener_exits_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        listen_for_toggles(Arc::new(EngineControl::new()), cancel).await;
    }

    #[tokio::test]
    async fn spawned_listener_shuts_down_cleanly() {
        let listener = ToggleListener::spawn(Arc::new(EngineControl::new()));
        assert!(listener.shutdown().await);
    }

    #[tokio::test]
    async fn failed_listener_task_is_reported() {
        let listener = ToggleListener {
            cancel: CancellationToken::new(),
            handle: tokio::spawn(async { panic!("listener crashed"); }),
        };
        assert!(!listener.shutdown().await);
    }
}
