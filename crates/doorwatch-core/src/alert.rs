//! Headless alert lifecycle controller.
//!
//! Owns the timing half of the notification surface: auto-hide after the
//! requested duration, a fixed fade-out, manual dismissal, and restart on
//! replacement. Rendering is someone else's job; the controller publishes
//! its state and emits exactly one `closed` notification per display cycle,
//! which is the contract the orchestrator relies on for supersession.
//!
//! States: `Hidden → Showing → FadingOut → Hidden`. A `Show` while Showing
//! or FadingOut cancels any in-progress fade, resets opacity, and restarts
//! the auto-hide timer with the new duration; the interrupted cycle emits
//! no `closed` of its own.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::dispatch::AlertRequest;
use crate::surface::Presenter;

/// Fade-out animation length.
pub const FADE_DURATION: Duration = Duration::from_millis(500);

const COMMAND_CHANNEL_CAPACITY: usize = 8;

// ── State & commands ─────────────────────────────────────────────────

/// Externally observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Hidden,
    Showing,
    FadingOut,
}

#[derive(Debug)]
enum AlertCommand {
    Show(AlertRequest),
    Close,
}

// ── Handle ───────────────────────────────────────────────────────────

/// Handle to a running [`AlertController`] task.
#[derive(Clone)]
pub struct AlertHandle {
    cmd_tx: mpsc::Sender<AlertCommand>,
    state_rx: watch::Receiver<AlertState>,
}

impl AlertHandle {
    /// Request manual dismissal: fades out immediately, regardless of
    /// remaining auto-hide time.
    pub fn close(&self) {
        let _ = self.cmd_tx.try_send(AlertCommand::Close);
    }

    pub fn state(&self) -> AlertState {
        *self.state_rx.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<AlertState> {
        self.state_rx.clone()
    }
}

impl Presenter for AlertHandle {
    fn display(&mut self, alert: &AlertRequest) {
        if self
            .cmd_tx
            .try_send(AlertCommand::Show(alert.clone()))
            .is_err()
        {
            tracing::warn!("alert controller is gone, dropping display request");
        }
    }
}

// ── Controller ───────────────────────────────────────────────────────

/// The lifecycle task. Create with [`alert_controller`], then `run().await`
/// (usually via `tokio::spawn`).
pub struct AlertController {
    cmd_rx: mpsc::Receiver<AlertCommand>,
    closed_tx: mpsc::Sender<()>,
    state_tx: watch::Sender<AlertState>,
}

/// Build a controller plus its handle. `closed_tx` receives one `()` per
/// completed display cycle.
pub fn alert_controller(closed_tx: mpsc::Sender<()>) -> (AlertHandle, AlertController) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(AlertState::Hidden);

    (
        AlertHandle { cmd_tx, state_rx },
        AlertController {
            cmd_rx,
            closed_tx,
            state_tx,
        },
    )
}

enum Phase {
    Hidden,
    Showing { hide_at: Instant },
    FadingOut { done_at: Instant },
}

impl AlertController {
    pub async fn run(mut self) {
        let mut phase = Phase::Hidden;

        loop {
            phase = match phase {
                Phase::Hidden => {
                    let Some(cmd) = self.cmd_rx.recv().await else {
                        break;
                    };
                    match cmd {
                        AlertCommand::Show(alert) => self.show(&alert),
                        // Nothing on screen; ignore.
                        AlertCommand::Close => Phase::Hidden,
                    }
                }

                Phase::Showing { hide_at } => {
                    tokio::select! {
                        cmd = self.cmd_rx.recv() => match cmd {
                            Some(AlertCommand::Show(alert)) => self.show(&alert),
                            Some(AlertCommand::Close) => self.begin_fade(),
                            None => break,
                        },
                        () = tokio::time::sleep_until(hide_at) => self.begin_fade(),
                    }
                }

                Phase::FadingOut { done_at } => {
                    tokio::select! {
                        cmd = self.cmd_rx.recv() => match cmd {
                            // Replacement cancels the fade; the interrupted
                            // cycle never reports closed.
                            Some(AlertCommand::Show(alert)) => self.show(&alert),
                            Some(AlertCommand::Close) => Phase::FadingOut { done_at },
                            None => break,
                        },
                        () = tokio::time::sleep_until(done_at) => {
                            self.state_tx.send_replace(AlertState::Hidden);
                            tracing::debug!("alert hidden");
                            if self.closed_tx.send(()).await.is_err() {
                                break;
                            }
                            Phase::Hidden
                        }
                    }
                }
            };
        }
    }

    fn show(&mut self, alert: &AlertRequest) -> Phase {
        // Showing implies full opacity; a canceled fade resets here.
        self.state_tx.send_replace(AlertState::Showing);
        tracing::info!(title = %alert.title, body = %alert.body, "alert shown");
        Phase::Showing {
            hide_at: Instant::now() + alert.duration,
        }
    }

    fn begin_fade(&mut self) -> Phase {
        self.state_tx.send_replace(AlertState::FadingOut);
        Phase::FadingOut {
            done_at: Instant::now() + FADE_DURATION,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
