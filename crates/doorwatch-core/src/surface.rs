//! Collaborator seams for the presentation and audio surfaces.
//!
//! The orchestrator only ever talks to these traits; the binary wires in
//! the real implementations (terminal presenter, rodio sink), and tests
//! substitute recording fakes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::dispatch::AlertRequest;

// ── Presenter ────────────────────────────────────────────────────────

/// The visual alert surface.
///
/// Implementations must deliver exactly one `closed` notification per
/// display cycle (auto-hide or manual dismissal) on the channel wired to
/// the orchestrator; [`crate::alert::AlertController`] provides the timing.
pub trait Presenter: Send {
    fn display(&mut self, alert: &AlertRequest);
}

// ── AudioSink ────────────────────────────────────────────────────────

/// The audio playback surface.
///
/// All methods are infallible from the orchestrator's point of view:
/// a missing file or dead output device is the sink's problem to log,
/// and must never suppress the visual alert.
pub trait AudioSink: Send {
    fn play(&mut self, path: &Path, volume: f32, looped: bool);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

// ── Sound configuration ──────────────────────────────────────────────

/// Playback mode for the alert sound.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    Once,
    #[default]
    Loop,
}

impl LoopMode {
    /// Lenient parse: any unrecognized value coerces to `Loop`.
    pub fn coerce(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

/// Alert sound settings. An empty path disables audio entirely.
#[derive(Debug, Clone, Default)]
pub struct SoundSettings {
    pub path: String,
    pub volume: f32,
    pub loop_mode: LoopMode,
}

impl SoundSettings {
    pub fn is_enabled(&self) -> bool {
        !self.path.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
