//! Wiring between the broker client and the presentation/audio surfaces.
//!
//! Owns the single active-alert slot, which is the one source of truth for
//! "is something currently showing/playing". A new event supersedes the
//! current alert rather than queueing behind it: the old audio is stopped
//! before the replacement starts.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use doorwatch_mqtt::{LifecycleEvent, RawMessage};

use crate::dispatch::{to_alert, AlertRequest, NotificationDefaults};
use crate::event::{decode, DoorEvent};
use crate::surface::{AudioSink, LoopMode, Presenter, SoundSettings};

// ── Orchestrator ─────────────────────────────────────────────────────

pub struct Orchestrator<P: Presenter, A: AudioSink> {
    presenter: P,
    audio: A,
    defaults: NotificationDefaults,
    sound: SoundSettings,
    /// At most one alert is live at a time.
    active: Option<AlertRequest>,
}

impl<P: Presenter, A: AudioSink> Orchestrator<P, A> {
    pub fn new(
        presenter: P,
        audio: A,
        defaults: NotificationDefaults,
        sound: SoundSettings,
    ) -> Self {
        Self {
            presenter,
            audio,
            defaults,
            sound,
            active: None,
        }
    }

    /// Drive the pipeline until cancelled or the client goes away.
    ///
    /// `closed_rx` must be the channel fed by the presentation surface:
    /// one `()` per completed display cycle.
    pub async fn run(
        mut self,
        mut lifecycle: broadcast::Receiver<LifecycleEvent>,
        mut messages: broadcast::Receiver<Arc<RawMessage>>,
        mut closed_rx: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,

                event = lifecycle.recv() => match event {
                    Ok(event) => log_lifecycle(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "lifecycle receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                message = messages.recv() => match message {
                    Ok(message) => self.on_message(&message),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "message receiver lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                closed = closed_rx.recv() => match closed {
                    Some(()) => self.on_alert_closed(),
                    None => break,
                },
            }
        }
        tracing::debug!("orchestrator exited");
    }

    /// Decode one raw payload; faults are logged and the message dropped.
    fn on_message(&mut self, message: &RawMessage) {
        match decode(&message.payload) {
            Ok(event) => self.on_door_event(&event),
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "discarding malformed payload");
            }
        }
    }

    /// Turn a decoded event into a visible (and audible) alert,
    /// superseding whatever is currently showing.
    fn on_door_event(&mut self, event: &DoorEvent) {
        let alert = to_alert(event, &self.defaults, Local::now());

        // Supersession: silence the previous alert before replacing it.
        if self.active.is_some() && self.audio.is_playing() {
            self.audio.stop();
        }

        self.presenter.display(&alert);
        info!(title = %alert.title, body = %alert.body, "alert displayed");

        if self.sound.is_enabled() {
            self.audio.play(
                Path::new(&self.sound.path),
                self.sound.volume.clamp(0.0, 1.0),
                self.sound.loop_mode == LoopMode::Loop,
            );
        }

        self.active = Some(alert);
    }

    /// The surface finished a display cycle (auto-hide or manual close):
    /// whatever is still sounding goes quiet with it.
    fn on_alert_closed(&mut self) {
        if self.audio.is_playing() {
            self.audio.stop();
            info!("alert closed, audio stopped");
        }
        self.active = None;
    }
}

fn log_lifecycle(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::Connected => info!("broker connected"),
        LifecycleEvent::Disconnected => warn!("broker disconnected"),
        LifecycleEvent::Reconnecting { attempt } => {
            info!(attempt, "reconnecting to broker");
        }
        LifecycleEvent::Error { message } => error!(%message, "broker connection failed"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPresenter {
        displayed: Vec<AlertRequest>,
    }

    impl Presenter for &mut RecordingPresenter {
        fn display(&mut self, alert: &AlertRequest) {
            self.displayed.push(alert.clone());
        }
    }

    #[derive(Debug, PartialEq)]
    enum AudioOp {
        Play { path: PathBuf, volume: f32, looped: bool },
        Stop,
    }

    #[derive(Default)]
    struct RecordingAudio {
        ops: Arc<Mutex<Vec<AudioOp>>>,
        playing: bool,
    }

    impl AudioSink for &mut RecordingAudio {
        fn play(&mut self, path: &Path, volume: f32, looped: bool) {
            self.ops.lock().expect("ops lock").push(AudioOp::Play {
                path: path.to_owned(),
                volume,
                looped,
            });
            self.playing = true;
        }

        fn stop(&mut self) {
            self.ops.lock().expect("ops lock").push(AudioOp::Stop);
            self.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    fn sound(volume: f32) -> SoundSettings {
        SoundSettings {
            path: "/tmp/ding.wav".into(),
            volume,
            loop_mode: LoopMode::Once,
        }
    }

    fn orchestrator<'a>(
        presenter: &'a mut RecordingPresenter,
        audio: &'a mut RecordingAudio,
        sound: SoundSettings,
    ) -> Orchestrator<&'a mut RecordingPresenter, &'a mut RecordingAudio> {
        Orchestrator::new(presenter, audio, NotificationDefaults::default(), sound)
    }

    fn raw(payload: &[u8]) -> RawMessage {
        RawMessage {
            topic: "door-events".into(),
            payload: bytes::Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn malformed_payloads_never_produce_an_alert() {
        let mut presenter = RecordingPresenter::default();
        let mut audio = RecordingAudio::default();
        let mut orch = orchestrator(&mut presenter, &mut audio, sound(1.0));

        orch.on_message(&raw(b"not json"));
        orch.on_message(&raw(b"[1,2,3]"));
        orch.on_message(&raw(b"42"));
        orch.on_message(&raw(&[0xFF, 0x00]));
        drop(orch);

        assert_eq!(presenter.displayed.len(), 0);
        assert_eq!(audio.ops.lock().expect("ops lock").len(), 0);
    }

    #[test]
    fn valid_event_displays_and_plays() {
        let mut presenter = RecordingPresenter::default();
        let mut audio = RecordingAudio::default();
        let mut orch = orchestrator(&mut presenter, &mut audio, sound(0.8));

        orch.on_message(&raw(br#"{"event":"door_button_pressed"}"#));
        drop(orch);

        assert_eq!(presenter.displayed.len(), 1);
        assert_eq!(presenter.displayed[0].body, "door button pressed");
        assert!(presenter.displayed[0].title.starts_with("Door alert - "));

        let ops = audio.ops.lock().expect("ops lock");
        assert_eq!(
            *ops,
            vec![AudioOp::Play {
                path: PathBuf::from("/tmp/ding.wav"),
                volume: 0.8,
                looped: false,
            }]
        );
    }

    #[test]
    fn volume_is_clamped_to_unit_range() {
        for (configured, expected) in [(-0.5_f32, 0.0_f32), (1.7, 1.0)] {
            let mut presenter = RecordingPresenter::default();
            let mut audio = RecordingAudio::default();
            let mut orch = orchestrator(&mut presenter, &mut audio, sound(configured));

            orch.on_message(&raw(b"{}"));
            drop(orch);

            let ops = audio.ops.lock().expect("ops lock");
            match &ops[0] {
                AudioOp::Play { volume, .. } => {
                    assert!((volume - expected).abs() < f32::EPSILON);
                }
                AudioOp::Stop => panic!("expected a play op"),
            }
        }
    }

    #[test]
    fn supersession_stops_old_audio_before_new_playback() {
        let mut presenter = RecordingPresenter::default();
        let mut audio = RecordingAudio::default();
        let mut orch = orchestrator(&mut presenter, &mut audio, sound(1.0));

        orch.on_message(&raw(br#"{"message":"first"}"#));
        orch.on_message(&raw(br#"{"message":"second"}"#));
        drop(orch);

        // Both displays went out (the surface's restart handles replacement),
        // and the first sound was stopped before the second started.
        assert_eq!(presenter.displayed.len(), 2);
        assert_eq!(presenter.displayed[1].body, "second");

        let ops = audio.ops.lock().expect("ops lock");
        assert!(matches!(ops[0], AudioOp::Play { .. }));
        assert_eq!(ops[1], AudioOp::Stop);
        assert!(matches!(ops[2], AudioOp::Play { .. }));
    }

    #[test]
    fn closing_the_alert_silences_audio() {
        let mut presenter = RecordingPresenter::default();
        let mut audio = RecordingAudio::default();
        let mut orch = orchestrator(&mut presenter, &mut audio, sound(1.0));

        orch.on_message(&raw(b"{}"));
        assert!(orch.audio.is_playing());

        orch.on_alert_closed();
        assert!(!orch.audio.is_playing());
        assert!(orch.active.is_none());
        drop(orch);

        let ops = audio.ops.lock().expect("ops lock");
        assert_eq!(ops.last(), Some(&AudioOp::Stop));
    }

    #[test]
    fn empty_sound_path_keeps_the_visual_alert() {
        let mut presenter = RecordingPresenter::default();
        let mut audio = RecordingAudio::default();
        let mut orch = orchestrator(&mut presenter, &mut audio, SoundSettings::default());

        orch.on_message(&raw(br#"{"message":"custom text"}"#));
        drop(orch);

        assert_eq!(presenter.displayed.len(), 1);
        assert_eq!(presenter.displayed[0].body, "custom text");
        assert_eq!(audio.ops.lock().expect("ops lock").len(), 0);
    }

    #[test]
    fn closed_without_audio_just_clears_the_slot() {
        let mut presenter = RecordingPresenter::default();
        let mut audio = RecordingAudio::default();
        let mut orch = orchestrator(&mut presenter, &mut audio, SoundSettings::default());

        orch.on_message(&raw(b"{}"));
        orch.on_alert_closed();
        assert!(orch.active.is_none());
    }
}
