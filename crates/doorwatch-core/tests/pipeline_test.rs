// End-to-end pipeline tests: broker message channels in, alert controller
// and audio sink out, with the orchestrator in between.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use doorwatch_core::{
    alert_controller, AlertRequest, AlertState, AudioSink, LoopMode, NotificationDefaults,
    Orchestrator, Presenter, SoundSettings, FADE_DURATION,
};
use doorwatch_mqtt::{LifecycleEvent, RawMessage};

// ── Helpers ─────────────────────────────────────────────────────────

/// Forwards to the real alert controller while keeping a copy of every
/// request, so tests can assert on the rendered text.
#[derive(Clone)]
struct TeePresenter<P> {
    inner: P,
    seen: Arc<Mutex<Vec<AlertRequest>>>,
}

impl<P: Presenter> Presenter for TeePresenter<P> {
    fn display(&mut self, alert: &AlertRequest) {
        self.seen.lock().expect("seen lock").push(alert.clone());
        self.inner.display(alert);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AudioOp {
    Play { volume: f32, looped: bool },
    Stop,
}

#[derive(Clone, Default)]
struct SharedAudio {
    ops: Arc<Mutex<Vec<AudioOp>>>,
    playing: Arc<Mutex<bool>>,
}

impl AudioSink for SharedAudio {
    fn play(&mut self, _path: &Path, volume: f32, looped: bool) {
        self.ops
            .lock()
            .expect("ops lock")
            .push(AudioOp::Play { volume, looped });
        *self.playing.lock().expect("playing lock") = true;
    }

    fn stop(&mut self) {
        self.ops.lock().expect("ops lock").push(AudioOp::Stop);
        *self.playing.lock().expect("playing lock") = false;
    }

    fn is_playing(&self) -> bool {
        *self.playing.lock().expect("playing lock")
    }
}

struct Pipeline {
    messages: broadcast::Sender<Arc<RawMessage>>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    handle: doorwatch_core::AlertHandle,
    seen: Arc<Mutex<Vec<AlertRequest>>>,
    audio: SharedAudio,
    cancel: CancellationToken,
}

fn spawn_pipeline(sound: SoundSettings) -> Pipeline {
    let (lifecycle_tx, lifecycle_rx) = broadcast::channel(16);
    let (message_tx, message_rx) = broadcast::channel(16);
    let (closed_tx, closed_rx) = mpsc::channel(4);

    let (handle, controller) = alert_controller(closed_tx);
    tokio::spawn(controller.run());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let presenter = TeePresenter {
        inner: handle.clone(),
        seen: Arc::clone(&seen),
    };
    let audio = SharedAudio::default();

    let orchestrator = Orchestrator::new(
        presenter,
        audio.clone(),
        NotificationDefaults::default(),
        sound,
    );
    let cancel = CancellationToken::new();
    tokio::spawn(orchestrator.run(lifecycle_rx, message_rx, closed_rx, cancel.clone()));

    Pipeline {
        messages: message_tx,
        lifecycle: lifecycle_tx,
        handle,
        seen,
        audio,
        cancel,
    }
}

fn publish(pipeline: &Pipeline, payload: &[u8]) {
    pipeline
        .messages
        .send(Arc::new(RawMessage {
            topic: "door-events".into(),
            payload: Bytes::copy_from_slice(payload),
        }))
        .expect("orchestrator is listening");
}

/// Let spawned tasks catch up after a paused-clock jump.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn test_sound() -> SoundSettings {
    SoundSettings {
        path: "/tmp/ding.wav".into(),
        volume: 0.6,
        loop_mode: LoopMode::Loop,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn button_press_shows_the_default_alert() {
    let pipeline = spawn_pipeline(test_sound());

    // Lifecycle events are informational and must not disturb the surface.
    pipeline
        .lifecycle
        .send(LifecycleEvent::Connected)
        .expect("orchestrator is listening");

    publish(&pipeline, br#"{"event":"door_button_pressed"}"#);
    settle().await;

    assert_eq!(pipeline.handle.state(), AlertState::Showing);

    let seen = pipeline.seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body, "door button pressed");
    assert!(seen[0].title.starts_with("Door alert - "));
    assert_eq!(seen[0].duration, Duration::from_millis(3000));
    drop(seen);

    assert_eq!(
        *pipeline.audio.ops.lock().expect("ops lock"),
        vec![AudioOp::Play {
            volume: 0.6,
            looped: true,
        }]
    );

    pipeline.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn explicit_message_overrides_the_body() {
    let pipeline = spawn_pipeline(SoundSettings::default());

    publish(&pipeline, br#"{"event":"door_button_released","message":"custom text"}"#);
    settle().await;

    let seen = pipeline.seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body, "custom text");
    drop(seen);

    // Empty sound path keeps the pipeline silent.
    assert!(pipeline.audio.ops.lock().expect("ops lock").is_empty());

    pipeline.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn auto_hide_cycle_silences_the_audio() {
    let pipeline = spawn_pipeline(test_sound());

    publish(&pipeline, b"{}");
    settle().await;
    assert!(pipeline.audio.is_playing());

    // Past the display duration and the fade, the controller reports the
    // close and the orchestrator cuts the sound.
    tokio::time::sleep(Duration::from_millis(3100)).await;
    settle().await;
    assert_eq!(pipeline.handle.state(), AlertState::FadingOut);

    tokio::time::sleep(FADE_DURATION).await;
    settle().await;
    settle().await;

    assert_eq!(pipeline.handle.state(), AlertState::Hidden);
    assert!(!pipeline.audio.is_playing());
    assert_eq!(
        pipeline.audio.ops.lock().expect("ops lock").last(),
        Some(&AudioOp::Stop)
    );

    pipeline.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn rapid_events_supersede_instead_of_queueing() {
    let pipeline = spawn_pipeline(test_sound());

    publish(&pipeline, br#"{"message":"first"}"#);
    settle().await;
    publish(&pipeline, br#"{"message":"second"}"#);
    settle().await;

    let seen = pipeline.seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].body, "second");
    drop(seen);

    // Old audio stopped before the replacement started.
    let ops = pipeline.audio.ops.lock().expect("ops lock");
    assert!(matches!(ops[0], AudioOp::Play { .. }));
    assert_eq!(ops[1], AudioOp::Stop);
    assert!(matches!(ops[2], AudioOp::Play { .. }));
    drop(ops);

    // One display cycle total: the replacement restarted the timer, and
    // only its completion emits a close.
    assert_eq!(pipeline.handle.state(), AlertState::Showing);
    tokio::time::sleep(Duration::from_millis(3100) + FADE_DURATION).await;
    settle().await;
    settle().await;
    assert_eq!(pipeline.handle.state(), AlertState::Hidden);

    pipeline.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn garbage_payloads_leave_the_surface_hidden() {
    let pipeline = spawn_pipeline(test_sound());

    publish(&pipeline, b"not json at all");
    publish(&pipeline, b"[1,2,3]");
    publish(&pipeline, &[0xFF, 0xFE]);
    settle().await;

    assert_eq!(pipeline.handle.state(), AlertState::Hidden);
    assert!(pipeline.seen.lock().expect("seen lock").is_empty());
    assert!(pipeline.audio.ops.lock().expect("ops lock").is_empty());

    pipeline.cancel.cancel();
}
