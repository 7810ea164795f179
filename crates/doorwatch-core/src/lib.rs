//! Event-to-alert pipeline: payload decoding, alert dispatch, the alert
//! lifecycle controller, and the orchestrator that ties them to a broker
//! client and the host's presentation/audio surfaces.

pub mod alert;
pub mod dispatch;
pub mod event;
pub mod orchestrator;
pub mod surface;

pub use alert::{alert_controller, AlertController, AlertHandle, AlertState, FADE_DURATION};
pub use dispatch::{to_alert, AlertRequest, NotificationDefaults};
pub use event::{decode, DecodeError, DoorEvent};
pub use orchestrator::Orchestrator;
pub use surface::{AudioSink, LoopMode, Presenter, SoundSettings};
