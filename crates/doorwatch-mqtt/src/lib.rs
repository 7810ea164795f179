//! Minimal MQTT 3.1.1 subscriber with auto-reconnect.
//!
//! The client speaks just enough of the protocol for an at-most-once,
//! single-topic consumer: CONNECT, SUBSCRIBE, inbound PUBLISH, keep-alive.
//! Everything else (publishing, QoS > 0, auth) is out of scope.

pub mod client;
pub mod error;
pub mod packet;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ConnectionState, LifecycleEvent, MqttClient, ReconnectPolicy};
pub use error::Error;
pub use transport::{RawMessage, Session, TcpTransport, Transport};
