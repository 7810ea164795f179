//! Transport seam between the connection state machine and the network.
//!
//! The state machine in [`crate::client`] is generic over [`Transport`] so
//! reconnect sequencing can be tested against a scripted in-memory transport
//! with paused time. [`TcpTransport`] is the production implementation:
//! plain MQTT 3.1.1 over TCP, framed by [`MqttCodec`].

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::error::Error;
use crate::packet::{MqttCodec, Packet};

/// Keep-alive window advertised in CONNECT.
const KEEP_ALIVE_SECS: u16 = 60;

/// Interval between PINGREQ probes; half the advertised window.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on TCP connect plus MQTT handshake. A broker that accepts the
/// socket but never answers CONNECT must not wedge the reconnect loop.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ── RawMessage ───────────────────────────────────────────────────────

/// An inbound message exactly as published on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Bytes,
}

// ── Traits ───────────────────────────────────────────────────────────

/// Factory for broker sessions.
pub trait Transport: Send + Sync + 'static {
    type Session: Session;

    /// Establish one session: TCP connect plus MQTT handshake.
    ///
    /// Must not block the caller beyond async awaiting; a hung handshake is
    /// bounded by the transport's own connect timeout.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Session, Error>> + Send;
}

/// One established broker session.
pub trait Session: Send {
    /// Issue a QoS-0 subscription.
    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Wait for the next inbound message.
    ///
    /// Resolves `Err` when the session drops; keep-alive traffic is handled
    /// internally and never surfaces here.
    fn next_message(&mut self) -> impl Future<Output = Result<RawMessage, Error>> + Send;

    /// Graceful close (DISCONNECT packet, then drop the socket).
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// ── TCP implementation ───────────────────────────────────────────────

/// MQTT-over-TCP transport.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    client_id: String,
}

impl TcpTransport {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl Transport for TcpTransport {
    type Session = TcpSession;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpSession, Error> {
        tokio::time::timeout(CONNECT_TIMEOUT, self.handshake(host, port))
            .await
            .map_err(|_| Error::Connect {
                message: format!("{host}:{port}: handshake timed out"),
            })?
    }
}

impl TcpTransport {
    async fn handshake(&self, host: &str, port: u16) -> Result<TcpSession, Error> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Connect {
                message: format!("{host}:{port}: {e}"),
            })?;
        stream.set_nodelay(true)?;

        let mut framed = Framed::new(stream, MqttCodec);
        framed
            .send(Packet::Connect {
                client_id: self.client_id.clone(),
                keep_alive_secs: KEEP_ALIVE_SECS,
            })
            .await?;

        match framed.next().await {
            Some(Ok(Packet::ConnAck { return_code, .. })) => {
                if return_code != 0 {
                    return Err(Error::ConnectionRefused { return_code });
                }
            }
            Some(Ok(other)) => {
                return Err(Error::Protocol {
                    message: format!("expected CONNACK, got {other:?}"),
                });
            }
            Some(Err(e)) => return Err(e),
            None => return Err(Error::ConnectionClosed),
        }

        tracing::debug!(host, port, "MQTT handshake complete");
        Ok(TcpSession {
            framed,
            next_packet_id: 1,
            next_ping: tokio::time::Instant::now() + PING_INTERVAL,
            pending: VecDeque::new(),
        })
    }
}

/// Live MQTT session over a framed TCP stream.
#[derive(Debug)]
pub struct TcpSession {
    framed: Framed<TcpStream, MqttCodec>,
    next_packet_id: u16,
    next_ping: tokio::time::Instant,
    /// Publishes that arrived while waiting for a SUBACK. Drained before
    /// the stream is read again, so nothing is reordered or lost.
    pending: VecDeque<RawMessage>,
}

impl Session for TcpSession {
    async fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        let packet_id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.wrapping_add(1).max(1);

        self.framed
            .send(Packet::Subscribe {
                packet_id,
                topic: topic.to_owned(),
            })
            .await?;

        // On an already-trafficked session (a topic change) the SUBACK may
        // interleave with publishes; park those for next_message().
        loop {
            match self.framed.next().await {
                Some(Ok(Packet::SubAck { return_code, .. })) => {
                    if return_code == 0x80 {
                        return Err(Error::SubscriptionRefused {
                            topic: topic.to_owned(),
                        });
                    }
                    return Ok(());
                }
                Some(Ok(Packet::Publish { topic, payload })) => {
                    self.pending.push_back(RawMessage { topic, payload });
                }
                Some(Ok(Packet::PingResp)) => {}
                Some(Ok(other)) => {
                    return Err(Error::Protocol {
                        message: format!("expected SUBACK, got {other:?}"),
                    });
                }
                Some(Err(e)) => return Err(e),
                None => return Err(Error::ConnectionClosed),
            }
        }
    }

    async fn next_message(&mut self) -> Result<RawMessage, Error> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }
        loop {
            tokio::select! {
                frame = self.framed.next() => match frame {
                    Some(Ok(Packet::Publish { topic, payload })) => {
                        return Ok(RawMessage { topic, payload });
                    }
                    Some(Ok(Packet::PingResp)) => {}
                    Some(Ok(Packet::Disconnect)) => return Err(Error::ConnectionClosed),
                    Some(Ok(other)) => {
                        tracing::trace!(packet = ?other, "ignoring control packet");
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(Error::ConnectionClosed),
                },
                // Inbound publishes don't count as client activity, so the
                // probe deadline lives on the session, not in this call.
                () = tokio::time::sleep_until(self.next_ping) => {
                    self.framed.send(Packet::PingReq).await?;
                    self.next_ping = tokio::time::Instant::now() + PING_INTERVAL;
                }
            }
        }
    }

    async fn close(&mut self) {
        // Best effort: the broker may already be gone.
        let _ = self.framed.send(Packet::Disconnect).await;
        let _ = self.framed.close().await;
    }
}
