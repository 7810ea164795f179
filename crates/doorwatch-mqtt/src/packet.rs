//! MQTT 3.1.1 packet subset and wire codec.
//!
//! Only the packets a QoS-0 subscriber needs: CONNECT/CONNACK,
//! SUBSCRIBE/SUBACK, inbound PUBLISH, PINGREQ/PINGRESP, DISCONNECT.
//! Frames are length-delimited with MQTT's variable-byte remaining-length
//! encoding, decoded incrementally through [`tokio_util::codec::Decoder`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;

/// Protocol level byte for MQTT 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

/// CONNECT flag: clean session, no will, no credentials.
const CONNECT_FLAGS_CLEAN_SESSION: u8 = 0x02;

/// Largest remaining-length value encodable in four bytes (MQTT 2.2.3).
const MAX_REMAINING_LENGTH: usize = 268_435_455;

// ── Packet ───────────────────────────────────────────────────────────

/// A decoded or to-be-encoded MQTT control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect {
        client_id: String,
        keep_alive_secs: u16,
    },
    ConnAck {
        session_present: bool,
        return_code: u8,
    },
    Subscribe {
        packet_id: u16,
        topic: String,
    },
    SubAck {
        packet_id: u16,
        return_code: u8,
    },
    Publish {
        topic: String,
        payload: Bytes,
    },
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet {
    /// CONNACK return code 0 means the broker accepted the connection.
    pub fn connack_accepted(&self) -> bool {
        matches!(
            self,
            Packet::ConnAck {
                return_code: 0,
                ..
            }
        )
    }
}

// ── Codec ────────────────────────────────────────────────────────────

/// Framing codec for the packet subset above.
#[derive(Debug, Default)]
pub struct MqttCodec;

impl Decoder for MqttCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Error> {
        let Some((header, len, header_len)) = peek_fixed_header(src)? else {
            return Ok(None);
        };

        if src.len() < header_len + len {
            // Whole frame not buffered yet.
            src.reserve(header_len + len - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let mut body = src.split_to(len).freeze();
        decode_body(header, &mut body).map(Some)
    }
}

impl Encoder<Packet> for MqttCodec {
    type Error = Error;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Error> {
        match packet {
            Packet::Connect {
                client_id,
                keep_alive_secs,
            } => {
                let mut body = BytesMut::new();
                put_string(&mut body, "MQTT");
                body.put_u8(PROTOCOL_LEVEL);
                body.put_u8(CONNECT_FLAGS_CLEAN_SESSION);
                body.put_u16(keep_alive_secs);
                put_string(&mut body, &client_id);
                put_frame(dst, 0x10, &body);
            }
            Packet::Subscribe { packet_id, topic } => {
                let mut body = BytesMut::new();
                body.put_u16(packet_id);
                put_string(&mut body, &topic);
                body.put_u8(0); // requested QoS 0
                // SUBSCRIBE carries mandatory flag bits 0b0010.
                put_frame(dst, 0x82, &body);
            }
            Packet::PingReq => put_frame(dst, 0xC0, &[]),
            Packet::Disconnect => put_frame(dst, 0xE0, &[]),
            // Broker-originated packets; the client never sends these.
            Packet::ConnAck { .. }
            | Packet::SubAck { .. }
            | Packet::Publish { .. }
            | Packet::PingResp => {
                return Err(Error::Protocol {
                    message: "attempted to encode a broker-side packet".into(),
                });
            }
        }
        Ok(())
    }
}

// ── Frame helpers ────────────────────────────────────────────────────

/// Read the fixed header without consuming, returning
/// `(header_byte, remaining_length, total_header_bytes)`.
///
/// `Ok(None)` means more bytes are needed.
fn peek_fixed_header(src: &BytesMut) -> Result<Option<(u8, usize, usize)>, Error> {
    if src.len() < 2 {
        return Ok(None);
    }

    let header = src[0];
    let mut len: usize = 0;
    let mut shift = 0u32;

    for (i, &byte) in src[1..].iter().take(4).enumerate() {
        len += usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            if len > MAX_REMAINING_LENGTH {
                return Err(Error::Protocol {
                    message: format!("remaining length {len} exceeds protocol maximum"),
                });
            }
            return Ok(Some((header, len, 1 + i + 1)));
        }
        shift += 7;
    }

    if src.len() >= 5 {
        // Four length bytes all had the continuation bit set.
        return Err(Error::Protocol {
            message: "malformed remaining-length encoding".into(),
        });
    }
    Ok(None)
}

fn put_frame(dst: &mut BytesMut, header: u8, body: &[u8]) {
    dst.put_u8(header);
    put_remaining_length(dst, body.len());
    dst.put_slice(body);
}

fn put_remaining_length(dst: &mut BytesMut, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        dst.put_u8(byte);
        if len == 0 {
            break;
        }
    }
}

fn put_string(dst: &mut BytesMut, s: &str) {
    debug_assert!(s.len() <= usize::from(u16::MAX));
    dst.put_u16(s.len() as u16);
    dst.put_slice(s.as_bytes());
}

// ── Body decoding ────────────────────────────────────────────────────

fn decode_body(header: u8, body: &mut Bytes) -> Result<Packet, Error> {
    let packet_type = header >> 4;
    match packet_type {
        2 => {
            let flags = take_u8(body)?;
            let return_code = take_u8(body)?;
            Ok(Packet::ConnAck {
                session_present: flags & 0x01 != 0,
                return_code,
            })
        }
        3 => {
            let qos = (header >> 1) & 0x03;
            let topic = take_string(body)?;
            if qos > 0 {
                // We only subscribe at QoS 0, but tolerate a broker that
                // downgrades differently: skip the packet identifier.
                let _packet_id = take_u16(body)?;
            }
            Ok(Packet::Publish {
                topic,
                payload: body.split_off(0),
            })
        }
        9 => {
            let packet_id = take_u16(body)?;
            let return_code = take_u8(body)?;
            Ok(Packet::SubAck {
                packet_id,
                return_code,
            })
        }
        13 => Ok(Packet::PingResp),
        14 => Ok(Packet::Disconnect),
        other => Err(Error::Protocol {
            message: format!("unexpected packet type {other} from broker"),
        }),
    }
}

fn take_u8(body: &mut Bytes) -> Result<u8, Error> {
    if body.is_empty() {
        return Err(truncated());
    }
    Ok(body.get_u8())
}

fn take_u16(body: &mut Bytes) -> Result<u16, Error> {
    if body.len() < 2 {
        return Err(truncated());
    }
    Ok(body.get_u16())
}

fn take_string(body: &mut Bytes) -> Result<String, Error> {
    let len = usize::from(take_u16(body)?);
    if body.len() < len {
        return Err(truncated());
    }
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| Error::Protocol {
        message: "string field is not valid UTF-8".into(),
    })
}

fn truncated() -> Error {
    Error::Protocol {
        message: "truncated packet body".into(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
