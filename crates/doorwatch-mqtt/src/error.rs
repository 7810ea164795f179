use thiserror::Error;

/// Errors from the MQTT transport and connection machinery.
///
/// None of these are fatal to the client: the reconnect cycle absorbs
/// every connection-scoped failure, and the orchestrating layer only ever
/// sees them through lifecycle signals and logs.
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connect or MQTT handshake failed.
    #[error("broker connection failed: {message}")]
    Connect { message: String },

    /// The broker refused the CONNECT packet.
    ///
    /// Return codes per MQTT 3.1.1 §3.2.2.3 (1 = bad protocol version,
    /// 2 = identifier rejected, 3 = server unavailable, 4 = bad credentials,
    /// 5 = not authorized).
    #[error("broker rejected connection: {}", connack_reason(*.return_code))]
    ConnectionRefused { return_code: u8 },

    /// The broker rejected a subscription (SUBACK return code 0x80).
    #[error("broker rejected subscription to '{topic}'")]
    SubscriptionRefused { topic: String },

    /// A packet violated the protocol subset we speak.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The broker closed the session (DISCONNECT or EOF).
    #[error("broker closed the connection")]
    ConnectionClosed,

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map a CONNACK return code to a human-readable category.
fn connack_reason(code: u8) -> &'static str {
    match code {
        1 => "unacceptable protocol version",
        2 => "client identifier rejected",
        3 => "server unavailable",
        4 => "bad user name or password",
        5 => "not authorized",
        _ => "unknown error",
    }
}
