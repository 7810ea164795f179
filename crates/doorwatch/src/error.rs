//! Binary error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const CONFIG: i32 = 2;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    #[error("Failed to load configuration")]
    #[diagnostic(
        code(doorwatch::config),
        help(
            "Check the TOML syntax and key types in your config file.\n\
             Run with --config <FILE> to point at a different file."
        )
    )]
    Config(#[from] doorwatch_config::ConfigError),

    #[error("Gave up connecting to the broker at {host}:{port}: {message}")]
    #[diagnostic(
        code(doorwatch::connection),
        help(
            "Check that the broker is running and accessible.\n\
             Host and port come from [mqtt] in the config, or --host/--port.\n\
             Set max_reconnect_attempts = 0 to retry forever."
        )
    )]
    Connection {
        host: String,
        port: u16,
        message: String,
    },

    #[error("Failed to set up file logging in {dir}")]
    #[diagnostic(
        code(doorwatch::logging),
        help("Check that the [log] dir exists and is writable, or change it.")
    )]
    Logging {
        dir: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Logging { .. } => exit_code::CONFIG,
            Self::Connection { .. } => exit_code::CONNECTION,
        }
    }
}
