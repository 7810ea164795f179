//! Configuration for the doorwatch notifier.
//!
//! A single TOML file (platform config dir, overridable) merged with
//! `DOORWATCH_`-prefixed environment variables, then translated into the
//! typed settings the broker client and pipeline consume. Out-of-range
//! values are normalized here rather than rejected: the notifier should
//! come up with a sane setup from any config it can parse at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doorwatch_core::{LoopMode, NotificationDefaults, SoundSettings};
use doorwatch_mqtt::ReconnectPolicy;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttSection,

    #[serde(default)]
    pub notification: NotificationSection,

    #[serde(default)]
    pub log: LogSection,
}

/// Broker connection settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct MqttSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Topic subscribed on every (re)connect.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Delay between reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Reconnect attempt budget. `0` retries forever.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            topic: default_topic(),
            client_id: default_client_id(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: 0,
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    1883
}
fn default_topic() -> String {
    "door-events".into()
}
fn default_client_id() -> String {
    "doorwatch".into()
}
fn default_reconnect_interval_ms() -> u64 {
    5000
}

/// Alert presentation settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct NotificationSection {
    /// On-screen time before auto-hide, in milliseconds. Must be
    /// positive; zero is coerced back to the default on read.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,

    /// Alert sound file. Empty disables audio.
    #[serde(default)]
    pub sound_path: String,

    /// Playback volume, 0.0 to 1.0. Out-of-range values are clamped.
    #[serde(default = "default_volume")]
    pub sound_volume: f32,

    /// "once" or "loop"; anything else falls back to "loop".
    #[serde(default = "default_loop_mode")]
    pub sound_loop: String,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            sound_path: String::new(),
            sound_volume: default_volume(),
            sound_loop: default_loop_mode(),
        }
    }
}

fn default_duration_ms() -> u64 {
    3000
}
fn default_volume() -> f32 {
    1.0
}
fn default_loop_mode() -> String {
    LoopMode::Loop.to_string()
}

/// File logging settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct LogSection {
    /// Directory for daily rotated log files.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Log files older than this are pruned at startup.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_retention_days() -> u32 {
    7
}

// ── Typed views ─────────────────────────────────────────────────────

impl Config {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            interval: Duration::from_millis(self.mqtt.reconnect_interval_ms),
            max_attempts: self.mqtt.max_reconnect_attempts,
        }
    }

    /// Display duration must be positive; zero falls back to the default.
    pub fn notification_defaults(&self) -> NotificationDefaults {
        let duration_ms = match self.notification.duration_ms {
            0 => default_duration_ms(),
            ms => ms,
        };
        NotificationDefaults {
            duration: Duration::from_millis(duration_ms),
        }
    }

    /// Sound settings with volume clamped and the loop mode coerced.
    pub fn sound_settings(&self) -> SoundSettings {
        SoundSettings {
            path: self.notification.sound_path.clone(),
            volume: self.notification.sound_volume.clamp(0.0, 1.0),
            loop_mode: LoopMode::coerce(&self.notification.sound_loop),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "doorwatch", "doorwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("doorwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the configuration from the given file (or the canonical path)
/// plus `DOORWATCH_`-prefixed environment variables.
///
/// A missing file is not an error: defaults apply and the environment
/// can still override them.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("DOORWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize the config to TOML at the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────
