//! Clap derive structures for the `doorwatch` binary.

use std::path::PathBuf;

use clap::Parser;

/// doorwatch -- desktop notifier for MQTT door events
#[derive(Debug, Parser)]
#[command(
    name = "doorwatch",
    version,
    about = "Show desktop alerts (and play a sound) for door events published over MQTT",
    long_about = "Connects to an MQTT broker, subscribes to a door-event topic, and turns\n\
        each published event into a timed desktop alert with an optional sound.\n\
        The connection retries on its own; configuration comes from a TOML file\n\
        plus DOORWATCH_-prefixed environment variables, with the flags below\n\
        taking precedence over both."
)]
pub struct Cli {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Broker hostname (overrides config)
    #[arg(long, env = "DOORWATCH_MQTT__HOST")]
    pub host: Option<String>,

    /// Broker port (overrides config)
    #[arg(long, env = "DOORWATCH_MQTT__PORT")]
    pub port: Option<u16>,

    /// Topic to subscribe to (overrides config)
    #[arg(long, short = 't', env = "DOORWATCH_MQTT__TOPIC")]
    pub topic: Option<String>,

    /// Disable the alert sound regardless of config
    #[arg(long)]
    pub no_sound: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}
