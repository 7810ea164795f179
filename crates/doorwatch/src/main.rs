mod audio;
mod cli;
mod error;
mod logging;
mod presenter;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use doorwatch_core::{Orchestrator, alert_controller};
use doorwatch_mqtt::{LifecycleEvent, MqttClient, TcpTransport};

use crate::audio::RodioSink;
use crate::cli::Cli;
use crate::error::AppError;
use crate::presenter::TerminalPresenter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = doorwatch_config::load_config(cli.config.as_deref())?;

    // Held for the process lifetime so file logs flush on exit.
    let _guard = logging::init_tracing(cli.verbose, &config.log)?;

    write_default_config_if_missing(&cli, &config);
    apply_overrides(&mut config, &cli);

    let host = config.mqtt.host.clone();
    let port = config.mqtt.port;
    info!(%host, port, topic = %config.mqtt.topic, "starting doorwatch");
    info!(
        duration_ms = config.notification.duration_ms,
        sound = %if config.notification.sound_path.is_empty() {
            "disabled"
        } else {
            config.notification.sound_path.as_str()
        },
        volume = config.notification.sound_volume,
        "notification settings"
    );

    // Broker client
    let client = MqttClient::new(
        TcpTransport::new(config.mqtt.client_id.clone()),
        config.reconnect_policy(),
    );
    client.subscribe(config.mqtt.topic.clone());

    let lifecycle_for_exit = client.lifecycle();
    let lifecycle = client.lifecycle();
    let messages = client.messages();
    client.start(&host, port);

    // Presentation surface
    let (closed_tx, closed_rx) = mpsc::channel(4);
    let (handle, controller) = alert_controller(closed_tx);
    tokio::spawn(controller.run());
    tokio::spawn(presenter::watch_surface(handle.clone()));

    // Pipeline
    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(
        TerminalPresenter::new(handle),
        RodioSink::new(),
        config.notification_defaults(),
        config.sound_settings(),
    );
    let pipeline = tokio::spawn(orchestrator.run(lifecycle, messages, closed_rx, cancel.clone()));

    let result = wait_for_shutdown(lifecycle_for_exit, &host, port).await;

    client.stop();
    cancel.cancel();
    let _ = pipeline.await;
    info!("doorwatch stopped");
    result
}

/// Block until Ctrl-C or the client gives up on the broker for good.
async fn wait_for_shutdown(
    mut lifecycle: broadcast::Receiver<LifecycleEvent>,
    host: &str,
    port: u16,
) -> Result<(), AppError> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                return Ok(());
            }
            event = lifecycle.recv() => match event {
                Ok(LifecycleEvent::Error { message }) => {
                    return Err(AppError::Connection {
                        host: host.to_owned(),
                        port,
                        message,
                    });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}

/// First run convenience: materialize the defaults at the canonical path
/// so operators have a file to edit. Never overwrites an existing file
/// and never blocks startup.
fn write_default_config_if_missing(cli: &Cli, config: &doorwatch_config::Config) {
    if cli.config.is_some() || doorwatch_config::config_path().exists() {
        return;
    }
    if let Err(err) = doorwatch_config::save_config(config) {
        tracing::warn!(%err, "could not write default config file");
    }
}

fn apply_overrides(config: &mut doorwatch_config::Config, cli: &Cli) {
    if let Some(ref host) = cli.host {
        config.mqtt.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.mqtt.port = port;
    }
    if let Some(ref topic) = cli.topic {
        config.mqtt.topic.clone_from(topic);
    }
    if cli.no_sound {
        config.notification.sound_path.clear();
    }
}
