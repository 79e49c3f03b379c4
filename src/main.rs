//! surface-sync - controller-side state sync for a DAW control surface
//!
//! Mirrors the host's device, page and track lists plus the remote-control
//! parameters, and drives the surface's encoders from that mirror. Talks to
//! the host over SysEx MIDI, or to a built-in simulated host.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surface_sync::cli::{self, ReplCommand};
use surface_sync::config::{AppConfig, ConfigReload, ConfigWatcher, TransportMode};
use surface_sync::paths::AppPaths;
use surface_sync::protocol::{HostMessage, MessageCodec, SysExCodec};
use surface_sync::sim::SimulatedHost;
use surface_sync::state::StateEvent;
use surface_sync::surface::{ConsoleSurface, ControlSurface};
use surface_sync::sync::SyncController;
use surface_sync::transport::{
    midi::list_ports_formatted, LoopbackTransport, MidiTransport, Transport,
};

/// surface-sync - keep a control surface in step with the DAW
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write logs to a daily file next to the config
    #[arg(long)]
    log_file: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Run against the built-in simulated host
    #[arg(long)]
    simulate: bool,

    /// Don't start the interactive prompt
    #[arg(long)]
    no_repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect(args.config.as_deref());

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args.log_level, args.log_file.then_some(&paths))?;

    info!("Starting surface-sync v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", paths.config.display());

    let (config_watcher, config) = if paths.config.exists() {
        let (watcher, config) = ConfigWatcher::new(paths.config.clone()).await?;
        info!("Configuration loaded successfully with hot-reload enabled");
        (Some(watcher), config)
    } else {
        warn!("⚠️  {} not found, using defaults", paths.config.display());
        (None, AppConfig::default())
    };

    if args.list_ports {
        list_ports_formatted(&config.transport);
        return Ok(());
    }

    run_app(config, config_watcher, &args).await?;

    info!("surface-sync shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    mut config_watcher: Option<ConfigWatcher>,
    args: &Args,
) -> Result<()> {
    let settings = config.sync_settings();
    let mut controller = SyncController::new(settings.clone(), config.bindings());
    let mut surface = ConsoleSurface::new("console", settings.parameter_count);

    // The controller already logs connection, device and track changes
    controller.subscribe(Arc::new(|event: &StateEvent| debug!("🔄 {:?}", event)));

    let mut transport: Box<dyn Transport> =
        if args.simulate || config.transport.mode == TransportMode::Simulated {
            let (controller_end, host_end) = LoopbackTransport::pair("controller", "sim");
            let host = SimulatedHost::new(&config.simulator(), settings.parameter_count);
            tokio::spawn(async move {
                if let Err(e) = host.run(host_end).await {
                    warn!("⚠️  Simulated host failed: {}", e);
                }
            });
            Box::new(controller_end)
        } else {
            let mut midi = MidiTransport::new(&config.transport);
            midi.connect()?;
            Box::new(midi)
        };
    info!("Transport ready: {}", transport.name());

    let mut frames = transport
        .take_receiver()
        .ok_or_else(|| anyhow!("Transport receiver already taken"))?;

    let (repl_tx, mut repl_rx) = mpsc::channel(32);
    if args.no_repl {
        drop(repl_tx);
    } else {
        cli::spawn_repl(repl_tx);
    }

    let codec = SysExCodec;
    controller.start();
    flush(&mut controller, transport.as_mut(), &mut surface, &codec);

    info!("Ready to sync with the host!");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(frame) = frames.recv() => {
                match codec.decode(&frame) {
                    Ok(message) => {
                        debug!("📥 {}", message.kind());
                        controller.handle_host_message(message);
                    }
                    Err(e) => warn!("⚠️  Dropping frame {}: {}", hex::encode_upper(&frame), e),
                }
            }

            Some(command) = repl_rx.recv() => {
                match command {
                    ReplCommand::Input(events) => {
                        for event in events {
                            controller.handle_input(event);
                        }
                    }
                    ReplCommand::Status => cli::print_status(&controller),
                    ReplCommand::List(kind) => cli::print_list(&controller, kind),
                    ReplCommand::Params => cli::print_parameters(&controller),
                    ReplCommand::Disconnect => controller.handle_host_message(HostMessage::HostDeactivated),
                    ReplCommand::Connect => controller.start(),
                    ReplCommand::Quit => {
                        info!("Quit requested");
                        break;
                    }
                }
            }

            Some(reload) = next_config(&mut config_watcher) => {
                info!("📝 Configuration file changed, reloading...");
                if !reload.restart_required.is_empty() {
                    warn!("⚠️  Restart to apply: {}", reload.restart_required.join(", "));
                }
                controller.reconfigure(reload.config.sync_settings(), reload.config.bindings());
                info!("✅ Configuration reloaded");
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }

        flush(&mut controller, transport.as_mut(), &mut surface, &codec);
    }

    info!("Shutting down...");
    transport.close();
    Ok(())
}

/// Send queued messages to the host and apply queued surface commands
fn flush(
    controller: &mut SyncController,
    transport: &mut dyn Transport,
    surface: &mut ConsoleSurface,
    codec: &SysExCodec,
) {
    for message in controller.take_outbound() {
        match codec.encode(&message) {
            Ok(frame) => {
                trace!("📤 {} {}", message.kind(), hex::encode_upper(&frame));
                if let Err(e) = transport.send(&frame) {
                    warn!("⚠️  Failed to send {}: {}", message.kind(), e);
                }
            }
            Err(e) => warn!("⚠️  Failed to encode {}: {}", message.kind(), e),
        }
    }

    surface.apply_all(&controller.take_surface_commands());
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<ConfigReload> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

fn init_logging(
    level: &str,
    file: Option<&AppPaths>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match file {
        Some(paths) => {
            paths.ensure_logs_dir()?;
            let appender = tracing_appender::rolling::daily(&paths.logs_dir, "surface-sync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("⚠️  Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
