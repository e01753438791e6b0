//! Launchkey Surface - Rust implementation
//!
//! Drives a Novation Launchkey MK2 as a DAW control surface.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchkey_surface::config::{AppConfig, ConfigWatcher};
use launchkey_surface::control_mapping::{load_default_mappings, ControlMappingDB};
use launchkey_surface::device::{discovery, LaunchkeyDriver};
use launchkey_surface::host::{ConsoleHost, Host};
use launchkey_surface::modes::layout::{self, MODE_SELECTOR, SESSION_MODE};
use launchkey_surface::{sniffer, HardwareVariant, Surface};

/// Launchkey Surface - Novation Launchkey MK2 control surface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Run in sniffer mode
    #[arg(long)]
    sniffer: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print the mode layout of a model and exit
    #[arg(long, value_name = "MODEL")]
    print_layout: Option<LayoutModel>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutModel {
    /// Launchkey 49 / 61
    #[value(name = "full")]
    Full,
    /// Launchkey 25
    #[value(name = "25")]
    TwentyFive,
}

impl From<LayoutModel> for HardwareVariant {
    fn from(model: LayoutModel) -> Self {
        match model {
            LayoutModel::Full => HardwareVariant::FullSize,
            LayoutModel::TwentyFive => HardwareVariant::TwentyFiveKey,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        discovery::print_ports();
        return Ok(());
    }

    if let Some(model) = args.print_layout {
        return print_layout(model.into());
    }

    if args.sniffer {
        // Fall back to every input when there is no usable config
        let pattern = AppConfig::load(&args.config)
            .await
            .map(|config| config.midi.input_port)
            .ok();
        return sniffer::run_cli_sniffer(pattern.as_deref()).await;
    }

    info!("Starting Launchkey Surface...");
    info!("Configuration file: {}", args.config);

    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    run_app((*initial_config).clone(), config_watcher, shutdown_signal()).await?;

    info!("Launchkey Surface shutdown complete");
    Ok(())
}

async fn load_controls(config: &AppConfig) -> Result<ControlMappingDB> {
    match &config.controls_csv {
        Some(path) => ControlMappingDB::load_from_csv(path).await,
        None => load_default_mappings(),
    }
}

async fn run_app(
    mut config: AppConfig,
    mut config_watcher: ConfigWatcher,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let controls = load_controls(&config)
        .await
        .context("Failed to load control table")?;

    let mut surface = Surface::new(&config, controls);
    surface.subscribe_identified(Arc::new(|variant: HardwareVariant| {
        info!("Launchkey {} model ready", variant);
    }));

    let host = ConsoleHost::new("console");
    host.init().await?;

    let mut device = LaunchkeyDriver::new(&config.midi);
    let mut device_rx = device
        .take_event_receiver()
        .context("Failed to get Launchkey event receiver")?;

    device.connect()?;
    surface.connect(Instant::now());

    info!("Ready to process MIDI events!");

    tokio::pin!(shutdown);

    loop {
        let deadline = surface.next_deadline();

        tokio::select! {
            _ = wait_for(deadline) => {
                surface.poll(Instant::now());
            }

            Some(event) = device_rx.recv() => {
                if !surface.handle_midi(&event.raw_data) {
                    debug!("Unhandled MIDI: {:02X?}", event.raw_data);
                }
            }

            Some(new_config) = config_watcher.next_config() => {
                apply_config(&mut config, new_config, &mut device, &mut surface);
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }

        flush(&device, &mut surface, &host).await;
    }

    info!("Shutting down...");
    surface.disconnect();
    flush(&device, &mut surface, &host).await;
    device.disconnect();
    host.shutdown().await?;

    Ok(())
}

/// Sleep until the surface's next timer, or forever if none is armed
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn apply_config(
    config: &mut AppConfig,
    new_config: AppConfig,
    device: &mut LaunchkeyDriver,
    surface: &mut Surface,
) {
    info!("Configuration file changed, reloading...");

    if config.controls_csv != new_config.controls_csv {
        warn!("controls_csv changed; restart to load the new control table");
    }

    if config.ports_changed(&new_config) {
        device.set_ports(&new_config.midi);
        match device.connect() {
            Ok(()) => surface.port_settings_changed(Instant::now()),
            Err(e) => {
                warn!("Failed to reconnect Launchkey: {}", e);
                surface.disconnect();
            }
        }
    }

    if config.skin != new_config.skin {
        surface.set_skin(new_config.skin);
    }
    if config.session.return_tracks != new_config.session.return_tracks {
        surface.on_return_tracks_changed(new_config.session.return_tracks);
    }

    *config = new_config;
    info!("Configuration reloaded");
}

/// Send queued MIDI to the device and queued actions to the host
async fn flush(device: &LaunchkeyDriver, surface: &mut Surface, host: &ConsoleHost) {
    let outgoing = surface.take_outgoing();
    if !outgoing.is_empty() {
        if device.is_connected() {
            if let Err(e) = device.send_all(&outgoing) {
                warn!("Failed to send to Launchkey: {}", e);
            }
        } else {
            debug!("Dropping {} messages, Launchkey not connected", outgoing.len());
        }
    }

    for action in surface.take_actions() {
        if let Err(e) = host.execute(&action).await {
            warn!("Host '{}' failed {}: {}", host.name(), action.name(), e);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

fn print_layout(variant: HardwareVariant) -> Result<()> {
    println!("\n{}", format!("=== Launchkey MK2 layout ({} model) ===", variant).bold().cyan());

    let db = load_default_mappings()?;
    println!(
        "  Controls on this model: {}",
        db.count_for_variant(variant).to_string().green()
    );

    println!("\n{}", "Control groups:".bold());
    let mut groups: Vec<&str> = db.groups().collect();
    groups.sort_unstable();
    for group in groups {
        let count = db.get_group(group).map_or(0, Vec::len);
        println!("  {:20} {}", group.yellow(), count);
    }

    let mut tree = layout::build(variant, &db)?;
    tree.select(MODE_SELECTOR, SESSION_MODE)?;

    println!("\n{}", "Mode groups:".bold());
    for group in tree.groups() {
        let skinned = if group.skinned { " [skinned]".dimmed().to_string() } else { String::new() };
        println!("  {}{}", group.name.yellow(), skinned);
        for mode in group.modes() {
            let marker = if group.selected_mode() == Some(mode.name.as_str()) {
                "*".bright_green()
            } else {
                " ".normal()
            };
            let state = if mode.enabled { "" } else { " (disabled)" };
            println!(
                "    {} {:16} {:?}{}",
                marker,
                mode.name,
                mode.behaviour,
                state.dimmed()
            );
        }
    }

    println!("\n{}", "Active bindings:".bold());
    for (control_id, target) in tree.bindings().active() {
        println!(
            "  {:20} {} {}",
            control_id.bright_white(),
            serde_json::to_string(target)?.green(),
            tree.bindings().owner_of(control_id).unwrap_or_default().dimmed()
        );
    }
    println!();

    Ok(())
}
