//! MFD Panel - Entry Point
//!
//! Connects to the gateway, keeps the widget layout in sync with device status
//! and turns line commands from stdin into channel commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mfd_panel::{
    core::{config::Config, events::PanelEvent, state::PanelState},
    panel::{Panel, PanelAction, PanelCommand, HELP},
    EventSender, PanelClient, SessionOptions,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mfd-panel", about = "Control panel for the MFD lighting gateway")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gateway host
    #[arg(long)]
    host: Option<String>,

    /// Gateway WebSocket port
    #[arg(long)]
    port: Option<u16>,

    /// Subscription file sent after connecting
    #[arg(long)]
    subscription: Option<PathBuf>,

    /// Reconnect with backoff when the connection drops
    #[arg(long)]
    reconnect: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };

    if let Some(Commands::InitConfig { force }) = cli.command {
        if config_path.exists() && !force {
            anyhow::bail!("Config file already exists: {:?} (use --force)", config_path);
        }
        Config::write_default(&config_path)?;
        info!("Wrote default config to {:?}", config_path);
        return Ok(());
    }

    let mut config = Config::load_from(&config_path)?;
    if let Some(host) = cli.host {
        config.connection.host = host;
    }
    if let Some(port) = cli.port {
        config.connection.port = port;
    }
    if let Some(path) = cli.subscription {
        config.subscription.path = Some(path);
    }
    if cli.reconnect {
        config.connection.reconnect = true;
    }

    // Everything runs on one thread: session, timers and stdin
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let subscription = match config.subscription.load_blob() {
        Ok(blob) => blob,
        Err(e) => {
            warn!("{:#}; connecting without a subscription", e);
            None
        }
    };

    let (event_tx, mut event_rx) = EventSender::channel();
    let options = SessionOptions::from_config(&config, subscription);
    info!("Starting MFD panel ({} widgets)", config.widgets.len());
    let mut client = PanelClient::connect(options, event_tx);

    let mut panel = Panel::from_config(&config.widgets);
    let mut state = PanelState::default();

    let refresh_period = Duration::from_millis(config.panel.refresh_interval_ms.max(1));
    let mut refresh = tokio::time::interval(refresh_period);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => handle_event(event, &mut panel, &mut state),
            _ = refresh.tick() => {
                let signals = client.signals();
                let store = signals.read();
                for widget in panel.refresh(&store) {
                    info!("Widget update: {}", widget);
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<PanelCommand>() {
                    Ok(PanelCommand::Quit) => break,
                    Ok(command) => handle_command(command, &client, &mut panel, &state),
                    Err(e) => println!("{}", e),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down");
    client.close();
    if tokio::time::timeout(Duration::from_secs(2), client.closed()).await.is_err() {
        warn!("Session did not close in time");
    }
    Ok(())
}

fn handle_event(event: PanelEvent, panel: &mut Panel, state: &mut PanelState) {
    match event {
        PanelEvent::Connected => state.connected = true,
        PanelEvent::Disconnected => state.connected = false,
        PanelEvent::Heartbeat => state.heartbeats += 1,
        PanelEvent::SignalChanged { signal_id, state: value } => {
            for widget in panel.on_signal(signal_id, value) {
                info!("Widget update: {}", widget);
            }
        }
    }
}

fn handle_command(command: PanelCommand, client: &PanelClient, panel: &mut Panel, state: &PanelState) {
    match command {
        PanelCommand::Gesture { channel_id, gesture } => {
            let Some(action) = panel.channel_gesture(channel_id, gesture) else {
                return;
            };
            if !client.is_connected() {
                println!("not connected, command skipped");
            }
            match action {
                PanelAction::Momentary { channel_id, active } => client.send_momentary(channel_id, active),
                PanelAction::Dimmer { channel_id, level } => client.send_dimmer(channel_id, level),
            }
        }
        PanelCommand::Signal(signal_id) => match client.signal_state(signal_id) {
            Some(value) => println!(
                "signal {}: {} ({})",
                signal_id,
                value,
                if value == 1 { "active" } else { "inactive" }
            ),
            None => println!("signal {}: no data", signal_id),
        },
        PanelCommand::Widgets => {
            if panel.widgets().is_empty() {
                println!("no widgets configured");
            }
            for (index, widget) in panel.widgets().iter().enumerate() {
                println!("{:>3}  {}", index, widget);
            }
        }
        PanelCommand::Status => {
            let signals = client.signals();
            let store = signals.read();
            println!(
                "{} | heartbeats: {} | signals known: {}",
                if state.connected { "connected" } else { "disconnected" },
                state.heartbeats,
                store.len()
            );
            for (signal_id, value) in store.snapshot() {
                println!("  signal {:>5} = {}", signal_id, value);
            }
        }
        PanelCommand::Help => println!("{}", HELP),
        PanelCommand::Quit => {}
    }
}
