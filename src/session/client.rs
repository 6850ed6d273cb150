//! WebSocket client for the MFD gateway.
//!
//! `PanelClient` is the handle the UI layer holds. The session itself runs as
//! a single task that selects over inbound frames, watchdog ticks and
//! outbound requests, so a frame is fully dispatched before the next one is
//! read.

use futures_util::{SinkExt, StreamExt};
use mfd_protocol::{dimmer, momentary, Envelope};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use super::dispatch::SessionCore;
use super::liveness::Watchdog;
use crate::core::config::Config;
use crate::core::events::EventSender;
use crate::core::state::{SharedSignalStore, SignalStateStore};
use crate::error::SessionError;

/// Reconnect delays (grows 1.5x per failed attempt)
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    fn next(&self, current: Duration) -> Duration {
        (current * 3 / 2).min(self.max)
    }
}

/// Everything a session needs to run
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Gateway endpoint, e.g. `ws://127.0.0.1:8888/ws`
    pub url: String,
    pub watchdog_interval: Duration,
    pub heartbeat_timeout: Duration,
    /// Sent verbatim as the first frame after every open
    pub subscription: Option<String>,
    /// `None` leaves a closed session closed
    pub reconnect: Option<Backoff>,
}

impl SessionOptions {
    pub fn from_config(config: &Config, subscription: Option<String>) -> Self {
        let conn = &config.connection;
        Self {
            url: conn.url(),
            watchdog_interval: config.liveness.watchdog_interval(),
            heartbeat_timeout: config.liveness.heartbeat_timeout(),
            subscription,
            reconnect: conn.reconnect.then(|| Backoff {
                initial: Duration::from_millis(conn.reconnect_initial_ms),
                max: Duration::from_millis(conn.reconnect_max_ms),
            }),
        }
    }
}

/// Requests from the handle to the session task
#[derive(Debug)]
enum Command {
    Send(Envelope),
    Close,
}

/// How a connection ended
enum Exit {
    /// The peer closed or the transport failed
    Lost,
    /// `close()` was called or the handle was dropped
    Shutdown,
}

/// Handle to a running gateway session.
///
/// Dropping the handle tears the session down.
pub struct PanelClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
    signals: SharedSignalStore,
    /// Taken by the first `closed()` that sees the task finish
    task: Option<JoinHandle<()>>,
}

impl PanelClient {
    /// Start a session. Must be called from within a tokio runtime.
    pub fn connect(options: SessionOptions, event_tx: EventSender) -> Self {
        let signals: SharedSignalStore = Arc::new(RwLock::new(SignalStateStore::new()));
        let core = SessionCore::new(
            options.heartbeat_timeout,
            Arc::clone(&signals),
            event_tx,
            options.subscription.clone(),
        );
        let connected = core.connected_flag();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_session(options, core, cmd_rx));

        Self {
            cmd_tx,
            connected,
            signals,
            task: Some(task),
        }
    }

    /// Whether the gateway connection is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Queue an envelope for sending.
    pub fn try_send(&self, envelope: Envelope) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::ChannelUnavailable);
        }
        self.cmd_tx
            .send(Command::Send(envelope))
            .map_err(|_| SessionError::Closed)
    }

    /// Press or release a momentary channel. Skipped while not connected.
    pub fn send_momentary(&self, channel_id: u16, active: bool) {
        self.send_or_skip(momentary(channel_id, active));
    }

    /// Set a dimmer level (clamped to 0-1000). Skipped while not connected.
    pub fn send_dimmer(&self, channel_id: u16, level: i32) {
        self.send_or_skip(dimmer(channel_id, level));
    }

    fn send_or_skip(&self, envelope: Envelope) {
        if let Err(e) = self.try_send(envelope) {
            debug!("Skipping send: {}", e);
        }
    }

    /// Last reported state of a signal, `None` if never reported.
    pub fn signal_state(&self, signal_id: u16) -> Option<u8> {
        self.signals.read().get(signal_id)
    }

    /// Shared read access to the signal store
    pub fn signals(&self) -> SharedSignalStore {
        Arc::clone(&self.signals)
    }

    /// Ask the session to close the connection and stop.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }

    /// Wait until the session task has finished. Returns at once if it
    /// already has.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}

impl Drop for PanelClient {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

// ── Session task ─────────────────────────────────────────────────────

async fn run_session(
    options: SessionOptions,
    mut core: SessionCore,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut backoff = options.reconnect.map(|b| b.initial);

    loop {
        info!("Connecting to gateway at {}...", options.url);
        core.on_connecting();

        let attempt = tokio::select! {
            result = tokio_tungstenite::connect_async(options.url.as_str()) => result,
            _ = close_requested(&mut cmd_rx) => {
                info!("Session closed while connecting");
                core.on_closed();
                return;
            }
        };

        match attempt {
            Ok((ws_stream, _)) => {
                if let Some(b) = options.reconnect {
                    backoff = Some(b.initial);
                }

                let exit = match serve_connection(ws_stream, &mut core, &mut cmd_rx, &options).await {
                    Ok(exit) => exit,
                    Err(e) => {
                        warn!("Connection error: {}", e);
                        Exit::Lost
                    }
                };
                core.on_closed();

                if let Exit::Shutdown = exit {
                    return;
                }
            }
            Err(e) => {
                warn!("Connection error: {}", e);
                core.on_closed();
            }
        }

        // Anything queued before the close would go to a connection that no longer exists
        while let Ok(cmd) = cmd_rx.try_recv() {
            if let Command::Close = cmd {
                return;
            }
        }

        let (Some(b), Some(delay)) = (options.reconnect, backoff) else {
            info!("Session closed; reconnect disabled");
            return;
        };

        debug!("Reconnecting in {}ms", delay.as_millis());
        if wait_or_close(delay, &mut cmd_rx).await {
            return;
        }
        backoff = Some(b.next(delay));
    }
}

/// Sleep for `delay`. Returns true if the session should stop.
async fn wait_or_close(delay: Duration, cmd_rx: &mut mpsc::UnboundedReceiver<Command>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = close_requested(cmd_rx) => true,
    }
}

/// Resolves on `close()` or when the handle is dropped, discarding sends
/// while no connection is open.
async fn close_requested(cmd_rx: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match cmd_rx.recv().await {
            Some(Command::Send(_)) => debug!("Skipping send: channel not open"),
            Some(Command::Close) | None => return,
        }
    }
}

/// Drive one open connection until it ends.
async fn serve_connection<S>(
    ws_stream: WebSocketStream<S>,
    core: &mut SessionCore,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    options: &SessionOptions,
) -> Result<Exit, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_sink, mut ws_rx) = ws_stream.split();

    // One watchdog per connection; it is dropped with this frame when the connection ends
    let mut watchdog = Watchdog::new();
    watchdog.arm(options.watchdog_interval);

    for frame in core.on_open(Instant::now()) {
        ws_sink.send(Message::Text(frame.into())).await?;
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = core.on_frame(text.as_str(), Instant::now()) {
                        ws_sink.send(Message::Text(reply.into())).await?;
                        debug!("Sent heartbeat ACK");
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!("Ignoring {}-byte binary frame", data.len());
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Gateway closed WS connection");
                    return Ok(Exit::Lost);
                }
                Some(Ok(_)) => {} // ping/pong handled by tungstenite
                Some(Err(e)) => return Err(e.into()),
                None => {
                    info!("WS stream ended");
                    return Ok(Exit::Lost);
                }
            },
            _ = watchdog.tick() => {
                if let Some(probe) = core.on_watchdog_tick(Instant::now()) {
                    ws_sink.send(Message::Text(probe.into())).await?;
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send(envelope)) => match core.outbound(&envelope) {
                    Ok(frame) => ws_sink.send(Message::Text(frame.into())).await?,
                    Err(e) => debug!("Skipping send: {}", e),
                },
                Some(Command::Close) | None => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    return Ok(Exit::Shutdown);
                }
            },
        }
    }
}
