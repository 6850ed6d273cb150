//! Connection state machine and inbound dispatch
//!
//! `SessionCore` holds everything about a session except the socket itself,
//! so the WebSocket loop only moves text in and out.

use mfd_protocol::{decode, serialize, subscription_signal_count, Envelope, Inbound};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::liveness::LivenessMonitor;
use crate::core::events::{EventSender, PanelEvent};
use crate::core::state::SharedSignalStore;
use crate::error::SessionError;

/// Channel lifecycle: `Connecting -> Open -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

pub struct SessionCore {
    state: ChannelState,
    /// Mirror of `state == Open` readable from the client handle
    connected: Arc<AtomicBool>,
    liveness: LivenessMonitor,
    signals: SharedSignalStore,
    events: EventSender,
    /// Sent verbatim as the first frame after every open
    subscription: Option<String>,
}

impl SessionCore {
    pub fn new(
        heartbeat_timeout: Duration,
        signals: SharedSignalStore,
        events: EventSender,
        subscription: Option<String>,
    ) -> Self {
        Self {
            state: ChannelState::Connecting,
            connected: Arc::new(AtomicBool::new(false)),
            liveness: LivenessMonitor::new(heartbeat_timeout),
            signals,
            events,
            subscription,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.connected)
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// A new connection attempt is starting.
    pub fn on_connecting(&mut self) {
        self.state = ChannelState::Connecting;
    }

    /// The WebSocket opened. Arms liveness tracking and returns the frames to
    /// send before anything else (the subscription blob, if configured).
    pub fn on_open(&mut self, now: Instant) -> Vec<String> {
        info!("Connected");
        self.state = ChannelState::Open;
        self.connected.store(true, Ordering::Relaxed);
        self.liveness.arm(now);
        let _ = self.events.send(PanelEvent::Connected);

        let mut frames = Vec::new();
        if let Some(blob) = &self.subscription {
            match subscription_signal_count(blob) {
                Ok(count) => info!("Sent subscription request for {} signals", count),
                Err(e) => warn!("Error parsing subscription data: {}", e),
            }
            frames.push(blob.clone());
        }
        frames
    }

    /// The connection closed or failed (both handled the same way).
    pub fn on_closed(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        info!("Disconnected");
        self.state = ChannelState::Closed;
        self.connected.store(false, Ordering::Relaxed);
        let _ = self.events.send(PanelEvent::Disconnected);
    }

    /// Handle one inbound text frame. Returns a reply to send, if any.
    ///
    /// Malformed frames are logged and dropped; the session stays open.
    pub fn on_frame(&mut self, text: &str, now: Instant) -> Option<String> {
        debug!("Raw WS message: {}", text);

        let envelope = match decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Non-JSON message or parsing error: {}", e);
                return None;
            }
        };

        match envelope.classify() {
            Inbound::Heartbeat => {
                let ack = self.liveness.on_heartbeat(now);
                debug!("Heartbeat received");
                let _ = self.events.send(PanelEvent::Heartbeat);
                self.outbound(&ack).ok()
            }
            Inbound::StatusReport { signal_id, state } => {
                let changed = self.signals.write().update(signal_id, state);
                debug!("Signal ID: {}, State: {} (changed={})", signal_id, state, changed);
                let _ = self.events.send(PanelEvent::SignalChanged { signal_id, state });
                None
            }
            Inbound::Truncated {
                message_type,
                message_cmd,
                len,
            } => {
                debug!(
                    "Ignoring status report {}/{} with {}-byte payload",
                    message_type, message_cmd, len
                );
                None
            }
            Inbound::Unhandled {
                message_type,
                message_cmd,
            } => {
                debug!("Ignoring message {}/{}", message_type, message_cmd);
                None
            }
        }
    }

    /// Watchdog tick: a device info request if heartbeats have stopped.
    pub fn on_watchdog_tick(&mut self, now: Instant) -> Option<String> {
        let probe = self.liveness.check(now)?;
        let frame = self.outbound(&probe).ok()?;
        info!("Sent info request");
        Some(frame)
    }

    /// Serialize an envelope for sending, if the channel is open.
    pub fn outbound(&self, envelope: &Envelope) -> Result<String, SessionError> {
        if self.state != ChannelState::Open {
            return Err(SessionError::ChannelUnavailable);
        }
        Ok(serialize(envelope))
    }
}
