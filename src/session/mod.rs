//! Connection session - gateway WebSocket, heartbeat watchdog and inbound dispatch

mod client;
mod dispatch;
pub mod liveness;

pub use client::{Backoff, PanelClient, SessionOptions};
pub use dispatch::{ChannelState, SessionCore};
pub use liveness::{LivenessMonitor, LivenessStatus, Watchdog};
