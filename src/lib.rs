//! MFD Panel
//!
//! Control panel client for an MFD lighting control gateway.
//!
//! # Features
//! - JSON command envelopes for momentary and dimmer channels (`mfd-protocol`)
//! - Heartbeat acknowledgement and a watchdog that probes a silent device
//! - Signal state store fed by device status reports
//! - Widget layer (pill/round/pulse buttons, dimmer sliders) kept in sync with the store
//! - Optional reconnect with backoff

pub mod core;
pub mod error;
pub mod panel;
pub mod session;

pub use core::config::Config;
pub use core::events::{EventSender, PanelEvent};
pub use core::state::{PanelState, SharedSignalStore, SignalStateStore};
pub use error::SessionError;
pub use panel::Panel;
pub use session::{PanelClient, SessionOptions};
