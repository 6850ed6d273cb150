//! Signal state store and shared panel state

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Reported state value meaning "active"
pub const SIGNAL_ACTIVE: u8 = 1;

/// Last known state of every signal the device has reported.
///
/// Entries are created on the first status report for a signal and never
/// removed. A missing entry means "no information yet", which is not the same
/// as the inactive state 0.
#[derive(Debug, Default)]
pub struct SignalStateStore {
    signals: HashMap<u16, u8>,
}

impl SignalStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a signal's state. Returns true if the stored value changed.
    pub fn update(&mut self, signal_id: u16, state: u8) -> bool {
        self.signals.insert(signal_id, state) != Some(state)
    }

    /// Last reported state, or `None` if the signal has never been reported.
    pub fn get(&self, signal_id: u16) -> Option<u8> {
        self.signals.get(&signal_id).copied()
    }

    /// Whether the signal is active; `None` if it has never been reported.
    pub fn is_active(&self, signal_id: u16) -> Option<bool> {
        self.get(signal_id).map(|state| state == SIGNAL_ACTIVE)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// All known signals, sorted by id.
    pub fn snapshot(&self) -> Vec<(u16, u8)> {
        let mut entries: Vec<_> = self.signals.iter().map(|(&id, &state)| (id, state)).collect();
        entries.sort_unstable();
        entries
    }
}

/// Store handle shared between the session (writer) and the UI (readers)
pub type SharedSignalStore = Arc<RwLock<SignalStateStore>>;

/// Global panel state
#[derive(Debug, Default)]
pub struct PanelState {
    /// Whether the gateway WebSocket is open
    pub connected: bool,
    /// Heartbeats acknowledged over the life of the process
    pub heartbeats: u64,
}
