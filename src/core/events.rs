//! Panel event definitions

use tokio::sync::mpsc;

/// Thin wrapper around `mpsc::UnboundedSender<PanelEvent>`.
///
/// Sends never fail from the session's point of view: if the UI side has gone
/// away the event is dropped.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PanelEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<PanelEvent>) -> Self {
        Self { tx }
    }

    /// Create a sender together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PanelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: PanelEvent) -> Result<(), mpsc::error::SendError<PanelEvent>> {
        self.tx.send(event)
    }
}

/// Events pushed from the connection session to the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// Gateway WebSocket opened
    Connected,

    /// Gateway WebSocket closed (clean close or transport error)
    Disconnected,

    /// A status report updated the signal store
    SignalChanged { signal_id: u16, state: u8 },

    /// Device heartbeat received and acknowledged
    Heartbeat,
}
