//! Panel module - widget layout and the adapter between user input and the session
//!
//! Nothing here talks to the socket. Gestures produce `PanelAction`s for the
//! caller to hand to `PanelClient`, and widget appearance is refreshed from
//! `PanelEvent::SignalChanged` pushes and a periodic poll of the signal store.

mod command;
mod widget;

pub use command::{CommandError, PanelCommand, HELP};
pub use widget::{Appearance, Gesture, PanelAction, Widget, WidgetKind};

use crate::core::config::WidgetConfig;
use crate::core::state::SignalStateStore;

#[derive(Debug, Default)]
pub struct Panel {
    widgets: Vec<Widget>,
}

impl Panel {
    pub fn new(widgets: Vec<Widget>) -> Self {
        Self { widgets }
    }

    pub fn from_config(widgets: &[WidgetConfig]) -> Self {
        Self::new(widgets.iter().map(Widget::from_config).collect())
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Apply a gesture to the first button or slider driving `channel_id`.
    ///
    /// Channels with no widget still produce the plain command for the gesture.
    pub fn channel_gesture(&mut self, channel_id: u16, gesture: Gesture) -> Option<PanelAction> {
        let wants_slider = matches!(gesture, Gesture::Input(_));
        let widget = self.widgets.iter_mut().find(|w| {
            w.channel == Some(channel_id) && w.kind.is_button() != wants_slider
        });

        match widget {
            Some(widget) => widget.handle(gesture),
            None => PanelAction::for_channel(channel_id, gesture),
        }
    }

    /// Push update: refresh every widget showing `signal_id`.
    /// Returns the widgets whose appearance changed.
    pub fn on_signal(&mut self, signal_id: u16, state: u8) -> Vec<&Widget> {
        self.widgets
            .iter_mut()
            .filter(|w| w.signal == Some(signal_id))
            .filter_map(|w| {
                let changed = w.apply_state(state);
                let w: &Widget = w;
                changed.then_some(w)
            })
            .collect()
    }

    /// Periodic poll: re-sync pulse buttons from the store.
    /// Returns the widgets whose appearance changed.
    pub fn refresh(&mut self, store: &SignalStateStore) -> Vec<&Widget> {
        self.widgets
            .iter_mut()
            .filter(|w| w.kind == WidgetKind::Pulse)
            .filter_map(|w| {
                let changed = w.sync(w.signal.and_then(|id| store.get(id)));
                let w: &Widget = w;
                changed.then_some(w)
            })
            .collect()
    }
}
