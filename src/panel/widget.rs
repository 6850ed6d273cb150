//! Panel widgets and their gesture/appearance rules

use serde::{Deserialize, Serialize};

use crate::core::config::WidgetConfig;
use crate::core::state::SIGNAL_ACTIVE;

/// Widget kind, as named in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    PillSmall,
    PillMedium,
    PillLong,
    Round,
    /// Momentary button whose lit state follows its signal
    Pulse,
    /// Dimmer slider
    Slider,
}

impl WidgetKind {
    pub fn is_button(&self) -> bool {
        !matches!(self, WidgetKind::Slider)
    }
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetKind::PillSmall => write!(f, "pill-small"),
            WidgetKind::PillMedium => write!(f, "pill-medium"),
            WidgetKind::PillLong => write!(f, "pill-long"),
            WidgetKind::Round => write!(f, "round"),
            WidgetKind::Pulse => write!(f, "pulse"),
            WidgetKind::Slider => write!(f, "slider"),
        }
    }
}

/// What a widget shows for its signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Appearance {
    /// No status received yet
    #[default]
    Unknown,
    Active,
    Inactive,
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Appearance::Unknown => write!(f, "unknown"),
            Appearance::Active => write!(f, "active"),
            Appearance::Inactive => write!(f, "inactive"),
        }
    }
}

/// User input on a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Mouse down / touch start
    Press,
    /// Mouse up / touch end
    Release,
    /// Pointer left the widget
    Leave,
    /// Touch cancelled
    Cancel,
    /// Slider moved to a level
    Input(i32),
}

/// Command a gesture asks the session to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Momentary { channel_id: u16, active: bool },
    Dimmer { channel_id: u16, level: i32 },
}

impl PanelAction {
    /// Action for a gesture on a channel with no widget bound to it.
    pub fn for_channel(channel_id: u16, gesture: Gesture) -> Option<Self> {
        match gesture {
            Gesture::Press => Some(PanelAction::Momentary { channel_id, active: true }),
            Gesture::Release | Gesture::Cancel => {
                Some(PanelAction::Momentary { channel_id, active: false })
            }
            Gesture::Leave => None,
            Gesture::Input(level) => Some(PanelAction::Dimmer { channel_id, level }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Widget {
    pub kind: WidgetKind,
    pub label: String,
    pub channel: Option<u16>,
    pub signal: Option<u16>,
    appearance: Appearance,
    pressed: bool,
    /// Last level sent by a slider
    level: Option<i32>,
}

impl Widget {
    pub fn new(kind: WidgetKind, label: impl Into<String>, channel: Option<u16>, signal: Option<u16>) -> Self {
        Self {
            kind,
            label: label.into(),
            channel,
            signal,
            appearance: Appearance::Unknown,
            pressed: false,
            level: None,
        }
    }

    pub fn from_config(config: &WidgetConfig) -> Self {
        Self::new(config.kind, config.label.clone(), config.channel, config.signal)
    }

    pub fn appearance(&self) -> Appearance {
        self.appearance
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn level(&self) -> Option<i32> {
        self.level
    }

    /// Apply a gesture; returns the command to send, if any.
    ///
    /// Widgets without a channel ignore gestures entirely.
    pub fn handle(&mut self, gesture: Gesture) -> Option<PanelAction> {
        let channel_id = self.channel?;

        match (self.kind, gesture) {
            (WidgetKind::Slider, Gesture::Input(level)) => {
                self.level = Some(level);
                Some(PanelAction::Dimmer { channel_id, level })
            }
            (WidgetKind::Slider, _) | (_, Gesture::Input(_)) => None,

            (_, Gesture::Press) => {
                self.set_pressed(true);
                Some(PanelAction::Momentary { channel_id, active: true })
            }
            (_, Gesture::Release) => {
                self.set_pressed(false);
                Some(PanelAction::Momentary { channel_id, active: false })
            }
            (WidgetKind::Pulse, Gesture::Leave) if self.pressed => {
                self.set_pressed(false);
                Some(PanelAction::Momentary { channel_id, active: false })
            }
            (WidgetKind::Pulse, Gesture::Cancel) => {
                self.set_pressed(false);
                Some(PanelAction::Momentary { channel_id, active: false })
            }
            (_, Gesture::Leave) | (_, Gesture::Cancel) => None,
        }
    }

    fn set_pressed(&mut self, pressed: bool) {
        self.pressed = pressed;
        // A pulse button lights while held, like its signal would
        if self.kind == WidgetKind::Pulse {
            self.appearance = if pressed {
                Appearance::Active
            } else {
                Appearance::Inactive
            };
        }
    }

    /// Push update for this widget's signal. Returns true if the appearance changed.
    ///
    /// Pulse buttons only react to 0 and 1; other buttons treat anything but 1
    /// as inactive.
    pub fn apply_state(&mut self, state: u8) -> bool {
        let next = match (self.kind, state) {
            (WidgetKind::Slider, _) => return false,
            (WidgetKind::Pulse, SIGNAL_ACTIVE) => Appearance::Active,
            (WidgetKind::Pulse, 0) => Appearance::Inactive,
            (WidgetKind::Pulse, _) => return false,
            (_, SIGNAL_ACTIVE) => Appearance::Active,
            _ => Appearance::Inactive,
        };
        self.set_appearance(next)
    }

    /// Poll re-sync from the store. `None` (no data) leaves the widget as it is.
    pub fn sync(&mut self, state: Option<u8>) -> bool {
        match state {
            Some(state) => self.set_appearance(if state == SIGNAL_ACTIVE {
                Appearance::Active
            } else {
                Appearance::Inactive
            }),
            None => false,
        }
    }

    fn set_appearance(&mut self, next: Appearance) -> bool {
        let changed = self.appearance != next;
        self.appearance = next;
        changed
    }
}

impl std::fmt::Display for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<11} {:<20}", self.kind, self.label)?;
        match self.channel {
            Some(ch) => write!(f, " ch {:<5}", ch)?,
            None => write!(f, " ch -    ")?,
        }
        match self.signal {
            Some(sig) => write!(f, " sig {:<5}", sig)?,
            None => write!(f, " sig -    ")?,
        }
        if self.kind == WidgetKind::Slider {
            match self.level {
                Some(level) => write!(f, " level {}", level),
                None => write!(f, " level -"),
            }
        } else {
            write!(f, " {}{}", self.appearance, if self.pressed { " (pressed)" } else { "" })
        }
    }
}
