//! Line commands for driving the panel from a terminal

use std::str::FromStr;
use thiserror::Error;

use super::widget::Gesture;

/// One parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    /// Gesture on a channel: `press 4`, `release 4`, `leave 4`, `cancel 4`, `dim 4 750`
    Gesture { channel_id: u16, gesture: Gesture },
    /// Show the stored state of a signal
    Signal(u16),
    /// List widgets
    Widgets,
    /// Connection and store summary
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    Arguments {
        command: &'static str,
        expected: &'static str,
    },
    #[error("invalid number '{0}'")]
    Number(String),
}

pub const HELP: &str = "\
commands:
  press <channel>          momentary on
  release <channel>        momentary off
  leave <channel>          pointer left a pulse button
  cancel <channel>         touch cancelled on a pulse button
  dim <channel> <level>    dimmer level (clamped to 0-1000)
  signal <id>              stored state of a signal
  widgets                  list widgets
  status                   connection summary
  quit";

fn number<T: FromStr>(arg: &str) -> Result<T, CommandError> {
    arg.parse().map_err(|_| CommandError::Number(arg.to_string()))
}

impl FromStr for PanelCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(CommandError::Empty);
        };
        let args: Vec<&str> = words.collect();

        let gesture = |gesture: Gesture, name: &'static str| -> Result<Self, CommandError> {
            match args.as_slice() {
                [channel] => Ok(PanelCommand::Gesture {
                    channel_id: number(channel)?,
                    gesture,
                }),
                _ => Err(CommandError::Arguments {
                    command: name,
                    expected: "<channel>",
                }),
            }
        };

        match command.to_ascii_lowercase().as_str() {
            "press" | "p" => gesture(Gesture::Press, "press"),
            "release" | "r" => gesture(Gesture::Release, "release"),
            "leave" => gesture(Gesture::Leave, "leave"),
            "cancel" => gesture(Gesture::Cancel, "cancel"),
            "dim" | "d" => match args.as_slice() {
                [channel, level] => Ok(PanelCommand::Gesture {
                    channel_id: number(channel)?,
                    gesture: Gesture::Input(number(level)?),
                }),
                _ => Err(CommandError::Arguments {
                    command: "dim",
                    expected: "<channel> <level>",
                }),
            },
            "signal" | "s" => match args.as_slice() {
                [id] => Ok(PanelCommand::Signal(number(id)?)),
                _ => Err(CommandError::Arguments {
                    command: "signal",
                    expected: "<id>",
                }),
            },
            "widgets" | "w" => Ok(PanelCommand::Widgets),
            "status" => Ok(PanelCommand::Status),
            "help" | "?" => Ok(PanelCommand::Help),
            "quit" | "exit" | "q" => Ok(PanelCommand::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
