//! Core module - Configuration, events and shared state

pub mod config;
pub mod events;
pub mod state;
