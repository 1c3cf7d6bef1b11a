//! # Party Music
//!
//! Per-guild music sessions for a Discord bot backed by a Lavalink node.
//!
//! The command layer talks to [`MusicController`]; everything it returns is a
//! structured outcome or a [`MusicError`], never reply text.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;

pub use bot::controller::{MusicController, SessionSettings};
pub use config::Config;
pub use error::{MusicError, MusicResult, NodeError, NodeResult};
