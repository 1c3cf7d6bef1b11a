//! # Audio Module
//!
//! Per-guild playback state and the audio node it drives.
//!
//! Nothing here decodes audio: a Lavalink node streams into the voice channel
//! and this module keeps track of what it was asked to play.
//!
//! ## Architecture
//!
//! ### [`session`] and [`store`] - Session State
//! - One [`PlaybackSession`](session::PlaybackSession) per guild with a voice connection
//! - Each session sits behind its own lock; guilds never contend with each other
//!
//! ### [`queue`] - Queue Management
//! - FIFO of pending tracks with zero-based pagination
//! - Loop modes for the current track or the whole queue
//!
//! ### [`effects`] - Audio Filters
//! - A single time-scale record per session; speed and nightcore overwrite each other
//!
//! ### [`node`], [`lavalink_client`], [`lavalink_socket`] - Audio Node
//! - [`AudioNode`](node::AudioNode) is the only way the controller reaches the node
//! - REST commands go through `reqwest`, events arrive over the Lavalink websocket
//!
//! ## Example Usage
//!
//! ```rust
//! use party_music::audio::{queue::MusicQueue, track::{Track, TrackInfo}};
//!
//! let mut queue = MusicQueue::new();
//! let track = Track {
//!     encoded: "QAAA".to_string(),
//!     info: TrackInfo {
//!         identifier: "dQw4w9WgXcQ".to_string(),
//!         title: "Never Gonna Give You Up".to_string(),
//!         author: "Rick Astley".to_string(),
//!         length: 213_000,
//!         is_stream: false,
//!         uri: None,
//!     },
//! };
//!
//! assert_eq!(queue.enqueue(track.clone()), 1);
//! assert_eq!(queue.try_dequeue(), Some(track));
//! assert!(queue.try_dequeue().is_none());
//! ```

pub mod effects;
pub mod lavalink_client;
pub mod lavalink_socket;
pub mod node;
pub mod queue;
pub mod session;
pub mod store;
pub mod track;
