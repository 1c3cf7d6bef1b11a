//! # Bot Module
//!
//! Discord-facing side of Party Music.
//!
//! This module contains:
//! - [`controller`]: the per-guild session controller used by the command layer
//! - [`search`]: query classification against the audio node
//! - [`events`]: delivery of node events (track end, exceptions) to the controller
//! - [`gateway`]: caller identity and the songbird voice bridge
//!
//! ## Architecture
//!
//! [`PartyMusicBot`] implements Serenity's [`EventHandler`] trait. It only
//! watches the gateway for the bot's own voice state; commands reach the
//! [`MusicController`] through the client's `TypeMap`.
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use party_music::bot::{controller::MusicController, gateway::Caller};
//! # async fn example(controller: Arc<MusicController>, caller: Caller) {
//! if let Err(e) = controller.play(&caller, "never gonna give you up").await {
//!     println!("{}", e);
//! }
//! # }
//! ```

use serenity::{
    all::{Context, EventHandler, Ready, VoiceState},
    async_trait,
    prelude::TypeMapKey,
};
use std::sync::Arc;
use tracing::info;

pub mod controller;
pub mod events;
pub mod gateway;
pub mod search;

use controller::MusicController;

impl TypeMapKey for MusicController {
    type Value = Arc<MusicController>;
}

/// Handler de eventos del gateway
pub struct PartyMusicBot {
    controller: Arc<MusicController>,
}

impl PartyMusicBot {
    pub fn new(controller: Arc<MusicController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl EventHandler for PartyMusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
    }

    /// Si el bot sale de la voz sin `leave` (expulsado, canal borrado) la sesión se cierra
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id.or_else(|| old.and_then(|state| state.guild_id)) else {
            return;
        };

        if self.controller.has_session(guild_id) {
            self.controller.handle_voice_disconnect(guild_id).await;
        }
    }
}
