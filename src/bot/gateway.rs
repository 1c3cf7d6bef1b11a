use async_trait::async_trait;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId, UserId},
};
use songbird::{error::JoinError, Songbird};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    audio::node::{VoiceGateway, VoiceServerInfo},
    error::{NodeError, NodeResult},
};

/// Quién emitió un comando y desde dónde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub guild_id: GuildId,
    /// Canal de voz del usuario, si está en alguno
    pub voice_channel: Option<ChannelId>,
    /// Canal donde se responde
    pub text_channel: ChannelId,
}

impl Caller {
    pub fn new(guild_id: GuildId, voice_channel: Option<ChannelId>, text_channel: ChannelId) -> Self {
        Self {
            guild_id,
            voice_channel,
            text_channel,
        }
    }

    /// Resuelve el canal de voz del usuario desde la caché de serenity
    pub fn from_cache(
        cache: &Arc<Cache>,
        guild_id: GuildId,
        user_id: UserId,
        text_channel: ChannelId,
    ) -> Self {
        let voice_channel = guild_id.to_guild_cached(cache).and_then(|guild| {
            guild
                .voice_states
                .get(&user_id)
                .and_then(|voice_state| voice_state.channel_id)
        });

        if voice_channel.is_none() {
            debug!("Usuario {} no está en voz en guild {}", user_id, guild_id);
        }

        Self::new(guild_id, voice_channel, text_channel)
    }
}

/// Puente con el gateway de Discord para la voz: songbird solo negocia la
/// conexión, el audio lo envía Lavalink.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> NodeResult<VoiceServerInfo> {
        let (info, _call) = self
            .manager
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(|e| NodeError::Voice(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(VoiceServerInfo {
            token: info.token,
            endpoint: info.endpoint,
            session_id: info.session_id,
        })
    }

    async fn disconnect(&self, guild_id: GuildId) -> NodeResult<()> {
        match self.manager.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => {
                info!("👋 Desconectado del canal de voz en guild {}", guild_id);
                Ok(())
            }
            Err(e) => Err(NodeError::Voice(e.to_string())),
        }
    }
}
