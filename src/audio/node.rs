use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use super::{
    effects::Timescale,
    track::{LoadResult, SearchKind, Track},
};
use crate::error::NodeResult;

/// Estado del reproductor según lo observa el nodo. El núcleo nunca lo asigna.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
}

/// Foto del reproductor de un guild en el nodo
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub track: Option<Track>,
    pub paused: bool,
    pub volume: u16,
}

impl PlayerSnapshot {
    pub fn idle() -> Self {
        Self {
            track: None,
            paused: false,
            volume: 100,
        }
    }

    pub fn state(&self) -> PlayerState {
        match (&self.track, self.paused) {
            (None, _) => PlayerState::Stopped,
            (Some(_), true) => PlayerState::Paused,
            (Some(_), false) => PlayerState::Playing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl TrackEndReason {
    /// Solo un final natural avanza la cola
    pub fn may_start_next(self) -> bool {
        matches!(self, Self::Finished)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackEnded {
    pub guild_id: GuildId,
    pub track: Track,
    /// Identificador de reproducción que el núcleo adjuntó al pedir `play`
    pub play_id: Option<u64>,
    pub reason: TrackEndReason,
}

/// Eventos asíncronos emitidos por el nodo
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    TrackStarted {
        guild_id: GuildId,
        track: Track,
    },
    TrackEnded(TrackEnded),
    TrackException {
        guild_id: GuildId,
        message: String,
    },
    TrackStuck {
        guild_id: GuildId,
        threshold_ms: u64,
    },
    VoiceClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
    },
}

/// Cliente del nodo de audio.
///
/// Toda llamada es un punto de suspensión potencialmente lento; el
/// controlador la acota con un timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioNode: Send + Sync {
    async fn has_player(&self, guild_id: GuildId) -> NodeResult<bool>;

    async fn join(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> NodeResult<()>;

    async fn leave(&self, guild_id: GuildId) -> NodeResult<()>;

    async fn player(&self, guild_id: GuildId) -> NodeResult<Option<PlayerSnapshot>>;

    async fn play(&self, guild_id: GuildId, track: &Track, play_id: u64) -> NodeResult<()>;

    async fn stop(&self, guild_id: GuildId) -> NodeResult<()>;

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> NodeResult<()>;

    /// Volumen en la escala del nodo (0..=1000)
    async fn update_volume(&self, guild_id: GuildId, volume: u16) -> NodeResult<()>;

    async fn apply_timescale(&self, guild_id: GuildId, timescale: Timescale) -> NodeResult<()>;

    async fn load_tracks(&self, kind: SearchKind, query: &str) -> NodeResult<LoadResult>;
}

/// Datos del servidor de voz que el nodo necesita para conectarse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceServerInfo {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

/// Lado de voz del gateway de chat: entra y sale de canales en nombre del nodo
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> NodeResult<VoiceServerInfo>;

    async fn disconnect(&self, guild_id: GuildId) -> NodeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::TrackInfo;

    #[test]
    fn test_player_state_follows_snapshot() {
        let mut snapshot = PlayerSnapshot::idle();
        assert_eq!(snapshot.state(), PlayerState::Stopped);

        snapshot.paused = true;
        assert_eq!(snapshot.state(), PlayerState::Stopped);

        snapshot.track = Some(Track {
            encoded: "enc".to_string(),
            info: TrackInfo {
                identifier: "id".to_string(),
                title: "t".to_string(),
                author: String::new(),
                length: 1,
                is_stream: false,
                uri: None,
            },
        });
        assert_eq!(snapshot.state(), PlayerState::Paused);

        snapshot.paused = false;
        assert_eq!(snapshot.state(), PlayerState::Playing);
    }

    #[test]
    fn test_only_finished_advances() {
        assert!(TrackEndReason::Finished.may_start_next());
        for reason in [
            TrackEndReason::LoadFailed,
            TrackEndReason::Stopped,
            TrackEndReason::Replaced,
            TrackEndReason::Cleanup,
        ] {
            assert!(!reason.may_start_next());
        }
    }
}
