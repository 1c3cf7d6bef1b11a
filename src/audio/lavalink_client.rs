use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client as HttpClient, Response,
};
use serde::Deserialize;
use serde_json::{json, Value};
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{
    effects::Timescale,
    node::{AudioNode, PlayerSnapshot, VoiceGateway},
    track::{LoadResult, SearchKind, Track},
};
use crate::{
    config::Config,
    error::{NodeError, NodeResult},
};

/// Cliente REST de un nodo Lavalink v4.
///
/// El id de sesión llega por el websocket (`ready`), ver
/// [`LavalinkSocket`](super::lavalink_socket::LavalinkSocket).
pub struct LavalinkClient {
    http: HttpClient,
    rest_url: String,
    search_prefix: String,
    session_id: RwLock<Option<String>>,
    voice: Arc<dyn VoiceGateway>,
    channels: DashMap<GuildId, ChannelId>,
}

impl LavalinkClient {
    pub fn new(config: &Config, voice: Arc<dyn VoiceGateway>) -> NodeResult<Self> {
        let mut headers = HeaderMap::new();
        let password = HeaderValue::from_str(&config.lavalink_password)
            .map_err(|e| NodeError::Config(format!("contraseña de Lavalink inválida: {e}")))?;
        headers.insert(AUTHORIZATION, password);

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.node_timeout_secs))
            .build()?;

        info!(
            "🎼 Configurando Lavalink en {}:{}",
            config.lavalink_host, config.lavalink_port
        );

        Ok(Self {
            http,
            rest_url: config.lavalink_rest_url(),
            search_prefix: config.search_prefix.clone(),
            session_id: RwLock::new(None),
            voice,
            channels: DashMap::new(),
        })
    }

    pub fn set_session_id(&self, session_id: Option<String>) {
        match &session_id {
            Some(id) => info!("✅ Sesión de Lavalink lista: {}", id),
            None => warn!("🔌 Sesión de Lavalink perdida"),
        }
        *self.session_id.write() = session_id;
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    fn player_url(&self, guild_id: GuildId) -> NodeResult<String> {
        let session_id = self.session_id().ok_or(NodeError::NotReady)?;
        Ok(format!(
            "{}/v4/sessions/{}/players/{}",
            self.rest_url, session_id, guild_id
        ))
    }

    fn identifier(&self, kind: SearchKind, query: &str) -> String {
        match kind {
            SearchKind::Direct => query.to_string(),
            SearchKind::Search => format!("{}:{}", self.search_prefix, query),
        }
    }

    async fn update_player(&self, guild_id: GuildId, body: Value) -> NodeResult<()> {
        let url = self.player_url(guild_id)?;
        debug!("PATCH {} {}", url, body);

        let response = self
            .http
            .patch(url)
            .query(&[("noReplace", "false")])
            .json(&body)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AudioNode for LavalinkClient {
    async fn has_player(&self, guild_id: GuildId) -> NodeResult<bool> {
        Ok(self.player(guild_id).await?.is_some())
    }

    async fn join(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> NodeResult<()> {
        let server = self.voice.connect(guild_id, voice_channel).await?;

        let body = json!({
            "voice": {
                "token": server.token,
                "endpoint": server.endpoint,
                "sessionId": server.session_id,
            }
        });

        if let Err(e) = self.update_player(guild_id, body).await {
            // Sin reproductor en el nodo no tiene sentido seguir en el canal
            if let Err(leave_err) = self.voice.disconnect(guild_id).await {
                warn!("No se pudo salir del canal tras fallar el join: {}", leave_err);
            }
            return Err(e);
        }

        self.channels.insert(guild_id, voice_channel);
        info!(
            "🔗 Conectado al canal {} en guild {} (texto: {})",
            voice_channel, guild_id, text_channel
        );
        Ok(())
    }

    async fn leave(&self, guild_id: GuildId) -> NodeResult<()> {
        let url = self.player_url(guild_id)?;
        let response = self.http.delete(url).send().await?;
        check(response).await?;

        self.voice.disconnect(guild_id).await?;

        match self.channels.remove(&guild_id) {
            Some((_, channel)) => info!("👋 Salí del canal {} en guild {}", channel, guild_id),
            None => debug!("Reproductor de guild {} eliminado sin canal registrado", guild_id),
        }
        Ok(())
    }

    async fn player(&self, guild_id: GuildId) -> NodeResult<Option<PlayerSnapshot>> {
        let url = self.player_url(guild_id)?;
        let response = self.http.get(url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = check(response).await?.text().await?;
        decode_player(&body).map(Some)
    }

    async fn play(&self, guild_id: GuildId, track: &Track, play_id: u64) -> NodeResult<()> {
        let body = json!({
            "track": {
                "encoded": track.encoded,
                "userData": { "playId": play_id },
            },
            "paused": false,
        });

        self.update_player(guild_id, body).await
    }

    async fn stop(&self, guild_id: GuildId) -> NodeResult<()> {
        self.update_player(guild_id, json!({ "track": { "encoded": null } }))
            .await
    }

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> NodeResult<()> {
        self.update_player(guild_id, json!({ "paused": paused })).await
    }

    async fn update_volume(&self, guild_id: GuildId, volume: u16) -> NodeResult<()> {
        let volume = volume.min(1000);
        self.update_player(guild_id, json!({ "volume": volume })).await
    }

    async fn apply_timescale(&self, guild_id: GuildId, timescale: Timescale) -> NodeResult<()> {
        self.update_player(guild_id, json!({ "filters": { "timescale": timescale } }))
            .await
    }

    async fn load_tracks(&self, kind: SearchKind, query: &str) -> NodeResult<LoadResult> {
        let identifier = self.identifier(kind, query);
        debug!("🔍 Cargando pistas: {}", identifier);

        let response = self
            .http
            .get(format!("{}/v4/loadtracks", self.rest_url))
            .query(&[("identifier", identifier.as_str())])
            .send()
            .await?;

        let body = check(response).await?.text().await?;
        decode_load_result(&body)
    }
}

/// Cuerpo de error estándar de Lavalink
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn check(response: Response) -> NodeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or(text);

    Err(NodeError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
enum LoadResponse {
    Track(Track),
    Playlist(PlaylistData),
    Search(Vec<Track>),
    Empty(serde::de::IgnoredAny),
    Error(LoadException),
}

#[derive(Debug, Deserialize)]
struct PlaylistData {
    info: PlaylistInfo,
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct PlaylistInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LoadException {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

pub(crate) fn decode_load_result(body: &str) -> NodeResult<LoadResult> {
    let result = match serde_json::from_str::<LoadResponse>(body)? {
        LoadResponse::Track(track) => LoadResult::track(track),
        LoadResponse::Playlist(playlist) => LoadResult::playlist(playlist.info.name, playlist.tracks),
        LoadResponse::Search(tracks) => LoadResult::search(tracks),
        LoadResponse::Empty(_) => LoadResult::empty(),
        LoadResponse::Error(exception) => LoadResult::failed(format!(
            "{} (severidad: {}, causa: {})",
            exception.message.as_deref().unwrap_or("sin mensaje"),
            exception.severity.as_deref().unwrap_or("desconocida"),
            exception.cause.as_deref().unwrap_or("desconocida"),
        )),
    };
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct PlayerBody {
    track: Option<Track>,
    #[serde(default)]
    paused: bool,
    #[serde(default = "default_volume")]
    volume: u16,
}

fn default_volume() -> u16 {
    100
}

pub(crate) fn decode_player(body: &str) -> NodeResult<PlayerSnapshot> {
    let player: PlayerBody = serde_json::from_str(body)?;
    Ok(PlayerSnapshot {
        track: player.track,
        paused: player.paused,
        volume: player.volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{node::PlayerState, track::LoadStatus};

    const TRACK: &str = r#"{
        "encoded": "QAAAjQIAJVJpY2sgQXN0bGV5",
        "info": {
            "identifier": "dQw4w9WgXcQ",
            "isSeekable": true,
            "author": "RickAstleyVEVO",
            "length": 212000,
            "isStream": false,
            "position": 0,
            "title": "Never Gonna Give You Up",
            "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "sourceName": "youtube"
        },
        "pluginInfo": {},
        "userData": {}
    }"#;

    #[test]
    fn test_decode_track_result() {
        let body = format!(r#"{{"loadType": "track", "data": {TRACK}}}"#);
        let result = decode_load_result(&body).unwrap();
        assert_eq!(result.status, LoadStatus::TrackLoaded);
        assert_eq!(result.tracks[0].title(), "Never Gonna Give You Up");
    }

    #[test]
    fn test_decode_playlist_result() {
        let body = format!(
            r#"{{"loadType": "playlist", "data": {{
                "info": {{"name": "Fiesta", "selectedTrack": -1}},
                "pluginInfo": {{}},
                "tracks": [{TRACK}, {TRACK}]
            }}}}"#
        );
        let result = decode_load_result(&body).unwrap();
        assert_eq!(result.status, LoadStatus::PlaylistLoaded);
        assert_eq!(result.playlist_name.as_deref(), Some("Fiesta"));
        assert_eq!(result.tracks.len(), 2);
    }

    #[test]
    fn test_decode_search_empty_and_error() {
        let search = format!(r#"{{"loadType": "search", "data": [{TRACK}]}}"#);
        assert_eq!(
            decode_load_result(&search).unwrap().status,
            LoadStatus::SearchResult
        );

        let empty = r#"{"loadType": "empty", "data": {}}"#;
        assert_eq!(decode_load_result(empty).unwrap(), LoadResult::empty());

        let error = r#"{"loadType": "error", "data": {
            "message": "Video unavailable",
            "severity": "common",
            "cause": "FriendlyException"
        }}"#;
        let result = decode_load_result(error).unwrap();
        assert_eq!(result.status, LoadStatus::LoadFailed);
        assert!(result.error_cause.unwrap().contains("Video unavailable"));
    }

    #[test]
    fn test_decode_player() {
        let body = format!(
            r#"{{"guildId": "1", "track": {TRACK}, "volume": 80, "paused": true,
                "state": {{"time": 0, "position": 0, "connected": true, "ping": 10}},
                "voice": {{}}, "filters": {{}}}}"#
        );
        let snapshot = decode_player(&body).unwrap();
        assert_eq!(snapshot.state(), PlayerState::Paused);
        assert_eq!(snapshot.volume, 80);

        let idle = decode_player(r#"{"guildId": "1", "track": null, "paused": false}"#).unwrap();
        assert_eq!(idle.state(), PlayerState::Stopped);
    }
}
