use futures::StreamExt;
use serde::Deserialize;
use serenity::model::id::{GuildId, UserId};
use std::{num::NonZeroU64, sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tracing::{debug, error, info, warn};

use super::{
    lavalink_client::LavalinkClient,
    node::{NodeEvent, TrackEndReason, TrackEnded},
    track::Track,
};
use crate::{
    config::Config,
    error::{NodeError, NodeResult},
};

const CLIENT_NAME: &str = concat!("party-music/", env!("CARGO_PKG_VERSION"));

/// Lector del websocket de Lavalink: recibe el id de sesión y reenvía los eventos del nodo.
pub struct LavalinkSocket {
    url: String,
    password: String,
    user_id: UserId,
    reconnect_attempts: u8,
}

impl LavalinkSocket {
    pub fn new(config: &Config, user_id: UserId) -> Self {
        Self {
            url: format!("{}/v4/websocket", config.lavalink_socket_url()),
            password: config.lavalink_password.clone(),
            user_id,
            reconnect_attempts: config.reconnect_attempts,
        }
    }

    /// Mantiene la conexión viva, reconectando con espera creciente.
    pub async fn run(self, client: Arc<LavalinkClient>, events: UnboundedSender<NodeEvent>) {
        let mut attempt: u8 = 0;

        loop {
            match self.connect_once(&client, &events).await {
                Ok(()) => {
                    warn!("🔌 Websocket de Lavalink cerrado por el nodo");
                    attempt = 0;
                }
                Err(e) => {
                    error!("❌ Error en el websocket de Lavalink: {}", e);
                    attempt = attempt.saturating_add(1);
                }
            }

            client.set_session_id(None);

            if events.is_closed() {
                info!("Nadie escucha eventos del nodo, cerrando websocket");
                return;
            }

            if attempt > self.reconnect_attempts {
                error!(
                    "❌ Lavalink no respondió tras {} intentos, abandonando",
                    self.reconnect_attempts
                );
                return;
            }

            let delay = Duration::from_secs(2u64.saturating_pow(u32::from(attempt)).min(60));
            info!("🔄 Reconectando a Lavalink en {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_once(
        &self,
        client: &LavalinkClient,
        events: &UnboundedSender<NodeEvent>,
    ) -> NodeResult<()> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", header(&self.password)?);
        headers.insert("User-Id", header(&self.user_id.to_string())?);
        headers.insert("Client-Name", header(CLIENT_NAME)?);

        let (mut socket, _) = connect_async(request).await?;
        info!("🎼 Websocket de Lavalink conectado: {}", self.url);

        while let Some(message) = socket.next().await {
            match message? {
                Message::Text(text) => match decode_message(&text) {
                    Ok(Incoming::Ready { session_id, resumed }) => {
                        debug!("Sesión de Lavalink (reanudada: {})", resumed);
                        client.set_session_id(Some(session_id));
                    }
                    Ok(Incoming::Event(event)) => {
                        if let Some(event) = event.into_node_event() {
                            if events.send(event).is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Ok(Incoming::Other) => {}
                    Err(e) => warn!("Mensaje de Lavalink inválido: {}", e),
                },
                Message::Close(frame) => {
                    debug!("Cierre del websocket: {:?}", frame);
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn header(value: &str) -> NodeResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| NodeError::Config(format!("cabecera de websocket inválida: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub(crate) enum Incoming {
    #[serde(rename_all = "camelCase")]
    Ready {
        session_id: String,
        #[serde(default)]
        resumed: bool,
    },
    Event(RawEvent),
    #[serde(other)]
    Other,
}

pub(crate) fn decode_message(text: &str) -> NodeResult<Incoming> {
    Ok(serde_json::from_str(text)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventTrack {
    #[serde(flatten)]
    track: Track,
    #[serde(default)]
    user_data: Option<UserData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    #[serde(default)]
    play_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum RawReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl From<RawReason> for TrackEndReason {
    fn from(reason: RawReason) -> Self {
        match reason {
            RawReason::Finished => Self::Finished,
            RawReason::LoadFailed => Self::LoadFailed,
            RawReason::Stopped => Self::Stopped,
            RawReason::Replaced => Self::Replaced,
            RawReason::Cleanup => Self::Cleanup,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Exception {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum RawEvent {
    #[serde(rename_all = "camelCase")]
    TrackStartEvent { guild_id: String, track: EventTrack },
    #[serde(rename_all = "camelCase")]
    TrackEndEvent {
        guild_id: String,
        track: EventTrack,
        reason: RawReason,
    },
    #[serde(rename_all = "camelCase")]
    TrackExceptionEvent {
        guild_id: String,
        exception: Exception,
    },
    #[serde(rename_all = "camelCase")]
    TrackStuckEvent { guild_id: String, threshold_ms: u64 },
    #[serde(rename_all = "camelCase")]
    WebSocketClosedEvent {
        guild_id: String,
        code: u16,
        reason: String,
    },
}

fn parse_guild(raw: &str) -> Option<GuildId> {
    match raw.parse::<NonZeroU64>() {
        Ok(id) => Some(GuildId::from(id)),
        Err(_) => {
            warn!("guildId inválido en evento de Lavalink: {}", raw);
            None
        }
    }
}

impl RawEvent {
    pub(crate) fn into_node_event(self) -> Option<NodeEvent> {
        let event = match self {
            Self::TrackStartEvent { guild_id, track } => NodeEvent::TrackStarted {
                guild_id: parse_guild(&guild_id)?,
                track: track.track,
            },
            Self::TrackEndEvent {
                guild_id,
                track,
                reason,
            } => NodeEvent::TrackEnded(TrackEnded {
                guild_id: parse_guild(&guild_id)?,
                play_id: track.user_data.and_then(|data| data.play_id),
                track: track.track,
                reason: reason.into(),
            }),
            Self::TrackExceptionEvent {
                guild_id,
                exception,
            } => NodeEvent::TrackException {
                guild_id: parse_guild(&guild_id)?,
                message: exception.message.unwrap_or_default(),
            },
            Self::TrackStuckEvent {
                guild_id,
                threshold_ms,
            } => NodeEvent::TrackStuck {
                guild_id: parse_guild(&guild_id)?,
                threshold_ms,
            },
            Self::WebSocketClosedEvent {
                guild_id,
                code,
                reason,
            } => NodeEvent::VoiceClosed {
                guild_id: parse_guild(&guild_id)?,
                code,
                reason,
            },
        };
        Some(event)
    }
}
