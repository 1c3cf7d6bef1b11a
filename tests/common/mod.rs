#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use party_music::{
    audio::{
        effects::Timescale,
        node::{AudioNode, PlayerSnapshot, TrackEndReason, TrackEnded},
        track::{LoadResult, SearchKind, Track, TrackInfo},
    },
    bot::{
        controller::{MusicController, SessionSettings},
        gateway::Caller,
    },
    NodeError, NodeResult,
};
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeCall {
    Join(GuildId, ChannelId),
    Leave(GuildId),
    Play(GuildId, String),
    Stop(GuildId),
    Paused(GuildId, bool),
    Volume(GuildId, u16),
    Timescale(GuildId, Timescale),
    Load(SearchKind, String),
}

#[derive(Debug, Clone)]
struct FakePlayer {
    snapshot: PlayerSnapshot,
    play_id: Option<u64>,
}

/// Nodo en memoria con resultados de búsqueda guionizados
#[derive(Default)]
pub struct FakeNode {
    players: Mutex<HashMap<GuildId, FakePlayer>>,
    results: Mutex<HashMap<String, LoadResult>>,
    calls: Mutex<Vec<NodeCall>>,
    gated_searches: Mutex<HashSet<String>>,
    gated_plays: Mutex<HashSet<GuildId>>,
    failing_joins: Mutex<HashSet<GuildId>>,
    /// Avisa cuando una llamada retenida llega al nodo
    pub entered: Notify,
    /// Libera una llamada retenida
    pub release: Notify,
}

impl FakeNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, query: &str, result: LoadResult) {
        self.results.lock().insert(query.to_string(), result);
    }

    /// La búsqueda de `query` espera a `release`
    pub fn gate_search(&self, query: &str) {
        self.gated_searches.lock().insert(query.to_string());
    }

    /// Los `play` del guild esperan a `release`
    pub fn gate_play(&self, guild_id: GuildId) {
        self.gated_plays.lock().insert(guild_id);
    }

    pub fn fail_join(&self, guild_id: GuildId) {
        self.failing_joins.lock().insert(guild_id);
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().clone()
    }

    pub fn plays(&self, guild_id: GuildId) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                NodeCall::Play(guild, encoded) if *guild == guild_id => Some(encoded.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn current(&self, guild_id: GuildId) -> Option<Track> {
        self.players
            .lock()
            .get(&guild_id)
            .and_then(|player| player.snapshot.track.clone())
    }

    /// Termina la pista actual como lo haría el nodo y devuelve el evento
    pub fn finish(&self, guild_id: GuildId) -> Option<TrackEnded> {
        let mut players = self.players.lock();
        let player = players.get_mut(&guild_id)?;
        let track = player.snapshot.track.take()?;
        player.snapshot.paused = false;

        Some(TrackEnded {
            guild_id,
            track,
            play_id: player.play_id,
            reason: TrackEndReason::Finished,
        })
    }

    fn record(&self, call: NodeCall) {
        self.calls.lock().push(call);
    }

    fn with_player(&self, guild_id: GuildId, update: impl FnOnce(&mut FakePlayer)) -> NodeResult<()> {
        let mut players = self.players.lock();
        let player = players.get_mut(&guild_id).ok_or(NodeError::Rejected {
            status: 404,
            message: "Player not found".to_string(),
        })?;
        update(player);
        Ok(())
    }
}

#[async_trait]
impl AudioNode for FakeNode {
    async fn has_player(&self, guild_id: GuildId) -> NodeResult<bool> {
        Ok(self.players.lock().contains_key(&guild_id))
    }

    async fn join(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        _text_channel: ChannelId,
    ) -> NodeResult<()> {
        self.record(NodeCall::Join(guild_id, voice_channel));
        if self.failing_joins.lock().contains(&guild_id) {
            return Err(NodeError::Voice("sin permisos".to_string()));
        }

        self.players.lock().insert(
            guild_id,
            FakePlayer {
                snapshot: PlayerSnapshot::idle(),
                play_id: None,
            },
        );
        Ok(())
    }

    async fn leave(&self, guild_id: GuildId) -> NodeResult<()> {
        self.record(NodeCall::Leave(guild_id));
        self.players.lock().remove(&guild_id);
        Ok(())
    }

    async fn player(&self, guild_id: GuildId) -> NodeResult<Option<PlayerSnapshot>> {
        Ok(self
            .players
            .lock()
            .get(&guild_id)
            .map(|player| player.snapshot.clone()))
    }

    async fn play(&self, guild_id: GuildId, track: &Track, play_id: u64) -> NodeResult<()> {
        let gated = self.gated_plays.lock().contains(&guild_id);
        if gated {
            self.entered.notify_one();
            self.release.notified().await;
        }

        self.record(NodeCall::Play(guild_id, track.encoded.clone()));
        self.with_player(guild_id, |player| {
            player.snapshot.track = Some(track.clone());
            player.snapshot.paused = false;
            player.play_id = Some(play_id);
        })
    }

    async fn stop(&self, guild_id: GuildId) -> NodeResult<()> {
        self.record(NodeCall::Stop(guild_id));
        self.with_player(guild_id, |player| {
            player.snapshot.track = None;
            player.snapshot.paused = false;
        })
    }

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> NodeResult<()> {
        self.record(NodeCall::Paused(guild_id, paused));
        self.with_player(guild_id, |player| player.snapshot.paused = paused)
    }

    async fn update_volume(&self, guild_id: GuildId, volume: u16) -> NodeResult<()> {
        self.record(NodeCall::Volume(guild_id, volume));
        self.with_player(guild_id, |player| player.snapshot.volume = volume)
    }

    async fn apply_timescale(&self, guild_id: GuildId, timescale: Timescale) -> NodeResult<()> {
        self.record(NodeCall::Timescale(guild_id, timescale));
        self.with_player(guild_id, |_| {})
    }

    async fn load_tracks(&self, kind: SearchKind, query: &str) -> NodeResult<LoadResult> {
        self.record(NodeCall::Load(kind, query.to_string()));

        let gated = self.gated_searches.lock().contains(query);
        if gated {
            self.entered.notify_one();
            self.release.notified().await;
        }

        Ok(self
            .results
            .lock()
            .get(query)
            .cloned()
            .unwrap_or_else(LoadResult::empty))
    }
}

pub fn track(n: u32) -> Track {
    Track {
        encoded: format!("enc{n}"),
        info: TrackInfo {
            identifier: format!("id{n}"),
            title: format!("Song {n}"),
            author: "Artist".to_string(),
            length: 60_000,
            is_stream: false,
            uri: Some(format!("https://valid/track/{n}")),
        },
    }
}

pub fn guild(id: u64) -> GuildId {
    GuildId::new(id)
}

pub fn caller(guild_id: GuildId) -> Caller {
    Caller::new(guild_id, Some(ChannelId::new(100)), ChannelId::new(200))
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        node_timeout: Duration::from_secs(5),
        ..SessionSettings::default()
    }
}

pub fn controller(node: &Arc<FakeNode>) -> Arc<MusicController> {
    Arc::new(MusicController::new(node.clone(), settings()))
}
