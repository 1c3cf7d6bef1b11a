//! # Session Controller
//!
//! Fachada que usa la capa de comandos. Cada operación:
//!
//! 1. busca la sesión del guild en el [`SessionStore`],
//! 2. valida precondiciones sin hablar con el nodo,
//! 3. delega en el resolver, la cola o el estado de la sesión,
//! 4. emite como mucho un comando al nodo y confirma el resultado.
//!
//! Los fallos del nodo se registran con todo su detalle y se devuelven como
//! [`MusicError::Node`]; nunca se propagan como pánicos ni con su texto original.
//!
//! ## Concurrencia
//!
//! Cada guild tiene su propio lock. Las búsquedas (que pueden tardar) se hacen
//! fuera del lock; el resto de llamadas al nodo se hacen bajo el lock del guild
//! pero acotadas por `node_timeout`, así que nunca bloquean indefinidamente.
//! Si un `leave` destruye la sesión mientras una búsqueda está en vuelo, el
//! resultado se descarta.

use std::{future::Future, sync::Arc, time::Duration};

use serenity::model::id::{ChannelId, GuildId};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        effects::{FilterPreset, Timescale},
        node::{AudioNode, NodeEvent, PlayerSnapshot, PlayerState, TrackEnded},
        queue::LoopMode,
        session::PlaybackSession,
        store::{SessionHandle, SessionStore},
        track::Track,
    },
    bot::{
        gateway::Caller,
        search::{SearchOutcome, SearchResolver},
    },
    config::{MAX_VOLUME, MIN_VOLUME},
    error::{MusicError, MusicResult, NodeError, NodeResult},
};

/// Parámetros explícitos del controlador
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub page_size: usize,
    pub selection_limit: usize,
    pub default_volume: u16,
    pub max_speed: f64,
    pub node_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            selection_limit: 5,
            default_volume: 100,
            max_speed: 4.0,
            node_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// El nodo estaba libre y empezó a sonar esta pista
    NowPlaying(Track),
    /// Agregada a la cola; `position` 1 es la siguiente
    Queued { track: Track, position: usize },
    PlaylistQueued {
        name: Option<String>,
        added: usize,
        now_playing: Option<Track>,
    },
    /// Búsqueda ambigua: el usuario debe elegir con `select`
    SelectionPending(Vec<Track>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkipOutcome {
    pub skipped: Option<Track>,
    pub now_playing: Track,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopOutcome {
    pub stopped: Option<Track>,
    pub cleared: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PauseOutcome {
    Paused(Option<Track>),
    NothingToPause,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    Resumed(Option<Track>),
    NotPaused,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedOutcome {
    Current(f64),
    Changed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Número de línea; la 1 es siempre la pista actual
    pub position: usize,
    pub track: Track,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    pub now_playing: Option<Track>,
    pub entries: Vec<QueueEntry>,
    pub page: usize,
    pub total_pages: usize,
    pub total_tracks: usize,
    pub total_duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueListing {
    /// Suena algo y no hay nada más en cola
    NowPlayingOnly(Track),
    Page(QueuePage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub track: Option<Track>,
    pub state: PlayerState,
    pub volume: u16,
    pub timescale: Timescale,
    pub loop_mode: LoopMode,
}

/// Copia del estado en memoria de una sesión
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub voice_channel: ChannelId,
    pub text_channel: ChannelId,
    pub queue: Vec<Track>,
    pub pending_selection: Option<Vec<Track>>,
    pub now_playing: Option<Track>,
    pub volume: u16,
    pub speed: f64,
    pub nightcore: bool,
    pub loop_mode: LoopMode,
}

pub struct MusicController {
    node: Arc<dyn AudioNode>,
    store: SessionStore,
    resolver: SearchResolver,
    settings: SessionSettings,
}

impl MusicController {
    pub fn new(node: Arc<dyn AudioNode>, settings: SessionSettings) -> Self {
        info!("🎵 Controlador de música listo: {:?}", settings);
        Self {
            node,
            store: SessionStore::new(),
            resolver: SearchResolver::new(settings.selection_limit),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn has_session(&self, guild_id: GuildId) -> bool {
        self.store.contains(guild_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    /// Conecta el nodo al canal de voz del usuario y crea la sesión
    pub async fn join(&self, caller: &Caller) -> MusicResult<ChannelId> {
        let guild_id = caller.guild_id;

        if self.store.contains(guild_id) {
            return Err(MusicError::AlreadyActive);
        }
        let voice_channel = caller.voice_channel.ok_or(MusicError::NotInVoiceChannel)?;

        if self
            .node_call("has_player", guild_id, self.node.has_player(guild_id))
            .await?
        {
            return Err(MusicError::AlreadyActive);
        }

        let session = PlaybackSession::new(
            guild_id,
            voice_channel,
            caller.text_channel,
            self.settings.default_volume,
        );
        let handle = self.store.create(session)?;
        let _session = handle.lock().await;

        let joined = self
            .node_call(
                "join",
                guild_id,
                self.node.join(guild_id, voice_channel, caller.text_channel),
            )
            .await;

        if let Err(e) = joined {
            self.store.remove_handle(&handle);
            return Err(e);
        }

        if self.settings.default_volume != 100 {
            let volume = self.settings.default_volume;
            if let Err(e) = self
                .node_call("update_volume", guild_id, self.node.update_volume(guild_id, volume))
                .await
            {
                warn!("No se pudo aplicar el volumen inicial: {}", e);
            }
        }

        info!("✅ Unido al canal {} en guild {}", voice_channel, guild_id);
        Ok(voice_channel)
    }

    /// Busca `query` y la reproduce, la encola o abre una selección
    pub async fn play(&self, caller: &Caller, query: &str) -> MusicResult<PlayOutcome> {
        let guild_id = caller.guild_id;

        if caller.voice_channel.is_none() {
            return Err(MusicError::NotInVoiceChannel);
        }
        let handle = self.session(guild_id)?;

        {
            let mut session = self.lock_open(&handle).await?;
            self.require_player(guild_id).await?;
            session.clear_pending_selection();
        }

        // La búsqueda se hace sin el lock del guild
        let outcome = self
            .node_call(
                "load_tracks",
                guild_id,
                self.resolver.resolve(self.node.as_ref(), query),
            )
            .await?;

        let mut session = handle.lock().await;
        if handle.is_closed() {
            info!(
                "🚫 Resultado de búsqueda descartado, la sesión de guild {} ya no existe",
                guild_id
            );
            return Err(MusicError::NotConnected);
        }

        match outcome {
            SearchOutcome::NoMatches => Err(MusicError::NoMatches {
                query: query.trim().to_string(),
            }),
            SearchOutcome::LoadFailed { .. } => Err(MusicError::Node {
                operation: "load_tracks",
            }),
            SearchOutcome::Ambiguous(tracks) => {
                session.set_pending_selection(tracks.clone());
                Ok(PlayOutcome::SelectionPending(tracks))
            }
            SearchOutcome::TrackLoaded(track) => {
                let position = session.queue.enqueue(track.clone());
                info!("➕ {} agregada a la cola de guild {}", track, guild_id);

                match self.start_if_idle(&mut session).await? {
                    Some(started) => Ok(PlayOutcome::NowPlaying(started)),
                    None => Ok(PlayOutcome::Queued { track, position }),
                }
            }
            SearchOutcome::PlaylistLoaded { name, tracks } => {
                let added = session.queue.extend(tracks);
                let now_playing = self.start_if_idle(&mut session).await?;
                Ok(PlayOutcome::PlaylistQueued {
                    name,
                    added,
                    now_playing,
                })
            }
        }
    }

    /// Elige la opción `index` (desde 1) de la selección pendiente
    pub async fn select(&self, guild_id: GuildId, index: usize) -> MusicResult<PlayOutcome> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;

        session.check_selection(index)?;
        let snapshot = self.live_player(guild_id).await?;

        let pending = session.pending_selection().map(<[Track]>::to_vec);
        let track = session.take_selection(index)?;

        if snapshot.state() == PlayerState::Stopped {
            match self.start_track(&mut session, track, false).await {
                Ok(started) => Ok(PlayOutcome::NowPlaying(started)),
                Err(e) => {
                    if let Some(pending) = pending {
                        session.set_pending_selection(pending);
                    }
                    Err(e)
                }
            }
        } else {
            let position = session.queue.enqueue(track.clone());
            info!("➕ {} agregada a la cola de guild {}", track, guild_id);
            Ok(PlayOutcome::Queued { track, position })
        }
    }

    /// Salta a la siguiente pista de la cola
    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<SkipOutcome> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;

        if session.queue.is_empty() {
            return Err(MusicError::NothingToSkip);
        }

        let snapshot = self.live_player(guild_id).await?;
        let Some(next) = session.queue.try_dequeue() else {
            return Err(MusicError::NothingToSkip);
        };

        let skipped = session
            .now_playing()
            .map(|current| current.track.clone())
            .or(snapshot.track);

        // Reemplazar la pista no dispara un avance: el nodo reporta `Replaced`
        let now_playing = self.start_track(&mut session, next, true).await?;

        if session.queue.loop_mode() == LoopMode::Queue {
            if let Some(skipped) = &skipped {
                session.queue.enqueue(skipped.clone());
            }
        }

        info!(
            "⏭️ Saltada {} en guild {}",
            skipped.as_ref().map(Track::title).unwrap_or("(nada)"),
            guild_id
        );
        Ok(SkipOutcome {
            skipped,
            now_playing,
        })
    }

    /// Detiene la reproducción y vacía la cola; la sesión sigue viva
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<StopOutcome> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;
        let snapshot = self.live_player(guild_id).await?;

        if snapshot.state() != PlayerState::Stopped {
            self.node_call("stop", guild_id, self.node.stop(guild_id))
                .await?;
        }

        let cleared = session.reset_playback();
        info!("⏹️ Reproducción detenida en guild {}", guild_id);

        Ok(StopOutcome {
            stopped: snapshot.track,
            cleared,
        })
    }

    pub async fn pause(&self, guild_id: GuildId) -> MusicResult<PauseOutcome> {
        let handle = self.session(guild_id)?;
        let _session = self.lock_open(&handle).await?;
        let snapshot = self.live_player(guild_id).await?;

        if snapshot.state() != PlayerState::Playing {
            return Ok(PauseOutcome::NothingToPause);
        }

        self.node_call("pause", guild_id, self.node.set_paused(guild_id, true))
            .await?;
        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        Ok(PauseOutcome::Paused(snapshot.track))
    }

    pub async fn resume(&self, guild_id: GuildId) -> MusicResult<ResumeOutcome> {
        let handle = self.session(guild_id)?;
        let _session = self.lock_open(&handle).await?;
        let snapshot = self.live_player(guild_id).await?;

        if snapshot.state() != PlayerState::Paused {
            return Ok(ResumeOutcome::NotPaused);
        }

        self.node_call("resume", guild_id, self.node.set_paused(guild_id, false))
            .await?;
        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        Ok(ResumeOutcome::Resumed(snapshot.track))
    }

    /// Sale del canal de voz y destruye la sesión
    pub async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;

        let snapshot = self
            .node_call("player", guild_id, self.node.player(guild_id))
            .await?;

        if snapshot.is_some_and(|player| player.state() == PlayerState::Playing) {
            self.node_call("stop", guild_id, self.node.stop(guild_id))
                .await?;
        }

        self.node_call("leave", guild_id, self.node.leave(guild_id))
            .await?;

        session.reset_playback();
        self.store.remove_handle(&handle);
        info!("👋 Sesión cerrada en guild {}", guild_id);
        Ok(())
    }

    /// El bot salió de la voz sin pasar por `leave` (lo expulsaron o se cayó la conexión)
    pub async fn handle_voice_disconnect(&self, guild_id: GuildId) {
        let Some(handle) = self.store.get(guild_id) else {
            return;
        };

        {
            let mut session = handle.lock().await;
            if handle.is_closed() {
                return;
            }
            session.reset_playback();
            self.store.remove_handle(&handle);
        }

        warn!("🔌 Bot desconectado de la voz en guild {}, sesión cerrada", guild_id);

        if let Err(e) = self
            .node_call("leave", guild_id, self.node.leave(guild_id))
            .await
        {
            debug!("Limpieza del reproductor de guild {}: {}", guild_id, e);
        }
    }

    /// Página `page` (desde 1) de la cola
    pub async fn list(&self, guild_id: GuildId, page: usize) -> MusicResult<QueueListing> {
        let handle = self.session(guild_id)?;
        let session = self.lock_open(&handle).await?;
        let snapshot = self.live_player(guild_id).await?;

        if session.queue.is_empty() && snapshot.state() != PlayerState::Stopped {
            if let Some(track) = snapshot.track {
                return Ok(QueueListing::NowPlayingOnly(track));
            }
        }

        let page = page.max(1);
        let page_index = page - 1;
        let page_size = self.settings.page_size;
        let first_position = page_index.saturating_mul(page_size).saturating_add(2);

        let entries = session
            .queue
            .page(page_index, page_size)
            .into_iter()
            .enumerate()
            .map(|(offset, track)| QueueEntry {
                position: first_position + offset,
                track,
            })
            .collect();

        Ok(QueueListing::Page(QueuePage {
            now_playing: snapshot.track,
            entries,
            page,
            total_pages: session.queue.total_pages(page_size),
            total_tracks: session.queue.len(),
            total_duration: session.queue.total_duration(),
        }))
    }

    /// Volumen entre 1 y 150; fuera de rango no cambia nada
    pub async fn set_volume(&self, guild_id: GuildId, volume: i64) -> MusicResult<u16> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;

        let volume = u16::try_from(volume)
            .ok()
            .filter(|v| (MIN_VOLUME..=MAX_VOLUME).contains(v))
            .ok_or(MusicError::OutOfRange {
                what: "volumen",
                value: volume as f64,
                min: f64::from(MIN_VOLUME),
                max: f64::from(MAX_VOLUME),
            })?;

        self.require_player(guild_id).await?;
        self.node_call(
            "update_volume",
            guild_id,
            self.node.update_volume(guild_id, volume),
        )
        .await?;

        session.set_volume(volume);
        Ok(volume)
    }

    /// Sin valor informa la velocidad actual; con valor aplica el filtro conservando el tono
    pub async fn set_speed(&self, guild_id: GuildId, speed: Option<f64>) -> MusicResult<SpeedOutcome> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;

        let Some(speed) = speed else {
            return Ok(SpeedOutcome::Current(session.filters().speed()));
        };

        if !speed.is_finite() || speed <= 0.0 || speed > self.settings.max_speed {
            return Err(MusicError::OutOfRange {
                what: "velocidad",
                value: speed,
                min: 0.0,
                max: self.settings.max_speed,
            });
        }

        self.require_player(guild_id).await?;
        let timescale = Timescale::with_speed(speed);
        self.node_call(
            "apply_timescale",
            guild_id,
            self.node.apply_timescale(guild_id, timescale),
        )
        .await?;

        session.filters_mut().apply(timescale);
        Ok(SpeedOutcome::Changed(speed))
    }

    pub async fn set_nightcore(&self, guild_id: GuildId, enable: bool) -> MusicResult<bool> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;

        self.require_player(guild_id).await?;
        let timescale = FilterPreset::from_enabled(enable).timescale();
        self.node_call(
            "apply_timescale",
            guild_id,
            self.node.apply_timescale(guild_id, timescale),
        )
        .await?;

        session.filters_mut().apply(timescale);
        Ok(session.filters().nightcore_enabled())
    }

    pub async fn set_loop(&self, guild_id: GuildId, mode: LoopMode) -> MusicResult<LoopMode> {
        let handle = self.session(guild_id)?;
        let mut session = self.lock_open(&handle).await?;
        session.queue.set_loop_mode(mode);
        Ok(mode)
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> MusicResult<NowPlayingInfo> {
        let handle = self.session(guild_id)?;
        let session = self.lock_open(&handle).await?;
        let snapshot = self.live_player(guild_id).await?;

        Ok(NowPlayingInfo {
            state: snapshot.state(),
            volume: snapshot.volume,
            track: snapshot.track,
            timescale: session.filters().timescale(),
            loop_mode: session.queue.loop_mode(),
        })
    }

    /// Copia del estado en memoria, sin consultar al nodo
    pub async fn snapshot(&self, guild_id: GuildId) -> MusicResult<SessionSnapshot> {
        let handle = self.session(guild_id)?;
        let session = self.lock_open(&handle).await?;

        Ok(SessionSnapshot {
            voice_channel: session.voice_channel(),
            text_channel: session.text_channel(),
            queue: session.queue.page(0, session.queue.len()),
            pending_selection: session.pending_selection().map(<[Track]>::to_vec),
            now_playing: session.now_playing().map(|current| current.track.clone()),
            volume: session.volume(),
            speed: session.filters().speed(),
            nightcore: session.filters().nightcore_enabled(),
            loop_mode: session.queue.loop_mode(),
        })
    }

    /// Evento del nodo: solo `Finished` de la pista activa avanza la cola.
    ///
    /// Devuelve la pista que empezó a sonar, si alguna.
    pub async fn track_ended(&self, event: TrackEnded) -> MusicResult<Option<Track>> {
        let guild_id = event.guild_id;

        let Some(handle) = self.store.get(guild_id) else {
            debug!("Fin de pista en guild {} sin sesión, ignorado", guild_id);
            return Ok(None);
        };

        let mut session = handle.lock().await;
        if handle.is_closed() {
            return Ok(None);
        }

        if !session.is_current(&event) {
            debug!(
                "Fin de pista duplicado o viejo en guild {}: {} ({:?})",
                guild_id,
                event.track.title(),
                event.reason
            );
            return Ok(None);
        }

        let Some(ended) = session.take_now_playing() else {
            return Ok(None);
        };

        if !event.reason.may_start_next() {
            debug!(
                "{} terminó en guild {} con {:?}, la cola no avanza",
                ended.track, guild_id, event.reason
            );
            return Ok(None);
        }

        let repeating = session.queue.loop_mode() == LoopMode::Track;
        let Some(next) = session.queue.next_after(&ended.track) else {
            info!("📭 Cola terminada en guild {}", guild_id);
            return Ok(None);
        };

        self.start_track(&mut session, next, !repeating)
            .await
            .map(Some)
    }

    /// Punto de entrada de todos los eventos del nodo
    pub async fn handle_event(&self, event: NodeEvent) {
        match event {
            NodeEvent::TrackEnded(ended) => {
                let guild_id = ended.guild_id;
                if let Err(e) = self.track_ended(ended).await {
                    error!("❌ No se pudo avanzar la cola en guild {}: {}", guild_id, e);
                }
            }
            NodeEvent::TrackStarted { guild_id, track } => {
                debug!("▶️ El nodo empezó {} en guild {}", track, guild_id);
            }
            NodeEvent::TrackException { guild_id, message } => {
                error!("❌ Error de pista en guild {}: {}", guild_id, message);
            }
            NodeEvent::TrackStuck {
                guild_id,
                threshold_ms,
            } => {
                warn!(
                    "⚠️ Pista atascada en guild {} ({} ms)",
                    guild_id, threshold_ms
                );
            }
            NodeEvent::VoiceClosed {
                guild_id,
                code,
                reason,
            } => {
                warn!(
                    "🔌 Voz cerrada en guild {}: {} ({})",
                    guild_id, reason, code
                );
            }
        }
    }

    // Funciones privadas

    fn session(&self, guild_id: GuildId) -> MusicResult<Arc<SessionHandle>> {
        self.store.get(guild_id).ok_or(MusicError::NotConnected)
    }

    async fn lock_open<'a>(
        &self,
        handle: &'a SessionHandle,
    ) -> MusicResult<tokio::sync::MutexGuard<'a, PlaybackSession>> {
        let session = handle.lock().await;
        if handle.is_closed() {
            return Err(MusicError::NotConnected);
        }
        Ok(session)
    }

    async fn require_player(&self, guild_id: GuildId) -> MusicResult<()> {
        if self
            .node_call("has_player", guild_id, self.node.has_player(guild_id))
            .await?
        {
            Ok(())
        } else {
            Err(MusicError::NoPlayer)
        }
    }

    async fn live_player(&self, guild_id: GuildId) -> MusicResult<PlayerSnapshot> {
        self.node_call("player", guild_id, self.node.player(guild_id))
            .await?
            .ok_or(MusicError::NoPlayer)
    }

    /// Si el nodo está libre, saca la siguiente pista de la cola y la reproduce
    async fn start_if_idle(&self, session: &mut PlaybackSession) -> MusicResult<Option<Track>> {
        let snapshot = self.live_player(session.guild_id()).await?;
        if snapshot.state() != PlayerState::Stopped {
            return Ok(None);
        }

        let Some(next) = session.queue.try_dequeue() else {
            return Ok(None);
        };

        self.start_track(session, next, true).await.map(Some)
    }

    /// Pide al nodo reproducir `track`; si falla deja la sesión como estaba
    async fn start_track(
        &self,
        session: &mut PlaybackSession,
        track: Track,
        from_queue: bool,
    ) -> MusicResult<Track> {
        let guild_id = session.guild_id();
        let previous = session.now_playing().cloned();
        let play_id = self.store.next_play_id();
        session.begin_play(track.clone(), play_id);

        let played = self
            .node_call("play", guild_id, self.node.play(guild_id, &track, play_id))
            .await;

        if let Err(e) = played {
            session.rollback_play(previous);
            if from_queue {
                session.queue.restore_front(track);
            }
            return Err(e);
        }

        info!(
            "🎵 Reproduciendo: {} ({}) en guild {}",
            track,
            track.url().unwrap_or("sin url"),
            guild_id
        );
        Ok(track)
    }

    /// Acota la llamada con el timeout y convierte el fallo en un error genérico
    async fn node_call<T>(
        &self,
        operation: &'static str,
        guild_id: GuildId,
        call: impl Future<Output = NodeResult<T>>,
    ) -> MusicResult<T> {
        let timeout = self.settings.node_timeout;
        let error = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => NodeError::Timeout(timeout),
        };

        error!(
            "❌ El nodo falló en '{}' para guild {}: {}",
            operation, guild_id, error
        );
        Err(MusicError::Node { operation })
    }
}
