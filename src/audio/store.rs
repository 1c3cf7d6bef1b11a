use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::session::PlaybackSession;
use crate::error::{MusicError, MusicResult};

/// Sesión registrada en el store, con su lock propio.
///
/// Cada guild tiene su propio `Mutex`; nunca hay un lock global entre guilds.
#[derive(Debug)]
pub struct SessionHandle {
    guild_id: GuildId,
    epoch: u64,
    closed: AtomicBool,
    state: Mutex<PlaybackSession>,
}

impl SessionHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Identifica esta sesión frente a otra posterior del mismo guild
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub async fn lock(&self) -> MutexGuard<'_, PlaybackSession> {
        self.state.lock().await
    }

    /// `true` cuando la sesión fue destruida; los resultados en vuelo deben descartarse
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Sesiones activas por guild: como máximo una por guild
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<GuildId, Arc<SessionHandle>>,
    epochs: AtomicU64,
    play_ids: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una sesión nueva. Falla con `AlreadyActive` si el guild ya tiene una.
    pub fn create(&self, session: PlaybackSession) -> MusicResult<Arc<SessionHandle>> {
        let guild_id = session.guild_id();

        match self.sessions.entry(guild_id) {
            Entry::Occupied(_) => Err(MusicError::AlreadyActive),
            Entry::Vacant(slot) => {
                let handle = Arc::new(SessionHandle {
                    guild_id,
                    epoch: self.epochs.fetch_add(1, Ordering::Relaxed) + 1,
                    closed: AtomicBool::new(false),
                    state: Mutex::new(session),
                });
                slot.insert(Arc::clone(&handle));
                info!("🆕 Sesión creada para guild {}", guild_id);
                Ok(handle)
            }
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(&guild_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Elimina `handle` solo si sigue siendo la sesión registrada para su guild
    pub fn remove_handle(&self, handle: &SessionHandle) -> bool {
        handle.close();
        let removed = self
            .sessions
            .remove_if(&handle.guild_id, |_, current| current.epoch == handle.epoch)
            .is_some();

        if removed {
            info!("🗑️ Sesión eliminada para guild {}", handle.guild_id);
        } else {
            debug!(
                "Sesión {} de guild {} ya no estaba registrada",
                handle.epoch, handle.guild_id
            );
        }
        removed
    }

    /// Id de reproducción único en todo el store, nunca reutilizado al reabrir un guild
    pub fn next_play_id(&self) -> u64 {
        self.play_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
