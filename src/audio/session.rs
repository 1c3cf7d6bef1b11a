use serenity::model::id::{ChannelId, GuildId};
use tracing::{debug, info};

use super::{
    effects::FilterState,
    node::TrackEnded,
    queue::MusicQueue,
    track::Track,
};
use crate::error::{MusicError, MusicResult};

/// Pista que el núcleo le pidió reproducir al nodo por última vez
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: Track,
    pub play_id: u64,
}

/// Estado en memoria de la sesión de un guild.
///
/// No hace I/O: el controlador decide cuándo hablar con el nodo y usa estos
/// métodos para confirmar el resultado bajo el lock del guild.
#[derive(Debug)]
pub struct PlaybackSession {
    guild_id: GuildId,
    voice_channel: ChannelId,
    text_channel: ChannelId,
    pub queue: MusicQueue,
    pending_selection: Option<Vec<Track>>,
    filters: FilterState,
    volume: u16,
    now_playing: Option<NowPlaying>,
}

impl PlaybackSession {
    pub fn new(
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        volume: u16,
    ) -> Self {
        Self {
            guild_id,
            voice_channel,
            text_channel,
            queue: MusicQueue::new(),
            pending_selection: None,
            filters: FilterState::default(),
            volume,
            now_playing: None,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn voice_channel(&self) -> ChannelId {
        self.voice_channel
    }

    pub fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    pub fn volume(&self) -> u16 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: u16) {
        self.volume = volume;
        info!("🔊 Volumen ajustado a {} en guild {}", volume, self.guild_id);
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterState {
        &mut self.filters
    }

    // Selección pendiente

    pub fn pending_selection(&self) -> Option<&[Track]> {
        self.pending_selection.as_deref()
    }

    pub fn set_pending_selection(&mut self, tracks: Vec<Track>) {
        debug!("📝 Selección pendiente con {} opciones", tracks.len());
        self.pending_selection = Some(tracks);
    }

    pub fn clear_pending_selection(&mut self) {
        self.pending_selection = None;
    }

    /// Valida `index` (desde 1) sin tocar la selección pendiente
    pub fn check_selection(&self, index: usize) -> MusicResult<&Track> {
        let tracks = self
            .pending_selection
            .as_deref()
            .ok_or(MusicError::NoPendingSelection)?;

        index
            .checked_sub(1)
            .and_then(|i| tracks.get(i))
            .ok_or(MusicError::InvalidSelection {
                index,
                available: tracks.len(),
            })
    }

    /// Toma la opción elegida y cierra la selección. Un índice inválido la deja intacta.
    pub fn take_selection(&mut self, index: usize) -> MusicResult<Track> {
        let track = self.check_selection(index)?.clone();
        self.pending_selection = None;
        Ok(track)
    }

    // Pista actual

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// Registra que se va a pedir `track` al nodo con `play_id`.
    ///
    /// El id lo reparte el [`SessionStore`](super::store::SessionStore) y no se repite
    /// entre sesiones del mismo guild.
    pub fn begin_play(&mut self, track: Track, play_id: u64) {
        self.now_playing = Some(NowPlaying { track, play_id });
    }

    /// Restaura la pista anterior cuando el nodo rechazó la nueva
    pub fn rollback_play(&mut self, previous: Option<NowPlaying>) {
        self.now_playing = previous;
    }

    pub fn take_now_playing(&mut self) -> Option<NowPlaying> {
        self.now_playing.take()
    }

    /// ¿El evento corresponde a la reproducción activa? Protege contra eventos duplicados.
    pub fn is_current(&self, event: &TrackEnded) -> bool {
        match (&self.now_playing, event.play_id) {
            (Some(current), Some(play_id)) => current.play_id == play_id,
            (Some(current), None) => current.track.encoded == event.track.encoded,
            (None, _) => false,
        }
    }

    /// Detiene todo lo pendiente: cola, selección y pista actual
    pub fn reset_playback(&mut self) -> usize {
        self.pending_selection = None;
        self.now_playing = None;
        self.queue.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{node::TrackEndReason, track::TrackInfo};

    fn track(n: u32) -> Track {
        Track {
            encoded: format!("enc{n}"),
            info: TrackInfo {
                identifier: format!("id{n}"),
                title: format!("Song {n}"),
                author: String::new(),
                length: 1000,
                is_stream: false,
                uri: None,
            },
        }
    }

    fn session() -> PlaybackSession {
        PlaybackSession::new(GuildId::new(1), ChannelId::new(2), ChannelId::new(3), 100)
    }

    fn ended(n: u32, play_id: Option<u64>) -> TrackEnded {
        TrackEnded {
            guild_id: GuildId::new(1),
            track: track(n),
            play_id,
            reason: TrackEndReason::Finished,
        }
    }

    #[test]
    fn test_selection_without_pending() {
        let mut session = session();
        assert_eq!(session.take_selection(1), Err(MusicError::NoPendingSelection));
    }

    #[test]
    fn test_invalid_selection_keeps_pending() {
        let mut session = session();
        session.set_pending_selection(vec![track(1), track(2), track(3)]);

        for index in [0, 4, 9] {
            assert_eq!(
                session.take_selection(index),
                Err(MusicError::InvalidSelection {
                    index,
                    available: 3
                })
            );
        }
        assert_eq!(session.pending_selection().map(<[Track]>::len), Some(3));

        assert_eq!(session.take_selection(2), Ok(track(2)));
        assert!(session.pending_selection().is_none());
    }

    #[test]
    fn test_play_ids_identify_current_track() {
        let mut session = session();
        let (first, second) = (1, 2);
        session.begin_play(track(1), first);
        assert!(session.is_current(&ended(1, Some(first))));
        assert!(session.is_current(&ended(1, None)));

        session.begin_play(track(1), second);
        assert!(!session.is_current(&ended(1, Some(first))));
        assert!(session.is_current(&ended(1, Some(second))));

        session.take_now_playing();
        assert!(!session.is_current(&ended(1, Some(second))));
    }

    #[test]
    fn test_rollback_restores_previous() {
        let mut session = session();
        session.begin_play(track(1), 1);
        let previous = session.now_playing().cloned();
        session.begin_play(track(2), 2);
        session.rollback_play(previous);
        assert_eq!(session.now_playing().map(|np| np.track.clone()), Some(track(1)));
    }

    #[test]
    fn test_reset_playback_clears_everything() {
        let mut session = session();
        session.queue.extend([track(2), track(3)]);
        session.set_pending_selection(vec![track(4)]);
        session.begin_play(track(1), 1);

        assert_eq!(session.reset_playback(), 2);
        assert!(session.queue.is_empty());
        assert!(session.pending_selection().is_none());
        assert!(session.now_playing().is_none());
    }
}
