use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use super::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

/// Cola FIFO de una sesión. El orden de inserción es el orden de reproducción.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    loop_mode: LoopMode,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una pista al final y devuelve su posición en la cola (1 = siguiente)
    pub fn enqueue(&mut self, track: Track) -> usize {
        debug!("➕ Agregado a la cola: {}", track);
        self.items.push_back(track);
        self.items.len()
    }

    /// Agrega varias pistas (playlist) respetando el orden recibido
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.items.len();
        self.items.extend(tracks);
        let added = self.items.len() - before;
        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Obtiene el siguiente track (FIFO)
    pub fn try_dequeue(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        match &next {
            Some(track) => debug!("➡️ Siguiente en cola: {}", track),
            None => debug!("📭 Cola vacía"),
        }
        next
    }

    /// Devuelve una pista al frente cuando el nodo no pudo reproducirla
    pub(crate) fn restore_front(&mut self, track: Track) {
        self.items.push_front(track);
    }

    pub fn peek(&self) -> Option<&Track> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Limpia la cola y devuelve cuántas pistas se eliminaron
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        if cleared > 0 {
            info!("🗑️ Cola limpiada: {} pistas removidas", cleared);
        }
        cleared
    }

    /// Página `page_index` (desde cero). Fuera de rango devuelve una página vacía.
    pub fn page(&self, page_index: usize, page_size: usize) -> Vec<Track> {
        if page_size == 0 {
            return Vec::new();
        }

        let Some(start) = page_index.checked_mul(page_size) else {
            return Vec::new();
        };

        self.items
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect()
    }

    pub fn total_pages(&self, page_size: usize) -> usize {
        if page_size == 0 || self.items.is_empty() {
            1
        } else {
            self.items.len().div_ceil(page_size)
        }
    }

    /// Duración de la cola; las transmisiones en vivo no suman
    pub fn total_duration(&self) -> Duration {
        self.items
            .iter()
            .filter(|track| !track.is_stream())
            .map(Track::duration)
            .sum()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Track => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    /// Siguiente pista tras terminar `finished` de forma natural, según el modo de repetición
    pub fn next_after(&mut self, finished: &Track) -> Option<Track> {
        match self.loop_mode {
            LoopMode::Off => self.try_dequeue(),
            LoopMode::Track => {
                info!("🔂 Repitiendo: {}", finished);
                Some(finished.clone())
            }
            LoopMode::Queue => {
                self.items.push_back(finished.clone());
                self.try_dequeue()
            }
        }
    }
}
