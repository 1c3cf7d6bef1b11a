use tracing::{error, info};
use url::Url;

use crate::{
    audio::{
        node::AudioNode,
        track::{LoadResult, LoadStatus, SearchKind, Track},
    },
    error::NodeResult,
};

/// Clasificación de una búsqueda
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    NoMatches,
    TrackLoaded(Track),
    PlaylistLoaded {
        name: Option<String>,
        tracks: Vec<Track>,
    },
    /// Lista corta de candidatos a la espera de que el usuario elija
    Ambiguous(Vec<Track>),
    LoadFailed {
        cause: String,
    },
}

/// Resuelve texto libre o URLs contra el nodo.
///
/// El tope de candidatos ambiguos lo impone el resolver, no el nodo.
#[derive(Debug, Clone)]
pub struct SearchResolver {
    selection_limit: usize,
}

impl SearchResolver {
    pub fn new(selection_limit: usize) -> Self {
        Self { selection_limit }
    }

    /// Una URL absoluta se carga directamente; cualquier otra cosa es texto a buscar
    pub fn search_kind(query: &str) -> SearchKind {
        match Url::parse(query.trim()) {
            Ok(url) if !url.cannot_be_a_base() => SearchKind::Direct,
            _ => SearchKind::Search,
        }
    }

    pub async fn resolve(&self, node: &dyn AudioNode, query: &str) -> NodeResult<SearchOutcome> {
        let query = query.trim();
        let kind = Self::search_kind(query);
        info!("🔍 Búsqueda ({:?}): {}", kind, query);

        let result = node.load_tracks(kind, query).await?;
        Ok(self.classify(result))
    }

    pub fn classify(&self, result: LoadResult) -> SearchOutcome {
        let LoadResult {
            status,
            mut tracks,
            playlist_name,
            error_cause,
        } = result;

        match status {
            LoadStatus::NoMatches => SearchOutcome::NoMatches,
            LoadStatus::TrackLoaded => match tracks.into_iter().next() {
                Some(track) => SearchOutcome::TrackLoaded(track),
                None => SearchOutcome::NoMatches,
            },
            LoadStatus::PlaylistLoaded if tracks.is_empty() => SearchOutcome::NoMatches,
            LoadStatus::PlaylistLoaded => {
                info!(
                    "📃 Playlist '{}' con {} pistas",
                    playlist_name.as_deref().unwrap_or("sin nombre"),
                    tracks.len()
                );
                SearchOutcome::PlaylistLoaded {
                    name: playlist_name,
                    tracks,
                }
            }
            LoadStatus::SearchResult if tracks.is_empty() => SearchOutcome::NoMatches,
            LoadStatus::SearchResult => {
                tracks.truncate(self.selection_limit);
                SearchOutcome::Ambiguous(tracks)
            }
            LoadStatus::LoadFailed => {
                let cause = error_cause.unwrap_or_else(|| "causa desconocida".to_string());
                error!("❌ El nodo no pudo cargar la música: {}", cause);
                SearchOutcome::LoadFailed { cause }
            }
        }
    }
}

impl Default for SearchResolver {
    fn default() -> Self {
        Self::new(5)
    }
}
