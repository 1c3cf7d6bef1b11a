use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Pista tal como la entrega el nodo. El núcleo nunca la modifica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Identificador interno del nodo (base64 en Lavalink)
    pub encoded: String,
    pub info: TrackInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Duración en milisegundos
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub uri: Option<String>,
}

impl Track {
    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn url(&self) -> Option<&str> {
        self.info.uri.as_deref()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.info.length)
    }

    pub fn is_stream(&self) -> bool {
        self.info.is_stream
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_stream() {
            write!(f, "{} [en vivo]", self.title())
        } else {
            // Sin milisegundos para que el log sea legible
            let duration = Duration::from_secs(self.info.length / 1000);
            write!(f, "{} [{}]", self.info.title, humantime::format_duration(duration))
        }
    }
}

/// Cómo buscar en el nodo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Carga directa de una URL
    Direct,
    /// Búsqueda de texto en el proveedor configurado del nodo
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    NoMatches,
    TrackLoaded,
    PlaylistLoaded,
    SearchResult,
    LoadFailed,
}

/// Resultado crudo de una búsqueda en el nodo, antes de clasificarlo.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub status: LoadStatus,
    pub tracks: Vec<Track>,
    pub playlist_name: Option<String>,
    pub error_cause: Option<String>,
}

impl LoadResult {
    pub fn empty() -> Self {
        Self {
            status: LoadStatus::NoMatches,
            tracks: Vec::new(),
            playlist_name: None,
            error_cause: None,
        }
    }

    pub fn track(track: Track) -> Self {
        Self {
            status: LoadStatus::TrackLoaded,
            tracks: vec![track],
            playlist_name: None,
            error_cause: None,
        }
    }

    pub fn playlist(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            status: LoadStatus::PlaylistLoaded,
            tracks,
            playlist_name: Some(name.into()),
            error_cause: None,
        }
    }

    pub fn search(tracks: Vec<Track>) -> Self {
        Self {
            status: LoadStatus::SearchResult,
            tracks,
            playlist_name: None,
            error_cause: None,
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            status: LoadStatus::LoadFailed,
            tracks: Vec::new(),
            playlist_name: None,
            error_cause: Some(cause.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(length: u64, is_stream: bool) -> Track {
        Track {
            encoded: "QAAA".to_string(),
            info: TrackInfo {
                identifier: "abc".to_string(),
                title: "Never Gonna Give You Up".to_string(),
                author: "Rick Astley".to_string(),
                length,
                is_stream,
                uri: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            },
        }
    }

    #[test]
    fn test_display_formats_duration() {
        assert_eq!(
            sample(213_500, false).to_string(),
            "Never Gonna Give You Up [3m 33s]"
        );
        assert_eq!(
            sample(0, true).to_string(),
            "Never Gonna Give You Up [en vivo]"
        );
    }

    #[test]
    fn test_deserialize_lavalink_track() {
        let json = r#"{
            "encoded": "QAAAjQIAJVJpY2sgQXN0bGV5",
            "info": {
                "identifier": "dQw4w9WgXcQ",
                "isSeekable": true,
                "author": "RickAstleyVEVO",
                "length": 212000,
                "isStream": false,
                "position": 0,
                "title": "Rick Astley - Never Gonna Give You Up",
                "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "sourceName": "youtube"
            },
            "pluginInfo": {}
        }"#;

        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.info.identifier, "dQw4w9WgXcQ");
        assert_eq!(track.duration(), Duration::from_secs(212));
        assert_eq!(
            track.url(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }
}
