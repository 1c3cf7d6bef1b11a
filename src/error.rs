use std::time::Duration;

use thiserror::Error;

pub type NodeResult<T> = Result<T, NodeError>;

pub type MusicResult<T> = Result<T, MusicError>;

/// Fallos del nodo de audio o del gateway de voz.
///
/// Nunca llegan tal cual a la capa de comandos: el controlador los registra
/// con todo el detalle y los convierte en [`MusicError::Node`].
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("error HTTP con el nodo: {0}")]
    Http(#[from] reqwest::Error),

    #[error("el nodo rechazó la petición ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("respuesta inválida del nodo: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("error en el websocket del nodo: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("el nodo todavía no tiene una sesión activa")]
    NotReady,

    #[error("error en el gateway de voz: {0}")]
    Voice(String),

    #[error("configuración inválida del nodo: {0}")]
    Config(String),

    #[error("el nodo no respondió en {0:?}")]
    Timeout(Duration),
}

/// Resultado tipado de cada operación del controlador.
///
/// La capa de comandos decide cómo mostrarlo; el texto de `Display` es solo
/// un valor por defecto razonable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MusicError {
    #[error("No estoy conectado a un canal de voz en este servidor")]
    NotConnected,

    #[error("No hay un reproductor activo para este servidor")]
    NoPlayer,

    #[error("Debes estar en un canal de voz")]
    NotInVoiceChannel,

    #[error("Ya estoy conectado a un canal de voz")]
    AlreadyActive,

    #[error("No se encontró nada para: {query}")]
    NoMatches { query: String },

    #[error("No hay ninguna selección pendiente")]
    NoPendingSelection,

    #[error("Selección inválida: {index} (hay {available} opciones)")]
    InvalidSelection { index: usize, available: usize },

    #[error("{what} debe estar entre {min} y {max}, se recibió {value}")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Solo hay una canción o ninguna, no hay nada que saltar")]
    NothingToSkip,

    #[error("El nodo de audio falló durante '{operation}'")]
    Node { operation: &'static str },
}
