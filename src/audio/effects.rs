use serde::Serialize;
use tracing::info;

/// Valor que el nodo usa para el preset nightcore (float32 de 1.3)
const NIGHTCORE_FACTOR: f64 = 1.2999999523162842;

/// Filtro de escala temporal del nodo.
///
/// Es el único registro de filtros de una sesión: la velocidad y el preset
/// nightcore lo escriben ambos y gana la última escritura.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Timescale {
    pub speed: f64,
    pub pitch: f64,
    pub rate: f64,
}

impl Timescale {
    pub const IDENTITY: Timescale = Timescale {
        speed: 1.0,
        pitch: 1.0,
        rate: 1.0,
    };

    /// Cambia la velocidad conservando el tono original
    pub fn with_speed(speed: f64) -> Self {
        Self {
            speed,
            ..Self::IDENTITY
        }
    }

    pub fn is_nightcore(&self) -> bool {
        *self == FilterPreset::Nightcore.timescale()
    }
}

impl Default for Timescale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Presets de filtro disponibles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPreset {
    Normal,
    Nightcore,
}

impl FilterPreset {
    pub fn from_enabled(nightcore: bool) -> Self {
        if nightcore {
            Self::Nightcore
        } else {
            Self::Normal
        }
    }

    pub fn timescale(self) -> Timescale {
        match self {
            Self::Normal => Timescale::IDENTITY,
            Self::Nightcore => Timescale {
                speed: NIGHTCORE_FACTOR,
                pitch: NIGHTCORE_FACTOR,
                rate: 1.0,
            },
        }
    }
}

/// Estado de filtros de una sesión
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    timescale: Timescale,
}

impl FilterState {
    pub fn timescale(&self) -> Timescale {
        self.timescale
    }

    pub fn speed(&self) -> f64 {
        self.timescale.speed
    }

    pub fn nightcore_enabled(&self) -> bool {
        self.timescale.is_nightcore()
    }

    pub fn apply(&mut self, timescale: Timescale) {
        self.timescale = timescale;
        info!(
            "🎛️ Filtro aplicado: velocidad {:.2}, tono {:.2}, ritmo {:.2}",
            timescale.speed, timescale.pitch, timescale.rate
        );
    }
}
