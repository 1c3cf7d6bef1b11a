use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::bot::controller::SessionSettings;

/// Volumen expuesto a los usuarios
pub const MIN_VOLUME: u16 = 1;
pub const MAX_VOLUME: u16 = 150;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_ssl: bool,
    pub search_prefix: String,
    pub node_timeout_secs: u64,
    pub reconnect_attempts: u8,

    // Sesiones
    pub default_volume: u16,
    pub page_size: usize,
    pub selection_limit: usize,
    pub max_speed: f64,
}

/// Lee una variable de entorno o usa el valor por defecto
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().parse()?),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            command_prefix: env_or("COMMAND_PREFIX", defaults.command_prefix)?,

            // Lavalink
            lavalink_host: env_or("LAVALINK_HOST", defaults.lavalink_host)?,
            lavalink_port: env_or("LAVALINK_PORT", defaults.lavalink_port)?,
            lavalink_password: env_or("LAVALINK_PASSWORD", defaults.lavalink_password)?,
            lavalink_ssl: env_or("LAVALINK_SSL", defaults.lavalink_ssl)?,
            search_prefix: env_or("SEARCH_PREFIX", defaults.search_prefix)?,
            node_timeout_secs: env_or("NODE_TIMEOUT_SECS", defaults.node_timeout_secs)?,
            reconnect_attempts: env_or("RECONNECT_ATTEMPTS", defaults.reconnect_attempts)?,

            // Sesiones
            default_volume: env_or("DEFAULT_VOLUME", defaults.default_volume)?,
            page_size: env_or("PAGE_SIZE", defaults.page_size)?,
            selection_limit: env_or("SELECTION_LIMIT", defaults.selection_limit)?,
            max_speed: env_or("MAX_SPEED", defaults.max_speed)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must be inside the user-facing range (1-150)
    /// - Page size and node timeout must be greater than 0
    /// - Selection limit must be between 1 and 25
    /// - Max speed must be a positive, finite number
    pub fn validate(&self) -> Result<()> {
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between {} and {}, got: {}",
                MIN_VOLUME,
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.page_size == 0 {
            anyhow::bail!("Page size must be greater than 0");
        }

        if !(1..=25).contains(&self.selection_limit) {
            anyhow::bail!(
                "Selection limit must be between 1 and 25, got: {}",
                self.selection_limit
            );
        }

        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            anyhow::bail!("Max speed must be a positive number, got: {}", self.max_speed);
        }

        if self.node_timeout_secs == 0 {
            anyhow::bail!("Node timeout must be greater than 0");
        }

        if self.search_prefix.trim().is_empty() {
            anyhow::bail!("Search prefix cannot be empty");
        }

        Ok(())
    }

    pub fn lavalink_rest_url(&self) -> String {
        let scheme = if self.lavalink_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.lavalink_host, self.lavalink_port)
    }

    pub fn lavalink_socket_url(&self) -> String {
        let scheme = if self.lavalink_ssl { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.lavalink_host, self.lavalink_port)
    }

    /// Parámetros que el controlador recibe al construirse
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            page_size: self.page_size,
            selection_limit: self.selection_limit,
            default_volume: self.default_volume,
            max_speed: self.max_speed,
            node_timeout: Duration::from_secs(self.node_timeout_secs),
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token and the Lavalink password.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix '{}'\n  \
            Lavalink: {} (búsqueda '{}', timeout {}s, {} reintentos)\n  \
            Sesiones: volumen {}, {} por página, {} opciones, velocidad máx {}",
            self.command_prefix,
            self.lavalink_rest_url(),
            self.search_prefix,
            self.node_timeout_secs,
            self.reconnect_attempts,
            self.default_volume,
            self.page_size,
            self.selection_limit,
            self.max_speed
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (el token no tiene valor por defecto)
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            // Lavalink
            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "youshallnotpass".to_string(),
            lavalink_ssl: false,
            search_prefix: "ytsearch".to_string(),
            node_timeout_secs: 10,
            reconnect_attempts: 5,

            // Sesiones
            default_volume: 100,
            page_size: 5,
            selection_limit: 5,
            max_speed: 4.0,
        }
    }
}
