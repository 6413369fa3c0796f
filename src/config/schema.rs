use serde::Deserialize;

/// Daemon settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/hass-mpris/config.toml` or
/// `~/.config/hass-mpris/config.toml`; `/etc/hass-mpris/config.toml` when
/// running as root.
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `HASS_MPRIS__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub home_assistant: HomeAssistantSettings,
    /// Entity to publish, e.g. `media_player.living_room`.
    pub media_player_entity: String,
    pub player: PlayerSettings,
    pub art: ArtSettings,
    /// Seconds to wait before reconnecting after the websocket drops.
    pub reconnect_delay_secs: u64,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_assistant: HomeAssistantSettings::default(),
            media_player_entity: String::new(),
            player: PlayerSettings::default(),
            art: ArtSettings::default(),
            reconnect_delay_secs: 5,
            log: LogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HomeAssistantSettings {
    pub host: String,
    pub port: u16,
    /// Use `https`/`wss`.
    pub ssl: bool,
    /// Long-lived access token.
    pub token: String,
}

impl Default for HomeAssistantSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            ssl: false,
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Fallback identity when the entity has no `friendly_name`.
    pub identity: String,
    /// Also names the bus endpoint: `org.mpris.MediaPlayer2.<desktop_entry>`.
    pub desktop_entry: String,
    /// Whether MPRIS clients may control the player at all.
    pub can_control: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            identity: "Home Assistant".to_string(),
            desktop_entry: "hass-mpris".to_string(),
            can_control: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArtSettings {
    /// Replaces the `size` query parameter of art URLs when set.
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Pretty,
    Json,
}
