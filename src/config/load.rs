use std::os::unix::fs::MetadataExt;
use std::{env, path::PathBuf};

use url::Url;

use super::schema::Settings;

const APP_DIR: &str = "hass-mpris";
const CONFIG_FILE: &str = "config.toml";
const SYSTEM_CONFIG_DIR: &str = "/etc";

/// Configuration loading helpers.
///
/// `Settings::load` layers environment variables (prefix `HASS_MPRIS__`) over
/// an optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("HASS_MPRIS")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        let entity = self.media_player_entity.trim();
        if entity.is_empty() {
            return Err("media_player_entity must be set".to_string());
        }
        if !entity.starts_with("media_player.") || entity.len() == "media_player.".len() {
            return Err(format!(
                "media_player_entity '{entity}' is not a media_player entity"
            ));
        }
        if self.home_assistant.host.trim().is_empty() {
            return Err("home_assistant.host must be set".to_string());
        }
        if self.home_assistant.port == 0 {
            return Err("home_assistant.port must be >= 1".to_string());
        }
        if self.player.desktop_entry.is_empty() {
            return Err("player.desktop_entry must be set".to_string());
        }
        Ok(())
    }

    /// `http(s)://host:port/`, the origin relative art paths resolve against.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        let scheme = if self.home_assistant.ssl { "https" } else { "http" };
        Url::parse(&format!(
            "{scheme}://{}:{}/",
            self.home_assistant.host, self.home_assistant.port
        ))
    }

    pub fn websocket_url(&self) -> Result<Url, url::ParseError> {
        let scheme = if self.home_assistant.ssl { "wss" } else { "ws" };
        Url::parse(&format!(
            "{scheme}://{}:{}/api/websocket",
            self.home_assistant.host, self.home_assistant.port
        ))
    }
}

/// Resolve the config path from `HASS_MPRIS_CONFIG_PATH` or the defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("HASS_MPRIS_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    if env::var_os("XDG_CONFIG_HOME").is_none() && running_as_root() {
        let system = system_config_path();
        if system.exists() {
            return Some(system);
        }
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/hass-mpris/config.toml`
/// or `~/.config/hass-mpris/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else if let Some(home) = env::var_os("HOME") {
        Some(PathBuf::from(home).join(".config"))
    } else {
        None
    };

    config_home.map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

pub fn system_config_path() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_DIR).join(APP_DIR).join(CONFIG_FILE)
}

/// `/proc/self` is owned by the effective user.
fn running_as_root() -> bool {
    std::fs::metadata("/proc/self").is_ok_and(|m| m.uid() == 0)
}
