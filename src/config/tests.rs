use super::load::{default_config_path, resolve_config_path, system_config_path};
use super::schema::*;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

fn valid_settings() -> Settings {
    Settings {
        media_player_entity: "media_player.living_room".to_string(),
        ..Settings::default()
    }
}

#[test]
fn resolve_config_path_prefers_hass_mpris_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("HASS_MPRIS_CONFIG_PATH", "/tmp/hass-mpris-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/hass-mpris-test-config.toml")
    );
}

#[test]
fn resolve_config_path_uses_xdg_before_system_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("HASS_MPRIS_CONFIG_PATH");
    let _g2 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");

    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/xdg-config-home/hass-mpris/config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("hass-mpris")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("hass-mpris")
            .join("config.toml")
    );
}

#[test]
fn system_config_lives_under_etc() {
    assert_eq!(
        system_config_path(),
        std::path::PathBuf::from("/etc/hass-mpris/config.toml")
    );
}

#[test]
fn settings_load_from_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
media_player_entity = "media_player.kitchen"
reconnect_delay_secs = 10

[home_assistant]
host = "ha.lan"
port = 443
ssl = true
token = "abc"

[player]
identity = "Kitchen"
desktop_entry = "kitchen"
can_control = false

[art]
size = 250

[log]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("HASS_MPRIS_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("HASS_MPRIS__HOME_ASSISTANT__TOKEN");
    let _g3 = EnvGuard::remove("HASS_MPRIS__MEDIA_PLAYER_ENTITY");

    let s = Settings::load().unwrap();
    assert_eq!(s.media_player_entity, "media_player.kitchen");
    assert_eq!(s.reconnect_delay_secs, 10);
    assert_eq!(s.home_assistant.host, "ha.lan");
    assert_eq!(s.home_assistant.port, 443);
    assert!(s.home_assistant.ssl);
    assert_eq!(s.home_assistant.token, "abc");
    assert_eq!(s.player.identity, "Kitchen");
    assert_eq!(s.player.desktop_entry, "kitchen");
    assert!(!s.player.can_control);
    assert_eq!(s.art.size, Some(250));
    assert_eq!(s.log.level, "debug");
    assert_eq!(s.log.format, LogFormat::Json);
    assert!(s.validate().is_ok());
}

#[test]
fn settings_missing_file_uses_defaults() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("absent.toml");
    let _g1 = EnvGuard::set("HASS_MPRIS_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("HASS_MPRIS__MEDIA_PLAYER_ENTITY");

    let s = Settings::load().unwrap();
    assert_eq!(s.home_assistant.host, "localhost");
    assert_eq!(s.home_assistant.port, 8123);
    assert_eq!(s.player.identity, "Home Assistant");
    assert_eq!(s.player.desktop_entry, "hass-mpris");
    assert!(s.player.can_control);
    assert_eq!(s.art.size, None);
    assert_eq!(s.reconnect_delay_secs, 5);
    assert_eq!(s.log.format, LogFormat::Pretty);
    assert!(s.validate().is_err());
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
media_player_entity = "media_player.kitchen"

[home_assistant]
token = "from-file"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("HASS_MPRIS_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("HASS_MPRIS__HOME_ASSISTANT__TOKEN", "from-env");
    let _g3 = EnvGuard::set("HASS_MPRIS__MEDIA_PLAYER_ENTITY", "media_player.office");

    let s = Settings::load().unwrap();
    assert_eq!(s.home_assistant.token, "from-env");
    assert_eq!(s.media_player_entity, "media_player.office");
}

#[test]
fn validate_rejects_non_media_player_entities() {
    assert!(valid_settings().validate().is_ok());

    let mut s = valid_settings();
    s.media_player_entity = "light.hallway".to_string();
    assert!(s.validate().is_err());

    s.media_player_entity = "media_player.".to_string();
    assert!(s.validate().is_err());

    let mut s = valid_settings();
    s.home_assistant.port = 0;
    assert!(s.validate().is_err());
}

#[test]
fn urls_follow_ssl_setting() {
    let mut s = valid_settings();
    assert_eq!(s.base_url().unwrap().as_str(), "http://localhost:8123/");
    assert_eq!(
        s.websocket_url().unwrap().as_str(),
        "ws://localhost:8123/api/websocket"
    );

    s.home_assistant.host = "ha.example.com".to_string();
    s.home_assistant.port = 443;
    s.home_assistant.ssl = true;
    assert_eq!(s.base_url().unwrap().as_str(), "https://ha.example.com/");
    assert_eq!(
        s.websocket_url().unwrap().as_str(),
        "wss://ha.example.com/api/websocket"
    );
}
