use crate::config;
use crate::error::{BridgeError, Result};

/// Load and validate settings. Unlike an optional UI config, the daemon has
/// nothing to publish without an entity, so both failures are fatal.
pub fn load_settings() -> Result<config::Settings> {
    let settings = config::Settings::load()?;
    settings.validate().map_err(BridgeError::InvalidConfig)?;
    Ok(settings)
}
