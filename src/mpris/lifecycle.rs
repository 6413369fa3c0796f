//! Registration of the published bus name.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{BridgeError, Result};

use super::properties::PropertyStore;
use super::types::{MPRIS_NAMESPACE, Property};

/// The IPC side the lifecycle manager drives.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Serve the MPRIS object (both interfaces).
    async fn register_object(&self) -> Result<()>;
    async fn register_service(&self, name: &str) -> Result<()>;
    async fn unregister_service(&self, name: &str) -> Result<()>;
}

/// Keeps the bus name registered only while the remote player is usable.
///
/// Whether the name is currently held is tracked with a local flag and never
/// re-checked against the bus.
pub struct ServiceLifecycleManager<T: Transport> {
    transport: T,
    store: Arc<PropertyStore>,
    service_name: Option<String>,
    registered: bool,
}

impl<T: Transport> ServiceLifecycleManager<T> {
    pub fn new(transport: T, store: Arc<PropertyStore>) -> Self {
        Self {
            transport,
            store,
            service_name: None,
            registered: false,
        }
    }

    /// Set the identity properties, serve the object and remember the
    /// endpoint name `org.mpris.MediaPlayer2.<desktop_entry>`.
    pub async fn register_player(
        &mut self,
        identity: &str,
        desktop_entry: &str,
        can_control: bool,
    ) -> Result<()> {
        self.store.register_identity(identity, desktop_entry)?;
        self.store
            .set_property(Property::CanControl, can_control.into())?;
        self.transport.register_object().await?;

        let name = service_name(desktop_entry);
        info!(identity, name = %name, "player registered");
        self.service_name = Some(name);
        Ok(())
    }

    pub fn is_player_registered(&self) -> bool {
        self.service_name.is_some()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub async fn ensure_registered(&mut self) -> Result<()> {
        if self.registered {
            return Ok(());
        }
        let name = self
            .service_name
            .as_deref()
            .ok_or(BridgeError::PlayerNotRegistered)?;
        self.transport.register_service(name).await?;
        debug!(name, "service name acquired");
        self.registered = true;
        Ok(())
    }

    pub async fn ensure_unregistered(&mut self) -> Result<()> {
        if !self.registered {
            return Ok(());
        }
        let name = self
            .service_name
            .as_deref()
            .ok_or(BridgeError::PlayerNotRegistered)?;
        self.transport.unregister_service(name).await?;
        debug!(name, "service name released");
        self.registered = false;
        Ok(())
    }
}

pub fn service_name(desktop_entry: &str) -> String {
    format!("{MPRIS_NAMESPACE}.{desktop_entry}")
}
