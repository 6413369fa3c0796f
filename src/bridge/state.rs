use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, Result};
use crate::hass::{EntityState, MediaPlayerAttributes, StateChange};
use crate::mpris::{
    Interface, LoopStatus, PlaybackStatus, Property, PropertyStore, PropertyValue, ServiceLifecycleManager,
    Transport, clamp_volume,
};

use super::metadata::{MetadataAssembler, TrackAttributes, seconds_to_micros};

/// `supported_features` bit for seeking.
pub const SUPPORT_SEEK: u32 = 2;

/// Projection of a Home Assistant media player state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExternalState {
    Playing,
    Paused,
    Stopped,
    /// Off or unknown: nothing to control, not published.
    Disabled,
}

impl ExternalState {
    pub fn parse(state: &str) -> Result<Self> {
        match state {
            "playing" => Ok(Self::Playing),
            "paused" => Ok(Self::Paused),
            "idle" => Ok(Self::Stopped),
            "off" => Ok(Self::Disabled),
            other => Err(BridgeError::UnknownState(other.to_string())),
        }
    }

    pub fn playback_status(self) -> PlaybackStatus {
        match self {
            Self::Playing => PlaybackStatus::Playing,
            Self::Paused => PlaybackStatus::Paused,
            Self::Stopped | Self::Disabled => PlaybackStatus::Stopped,
        }
    }

    pub fn is_active(self) -> bool {
        self != Self::Disabled
    }
}

/// Applies entity states to the property store and keeps the bus name in
/// step with them.
pub struct StateMapper<T: Transport> {
    store: Arc<PropertyStore>,
    lifecycle: ServiceLifecycleManager<T>,
    assembler: MetadataAssembler,
    content_id: Option<String>,
}

impl<T: Transport> StateMapper<T> {
    pub fn new(
        store: Arc<PropertyStore>,
        lifecycle: ServiceLifecycleManager<T>,
        assembler: MetadataAssembler,
    ) -> Self {
        Self {
            store,
            lifecycle,
            assembler,
            content_id: None,
        }
    }

    pub async fn register_player(
        &mut self,
        identity: &str,
        desktop_entry: &str,
        can_control: bool,
    ) -> Result<()> {
        self.lifecycle
            .register_player(identity, desktop_entry, can_control)
            .await
    }

    pub fn is_player_registered(&self) -> bool {
        self.lifecycle.is_player_registered()
    }

    pub fn lifecycle(&self) -> &ServiceLifecycleManager<T> {
        &self.lifecycle
    }

    /// Apply a full snapshot, rebuilding metadata unconditionally.
    pub async fn apply_snapshot(&mut self, entity: &EntityState) -> Result<()> {
        self.content_id = None;
        self.apply(entity).await?;
        debug!(properties = ?self.store.get_all(Interface::Player), "snapshot applied");
        Ok(())
    }

    /// Apply one `state_changed` event.
    pub async fn apply_change(&mut self, change: &StateChange) -> Result<()> {
        match &change.new_state {
            Some(state) => self.apply(state).await,
            None => {
                warn!(entity = %change.entity_id, "entity removed, keeping last state");
                Ok(())
            }
        }
    }

    pub async fn apply(&mut self, entity: &EntityState) -> Result<()> {
        self.refresh_metadata(&entity.attributes);
        self.apply_state(&entity.state, &entity.attributes).await
    }

    /// Core transition: playback status, capabilities and registration from
    /// the state name, then the attribute-driven properties.
    pub async fn apply_state(&mut self, state: &str, attrs: &MediaPlayerAttributes) -> Result<()> {
        let projected = ExternalState::parse(state).unwrap_or_else(|e| {
            error!(error = %e, "treating player as off");
            ExternalState::Disabled
        });
        debug!(state, ?projected, "applying state");

        let active = projected.is_active();
        let status = projected.playback_status();
        // Settled against the outgoing status before it changes.
        self.sync_position(attrs, status);
        self.update(Property::PlaybackStatus, status);
        for flag in [
            Property::CanPlay,
            Property::CanPause,
            Property::CanQuit,
            Property::CanGoNext,
            Property::CanGoPrevious,
        ] {
            self.update(flag, active);
        }
        let can_seek = active
            && attrs
                .supported_features
                .is_some_and(|features| features & SUPPORT_SEEK != 0);
        self.update(Property::CanSeek, can_seek);

        if let Some(shuffle) = attrs.shuffle {
            self.update(Property::Shuffle, shuffle);
        }
        if let Some(repeat) = &attrs.repeat {
            self.update(Property::LoopStatus, LoopStatus::from_repeat(repeat));
        }
        if let Some(volume) = attrs.volume_level {
            self.update(Property::Volume, clamp_volume(volume));
        }

        if active {
            self.lifecycle.ensure_registered().await
        } else {
            self.lifecycle.ensure_unregistered().await
        }
    }

    /// Withdraw the bus name while the entity is unreachable or on exit.
    pub async fn release(&mut self) -> Result<()> {
        self.lifecycle.ensure_unregistered().await
    }

    fn refresh_metadata(&mut self, attrs: &MediaPlayerAttributes) {
        let content_id = attrs.media_content_id.clone().unwrap_or_default();
        if self.content_id.as_deref() == Some(content_id.as_str()) {
            return;
        }

        let metadata = self.assembler.assemble(&TrackAttributes::from(attrs));
        info!(
            content_id = %content_id,
            title = %metadata.title,
            "now playing"
        );
        self.update(Property::Metadata, metadata);
        self.content_id = Some(content_id);
    }

    /// Take a reported position, or keep the extrapolated one across a
    /// status change when none is reported.
    fn sync_position(&self, attrs: &MediaPlayerAttributes, status: PlaybackStatus) {
        let now = Utc::now();
        let result = match attrs.media_position {
            Some(position) => self
                .store
                .sync_position(
                    seconds_to_micros(position),
                    attrs.media_position_updated_at.unwrap_or(now),
                )
                .map(|_| ()),
            None if self.store.playback_status() != status => self.store.rebase_position(now),
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "position update rejected");
        }
    }

    fn update(&self, property: Property, value: impl Into<PropertyValue>) {
        if let Err(e) = self.store.set_property(property, value.into()) {
            warn!(%property, error = %e, "state update rejected");
        }
    }
}
