//! D-Bus side of the bridge: the two MPRIS interfaces served with zbus and
//! the `Transport` used to publish them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use zbus::object_server::SignalEmitter;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedValue, Value};

use crate::error::{BridgeError, Result};

use super::commands::{CommandDispatcher, ControlCmd};
use super::lifecycle::Transport;
use super::metadata::{Metadata, MetadataValue};
use super::properties::PropertyStore;
use super::types::{LoopStatus, MPRIS_PATH, Property, PropertyValue};

/// Errors returned to MPRIS method callers.
#[derive(Debug, zbus::DBusError)]
#[zbus(prefix = "org.mpris.MediaPlayer2.Player.Error")]
pub enum MprisError {
    #[zbus(error)]
    ZBus(zbus::Error),
    NotAllowed(String),
    NotSupported(String),
    InvalidProperty(String),
    ReadOnly(String),
    InvalidValue(String),
    Failed(String),
}

impl From<BridgeError> for MprisError {
    fn from(err: BridgeError) -> Self {
        let message = err.to_string();
        match err {
            BridgeError::OperationNotAllowed { .. } => Self::NotAllowed(message),
            BridgeError::UnsupportedOperation(_) => Self::NotSupported(message),
            BridgeError::UnknownProperty { .. } => Self::InvalidProperty(message),
            BridgeError::ReadOnlyProperty(_) => Self::ReadOnly(message),
            BridgeError::TypeCoercion { .. } | BridgeError::InvalidValue { .. } => {
                Self::InvalidValue(message)
            }
            BridgeError::Bus(e) => Self::ZBus(e),
            _ => Self::Failed(message),
        }
    }
}

/// Property setters go through the standard `Properties.Set` error names.
fn property_error(err: BridgeError) -> zbus::fdo::Error {
    let message = err.to_string();
    match err {
        BridgeError::OperationNotAllowed { .. } => zbus::fdo::Error::AccessDenied(message),
        BridgeError::UnknownProperty { .. } => zbus::fdo::Error::UnknownProperty(message),
        BridgeError::ReadOnlyProperty(_) => zbus::fdo::Error::PropertyReadOnly(message),
        BridgeError::TypeCoercion { .. } | BridgeError::InvalidValue { .. } => {
            zbus::fdo::Error::InvalidArgs(message)
        }
        _ => zbus::fdo::Error::Failed(message),
    }
}

pub struct RootIface {
    store: Arc<PropertyStore>,
    dispatcher: CommandDispatcher,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Raise)?)
    }

    fn quit(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Quit)?)
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        self.store.flag(Property::CanQuit)
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        self.store.flag(Property::CanRaise)
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        self.store.flag(Property::HasTrackList)
    }

    #[zbus(property)]
    fn fullscreen(&self) -> bool {
        self.store.flag(Property::Fullscreen)
    }

    #[zbus(property)]
    fn set_fullscreen(&self, fullscreen: bool) -> zbus::fdo::Result<()> {
        self.dispatcher
            .set_fullscreen(fullscreen)
            .map_err(property_error)
    }

    #[zbus(property)]
    fn can_set_fullscreen(&self) -> bool {
        self.store.flag(Property::CanSetFullscreen)
    }

    #[zbus(property)]
    fn identity(&self) -> String {
        self.store.text(Property::Identity)
    }

    #[zbus(property)]
    fn desktop_entry(&self) -> String {
        self.store.text(Property::DesktopEntry)
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        self.store.list(Property::SupportedUriSchemes)
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        self.store.list(Property::SupportedMimeTypes)
    }
}

pub struct PlayerIface {
    store: Arc<PropertyStore>,
    dispatcher: CommandDispatcher,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Next)?)
    }

    fn previous(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Previous)?)
    }

    fn pause(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Pause)?)
    }

    fn play_pause(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::PlayPause)?)
    }

    fn stop(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Stop)?)
    }

    fn play(&self) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Play)?)
    }

    fn seek(&self, offset: i64) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::Seek(offset))?)
    }

    fn set_position(
        &self,
        track_id: ObjectPath<'_>,
        position: i64,
    ) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.dispatch(ControlCmd::SetPosition {
            track_id: track_id.to_string(),
            position,
        })?)
    }

    fn open_uri(&self, uri: &str) -> std::result::Result<(), MprisError> {
        Ok(self.dispatcher.open_uri(uri)?)
    }

    #[zbus(signal)]
    pub async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn playback_status(&self) -> String {
        self.store.playback_status().as_str().to_string()
    }

    #[zbus(property)]
    fn loop_status(&self) -> String {
        self.store.loop_status().as_str().to_string()
    }

    #[zbus(property)]
    fn set_loop_status(&self, status: String) -> zbus::fdo::Result<()> {
        let status: LoopStatus = status
            .parse()
            .map_err(|()| zbus::fdo::Error::InvalidArgs(format!("unknown LoopStatus '{status}'")))?;
        self.dispatcher
            .set_loop_status(status)
            .map_err(property_error)
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        self.store.double(Property::Rate)
    }

    #[zbus(property)]
    fn set_rate(&self, rate: f64) -> zbus::fdo::Result<()> {
        self.dispatcher.set_rate(rate).map_err(property_error)
    }

    #[zbus(property)]
    fn shuffle(&self) -> bool {
        self.store.flag(Property::Shuffle)
    }

    #[zbus(property)]
    fn set_shuffle(&self, shuffle: bool) -> zbus::fdo::Result<()> {
        self.dispatcher.set_shuffle(shuffle).map_err(property_error)
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        metadata_values(&self.store.metadata())
            .into_iter()
            .filter_map(|(key, value)| OwnedValue::try_from(value).ok().map(|v| (key, v)))
            .collect()
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.store.double(Property::Volume)
    }

    #[zbus(property)]
    fn set_volume(&self, volume: f64) -> zbus::fdo::Result<()> {
        self.dispatcher.set_volume(volume).map_err(property_error)
    }

    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> i64 {
        self.store.position()
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        self.store.double(Property::MinimumRate)
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        self.store.double(Property::MaximumRate)
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        self.store.flag(Property::CanGoNext)
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        self.store.flag(Property::CanGoPrevious)
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        self.store.flag(Property::CanPlay)
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        self.store.flag(Property::CanPause)
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        self.store.flag(Property::CanSeek)
    }

    #[zbus(property(emits_changed_signal = "false"))]
    fn can_control(&self) -> bool {
        self.store.flag(Property::CanControl)
    }
}

/// Serves the MPRIS object on a zbus connection.
#[derive(Clone)]
pub struct ZbusTransport {
    connection: Connection,
    store: Arc<PropertyStore>,
    dispatcher: CommandDispatcher,
}

impl ZbusTransport {
    pub fn new(connection: Connection, store: Arc<PropertyStore>, dispatcher: CommandDispatcher) -> Self {
        Self {
            connection,
            store,
            dispatcher,
        }
    }
}

#[async_trait]
impl Transport for ZbusTransport {
    async fn register_object(&self) -> Result<()> {
        let server = self.connection.object_server();
        server
            .at(
                MPRIS_PATH,
                RootIface {
                    store: self.store.clone(),
                    dispatcher: self.dispatcher.clone(),
                },
            )
            .await?;
        server
            .at(
                MPRIS_PATH,
                PlayerIface {
                    store: self.store.clone(),
                    dispatcher: self.dispatcher.clone(),
                },
            )
            .await?;
        debug!(path = MPRIS_PATH, "MPRIS object served");
        Ok(())
    }

    async fn register_service(&self, name: &str) -> Result<()> {
        self.connection.request_name(name).await?;
        Ok(())
    }

    async fn unregister_service(&self, name: &str) -> Result<()> {
        self.connection.release_name(name).await?;
        Ok(())
    }
}

/// The metadata map as sent over D-Bus. `mpris:trackid` is an object path.
pub fn metadata_values(metadata: &Metadata) -> HashMap<String, Value<'static>> {
    metadata
        .entries()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                _ if key == "mpris:trackid" => {
                    let path = metadata.track_path();
                    match ObjectPath::try_from(path.clone()) {
                        Ok(path) => Value::from(path),
                        Err(_) => Value::from(path),
                    }
                }
                MetadataValue::Text(s) => Value::from(s.to_string()),
                MetadataValue::Int64(i) => Value::from(i),
                MetadataValue::TextList(list) => Value::from(list.to_vec()),
            };
            (key.to_string(), value)
        })
        .collect()
}

pub fn to_dbus_value(value: &PropertyValue) -> Value<'static> {
    match value {
        PropertyValue::Bool(b) => Value::from(*b),
        PropertyValue::Text(s) => Value::from(s.clone()),
        PropertyValue::TextList(list) => Value::from(list.clone()),
        PropertyValue::Double(d) => Value::from(*d),
        PropertyValue::Int64(i) => Value::from(*i),
        PropertyValue::PlaybackStatus(status) => Value::from(status.as_str()),
        PropertyValue::LoopStatus(status) => Value::from(status.as_str()),
        PropertyValue::Metadata(metadata) => Value::from(metadata_values(metadata)),
    }
}
