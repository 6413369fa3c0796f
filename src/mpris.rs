//! MPRIS property/command surface.
//!
//! The `PropertyStore` holds the state of both MPRIS interfaces, the
//! `CommandDispatcher` gates inbound calls on the capability flags and the
//! `ServiceLifecycleManager` publishes or withdraws the bus name. `server`
//! adapts all of it to zbus.

mod commands;
mod lifecycle;
mod metadata;
mod properties;
mod server;
mod types;

pub use commands::{CommandDispatcher, ControlCmd};
pub use lifecycle::{ServiceLifecycleManager, Transport, service_name};
pub use metadata::{Metadata, MetadataValue, NO_TRACK_PATH, track_path};
pub use properties::{PropertyStore, clamp_volume};
pub use server::{MprisError, PlayerIface, RootIface, ZbusTransport, metadata_values, to_dbus_value};
pub use types::*;
