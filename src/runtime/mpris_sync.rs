use std::collections::HashMap;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use zbus::Connection;
use zbus::object_server::SignalEmitter;

use crate::mpris::{MPRIS_PATH, PlayerIface, Property, PropertyChange, to_dbus_value};

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Turn property store changes into `PropertiesChanged` and position jumps
/// into `Seeked` until the store is gone.
pub async fn forward_changes(
    connection: Connection,
    mut changes: broadcast::Receiver<PropertyChange>,
    mut seeks: broadcast::Receiver<i64>,
) {
    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => {
                    if let Err(e) = emit(&connection, &change).await {
                        warn!(property = %change.property, error = %e, "failed to emit signal");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "signal forwarder fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            seek = seeks.recv() => match seek {
                Ok(position) => {
                    if let Err(e) = emit_seeked(&connection, position).await {
                        warn!(position, error = %e, "failed to emit Seeked");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "seek forwarder fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    info!("property store closed, signal forwarder stopping");
}

async fn emit_seeked(connection: &Connection, position: i64) -> zbus::Result<()> {
    debug!(position, "Seeked");
    let emitter = SignalEmitter::new(connection, MPRIS_PATH)?;
    PlayerIface::seeked(&emitter, position).await
}

async fn emit(connection: &Connection, change: &PropertyChange) -> zbus::Result<()> {
    match change.property {
        // Not signalled: clients re-read CanControl and extrapolate Position.
        Property::CanControl | Property::Position => Ok(()),
        property => {
            debug!(%property, "PropertiesChanged");
            let mut changed = HashMap::new();
            changed.insert(property.name(), to_dbus_value(&change.value));
            connection
                .emit_signal(
                    None::<&str>,
                    MPRIS_PATH,
                    PROPERTIES_INTERFACE,
                    "PropertiesChanged",
                    &(property.interface().dbus_name(), changed, Vec::<&str>::new()),
                )
                .await
        }
    }
}
