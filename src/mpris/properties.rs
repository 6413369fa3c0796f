//! In-memory property store for both MPRIS interfaces.
//!
//! Writers are serialized by the write lock; readers take consistent
//! snapshots. A successful write that changes a value is broadcast to every
//! subscriber, a write of the current value is silent.
//!
//! `Position` is a sample: while playing, readers extrapolate it from the
//! time it was taken. Only a jump away from that extrapolation is reported
//! on the seek channel.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::error::{BridgeError, Result};

use super::metadata::Metadata;
use super::types::{
    Access, Interface, LoopStatus, PlaybackStatus, Property, PropertyChange, PropertyValue,
};

const CHANGE_CHANNEL_CAPACITY: usize = 128;

/// Drift between a reported and an extrapolated position still counted as
/// normal progress, in microseconds.
pub const SEEK_TOLERANCE: i64 = 1_500_000;

pub struct PropertyStore {
    values: RwLock<HashMap<Property, PropertyValue>>,
    /// When the stored `Position` was sampled.
    position_sampled_at: RwLock<Option<DateTime<Utc>>>,
    changes: broadcast::Sender<PropertyChange>,
    seeks: broadcast::Sender<i64>,
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyStore {
    /// Create a store holding the default value of every declared property.
    pub fn new() -> Self {
        let values = Property::ALL
            .into_iter()
            .map(|p| (p, p.default_value()))
            .collect();
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (seeks, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(values),
            position_sampled_at: RwLock::new(None),
            changes,
            seeks,
        }
    }

    /// Receive `(property, value)` for every effective change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PropertyChange> {
        self.changes.subscribe()
    }

    /// Receive the new position, in microseconds, after every jump.
    pub fn subscribe_seeks(&self) -> broadcast::Receiver<i64> {
        self.seeks.subscribe()
    }

    /// Generic read by D-Bus name. Enum values come back as their name.
    pub fn get(&self, interface: Interface, name: &str) -> Result<PropertyValue> {
        let property = resolve(interface, name)?;
        Ok(self.value(property).external())
    }

    /// Generic write by D-Bus name.
    ///
    /// Returns whether the stored value changed.
    pub fn set(&self, interface: Interface, name: &str, value: PropertyValue) -> Result<bool> {
        let property = resolve(interface, name)?;
        self.set_property(property, value)
    }

    /// Point-in-time copy of one interface, in declaration order.
    pub fn get_all(&self, interface: Interface) -> Vec<(&'static str, PropertyValue)> {
        let values = self.read();
        Property::ALL
            .into_iter()
            .filter(|p| p.interface() == interface)
            .filter_map(|p| values.get(&p).map(|v| (p.name(), v.clone().external())))
            .collect()
    }

    /// Typed write. Rejects read-only properties and values that cannot be
    /// coerced; nothing is stored in either case.
    pub fn set_property(&self, property: Property, value: PropertyValue) -> Result<bool> {
        if property.access() == Access::ReadOnly {
            error!(%property, "attempted write to read-only property");
            return Err(BridgeError::ReadOnlyProperty(property));
        }
        let changed = self.store(property, value)?;
        if property == Property::Position {
            *write_lock(&self.position_sampled_at) = Some(Utc::now());
        }
        Ok(changed)
    }

    /// Identity fields are only written here, when the player registers.
    pub fn register_identity(&self, identity: &str, desktop_entry: &str) -> Result<()> {
        self.store(Property::Identity, PropertyValue::from(identity))?;
        self.store(Property::DesktopEntry, PropertyValue::from(desktop_entry))?;
        Ok(())
    }

    /// Position at `now`: the last sample, advanced by the elapsed time
    /// times `Rate` while playing.
    pub fn position_at(&self, now: DateTime<Utc>) -> i64 {
        let sampled = self.int64(Property::Position);
        if self.playback_status() != PlaybackStatus::Playing {
            return sampled;
        }
        let Some(sampled_at) = *read_lock(&self.position_sampled_at) else {
            return sampled;
        };
        let elapsed = (now - sampled_at).num_microseconds().unwrap_or(0).max(0);
        let advanced = (elapsed as f64 * self.double(Property::Rate)) as i64;
        sampled.saturating_add(advanced).max(0)
    }

    pub fn position(&self) -> i64 {
        self.position_at(Utc::now())
    }

    /// Record a position reported at `sampled_at`.
    ///
    /// Returns whether it is a jump, i.e. further than `SEEK_TOLERANCE` from
    /// where playback was expected to be. Jumps go out on the seek channel.
    pub fn sync_position(&self, position: i64, sampled_at: DateTime<Utc>) -> Result<bool> {
        let expected = self.position_at(sampled_at);
        self.store(Property::Position, position.into())?;
        *write_lock(&self.position_sampled_at) = Some(sampled_at);

        let jumped = position.abs_diff(expected) > SEEK_TOLERANCE.unsigned_abs();
        if jumped {
            debug!(position, expected, "position jumped");
            let _ = self.seeks.send(position);
        }
        Ok(jumped)
    }

    /// Fold the time played so far into the stored sample, e.g. before the
    /// playback status changes.
    pub fn rebase_position(&self, now: DateTime<Utc>) -> Result<()> {
        let position = self.position_at(now);
        self.store(Property::Position, position.into())?;
        *write_lock(&self.position_sampled_at) = Some(now);
        Ok(())
    }

    /// Raw stored value, enums kept typed.
    pub fn value(&self, property: Property) -> PropertyValue {
        self.read()
            .get(&property)
            .cloned()
            .unwrap_or_else(|| property.default_value())
    }

    pub fn flag(&self, property: Property) -> bool {
        self.value(property).as_bool().unwrap_or(false)
    }

    pub fn double(&self, property: Property) -> f64 {
        self.value(property).as_f64().unwrap_or_default()
    }

    pub fn int64(&self, property: Property) -> i64 {
        self.value(property).as_i64().unwrap_or_default()
    }

    pub fn text(&self, property: Property) -> String {
        self.value(property)
            .as_str()
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub fn list(&self, property: Property) -> Vec<String> {
        self.value(property)
            .as_list()
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        match self.value(Property::PlaybackStatus) {
            PropertyValue::PlaybackStatus(status) => status,
            _ => PlaybackStatus::default(),
        }
    }

    pub fn loop_status(&self) -> LoopStatus {
        match self.value(Property::LoopStatus) {
            PropertyValue::LoopStatus(status) => status,
            _ => LoopStatus::default(),
        }
    }

    pub fn metadata(&self) -> Metadata {
        match self.value(Property::Metadata) {
            PropertyValue::Metadata(metadata) => metadata,
            _ => Metadata::default(),
        }
    }

    fn store(&self, property: Property, value: PropertyValue) -> Result<bool> {
        let kind = property.kind();
        let mut value = value.coerce(kind).map_err(|rejected| {
            error!(
                %property,
                expected = kind.name(),
                found = rejected.kind_name(),
                "type coercion failed"
            );
            BridgeError::TypeCoercion {
                property,
                expected: kind.name(),
                found: rejected.kind_name(),
            }
        })?;

        if let PropertyValue::Double(v) = &mut value {
            if property == Property::Volume {
                *v = clamp_volume(*v);
            }
            if !v.is_finite() {
                error!(%property, value = *v, "non-finite value rejected");
                return Err(BridgeError::InvalidValue {
                    command: property.name(),
                    reason: format!("{v} is not a finite number"),
                });
            }
        }

        let mut values = self.write();
        if values.get(&property) == Some(&value) {
            return Ok(false);
        }
        debug!(%property, ?value, "property changed");
        values.insert(property, value.clone());
        // Sent under the lock so subscribers see changes in write order.
        let _ = self.changes.send(PropertyChange { property, value });
        Ok(true)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Property, PropertyValue>> {
        read_lock(&self.values)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Property, PropertyValue>> {
        write_lock(&self.values)
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn resolve(interface: Interface, name: &str) -> Result<Property> {
    Property::lookup(interface, name).ok_or_else(|| {
        error!(%interface, name, "unknown property");
        BridgeError::UnknownProperty {
            interface: interface.dbus_name(),
            name: name.to_string(),
        }
    })
}

/// Negative and NaN volumes are stored as 0. Infinite ones are rejected by
/// the store.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() { 0.0 } else { volume.max(0.0) }
}
