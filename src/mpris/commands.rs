//! Capability-gated command dispatch.
//!
//! Inbound MPRIS calls are checked against the capability flags held in the
//! property store and, when allowed, turned into `ControlCmd` messages on a
//! single-consumer channel. Dispatch never waits for the command to be
//! carried out.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::error::{BridgeError, Result};

use super::properties::PropertyStore;
use super::types::{LoopStatus, Property, PropertyValue};

/// Abstract player commands, carried to the Home Assistant side.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    /// Relative seek, in microseconds.
    Seek(i64),
    /// Absolute seek within the given track, in microseconds.
    SetPosition { track_id: String, position: i64 },
    Raise,
    Quit,
    SetVolume(f64),
    SetShuffle(bool),
    SetLoopStatus(LoopStatus),
}

impl ControlCmd {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Pause => "Pause",
            Self::PlayPause => "PlayPause",
            Self::Stop => "Stop",
            Self::Next => "Next",
            Self::Previous => "Previous",
            Self::Seek(_) => "Seek",
            Self::SetPosition { .. } => "SetPosition",
            Self::Raise => "Raise",
            Self::Quit => "Quit",
            Self::SetVolume(_) => "Volume",
            Self::SetShuffle(_) => "Shuffle",
            Self::SetLoopStatus(_) => "LoopStatus",
        }
    }

    /// Flags that must all be true for the command to be accepted, checked
    /// in order.
    pub fn required_flags(&self) -> &'static [Property] {
        match self {
            Self::Play => &[Property::CanControl, Property::CanPlay],
            Self::Pause | Self::PlayPause => &[Property::CanControl, Property::CanPause],
            Self::Stop => &[Property::CanControl],
            Self::Next => &[Property::CanControl, Property::CanGoNext],
            Self::Previous => &[Property::CanControl, Property::CanGoPrevious],
            Self::Seek(_) | Self::SetPosition { .. } => &[Property::CanControl, Property::CanSeek],
            Self::Raise => &[Property::CanRaise],
            Self::Quit => &[Property::CanQuit],
            Self::SetVolume(_) | Self::SetShuffle(_) | Self::SetLoopStatus(_) => {
                &[Property::CanControl]
            }
        }
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    store: Arc<PropertyStore>,
    tx: UnboundedSender<ControlCmd>,
}

impl CommandDispatcher {
    pub fn new(store: Arc<PropertyStore>, tx: UnboundedSender<ControlCmd>) -> Self {
        Self { store, tx }
    }

    /// Check the capability flags for `cmd` and emit it.
    pub fn dispatch(&self, cmd: ControlCmd) -> Result<()> {
        self.check(&cmd)?;
        self.emit(cmd);
        Ok(())
    }

    /// `OpenUri` is never supported.
    pub fn open_uri(&self, uri: &str) -> Result<()> {
        warn!(uri, "rejected OpenUri");
        Err(BridgeError::UnsupportedOperation("OpenUri"))
    }

    /// Write `Volume` locally and forward it to the device.
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        if !volume.is_finite() {
            return Err(BridgeError::InvalidValue {
                command: "Volume",
                reason: format!("{volume} is not a finite number"),
            });
        }
        self.write_through(ControlCmd::SetVolume(volume), Property::Volume, volume.into())
    }

    pub fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        self.write_through(ControlCmd::SetShuffle(shuffle), Property::Shuffle, shuffle.into())
    }

    pub fn set_loop_status(&self, status: LoopStatus) -> Result<()> {
        self.write_through(
            ControlCmd::SetLoopStatus(status),
            Property::LoopStatus,
            status.into(),
        )
    }

    /// The remote device has no rate control: only the current rate is
    /// accepted.
    pub fn set_rate(&self, rate: f64) -> Result<()> {
        let current = self.store.double(Property::Rate);
        if rate == current {
            return Ok(());
        }
        warn!(rate, "rejected Rate change");
        Err(BridgeError::InvalidValue {
            command: "Rate",
            reason: format!("only {current} is supported"),
        })
    }

    pub fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
        if !self.store.flag(Property::CanSetFullscreen) {
            return Err(not_allowed("Fullscreen", Property::CanSetFullscreen));
        }
        self.store
            .set_property(Property::Fullscreen, fullscreen.into())
            .map(|_| ())
    }

    fn write_through(
        &self,
        cmd: ControlCmd,
        property: Property,
        value: PropertyValue,
    ) -> Result<()> {
        self.check(&cmd)?;
        self.store.set_property(property, value)?;
        self.emit(cmd);
        Ok(())
    }

    fn check(&self, cmd: &ControlCmd) -> Result<()> {
        for &flag in cmd.required_flags() {
            if !self.store.flag(flag) {
                return Err(not_allowed(cmd.name(), flag));
            }
        }
        Ok(())
    }

    fn emit(&self, cmd: ControlCmd) {
        debug!(command = cmd.name(), "dispatching");
        if self.tx.send(cmd).is_err() {
            error!("command channel closed, dropping command");
        }
    }
}

fn not_allowed(command: &'static str, flag: Property) -> BridgeError {
    warn!(command, %flag, "operation not allowed");
    BridgeError::OperationNotAllowed { command, flag }
}
