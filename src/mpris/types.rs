//! Property schema for the two MPRIS interfaces.
//!
//! `Property` is the dispatch table: every declared property knows its
//! D-Bus name, the interface it belongs to, its value kind, whether generic
//! `Set` may write it and its startup default.

use std::fmt;
use std::str::FromStr;

use super::metadata::Metadata;

pub const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
pub const MPRIS_NAMESPACE: &str = "org.mpris.MediaPlayer2";

/// The two property groups exported on the MPRIS object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Interface {
    /// `org.mpris.MediaPlayer2`: player identity and static capabilities.
    Root,
    /// `org.mpris.MediaPlayer2.Player`: dynamic playback state.
    Player,
}

impl Interface {
    pub fn dbus_name(self) -> &'static str {
        match self {
            Self::Root => "org.mpris.MediaPlayer2",
            Self::Player => "org.mpris.MediaPlayer2.Player",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dbus_name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Text,
    TextList,
    Double,
    Int64,
    PlaybackStatus,
    LoopStatus,
    Metadata,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Text => "string",
            Self::TextList => "string list",
            Self::Double => "double",
            Self::Int64 => "int64",
            Self::PlaybackStatus => "PlaybackStatus",
            Self::LoopStatus => "LoopStatus",
            Self::Metadata => "metadata map",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    /// Only written through player registration.
    ReadOnly,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Property {
    // org.mpris.MediaPlayer2
    CanQuit,
    CanRaise,
    HasTrackList,
    Fullscreen,
    CanSetFullscreen,
    Identity,
    DesktopEntry,
    SupportedUriSchemes,
    SupportedMimeTypes,
    // org.mpris.MediaPlayer2.Player
    CanPlay,
    CanPause,
    CanGoPrevious,
    CanGoNext,
    CanSeek,
    CanControl,
    PlaybackStatus,
    LoopStatus,
    Rate,
    Shuffle,
    Volume,
    Position,
    MinimumRate,
    MaximumRate,
    Metadata,
}

impl Property {
    /// Every declared property, in export order.
    pub const ALL: [Property; 24] = [
        Self::CanQuit,
        Self::CanRaise,
        Self::HasTrackList,
        Self::Fullscreen,
        Self::CanSetFullscreen,
        Self::Identity,
        Self::DesktopEntry,
        Self::SupportedUriSchemes,
        Self::SupportedMimeTypes,
        Self::CanPlay,
        Self::CanPause,
        Self::CanGoPrevious,
        Self::CanGoNext,
        Self::CanSeek,
        Self::CanControl,
        Self::PlaybackStatus,
        Self::LoopStatus,
        Self::Rate,
        Self::Shuffle,
        Self::Volume,
        Self::Position,
        Self::MinimumRate,
        Self::MaximumRate,
        Self::Metadata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::CanQuit => "CanQuit",
            Self::CanRaise => "CanRaise",
            Self::HasTrackList => "HasTrackList",
            Self::Fullscreen => "Fullscreen",
            Self::CanSetFullscreen => "CanSetFullscreen",
            Self::Identity => "Identity",
            Self::DesktopEntry => "DesktopEntry",
            Self::SupportedUriSchemes => "SupportedUriSchemes",
            Self::SupportedMimeTypes => "SupportedMimeTypes",
            Self::CanPlay => "CanPlay",
            Self::CanPause => "CanPause",
            Self::CanGoPrevious => "CanGoPrevious",
            Self::CanGoNext => "CanGoNext",
            Self::CanSeek => "CanSeek",
            Self::CanControl => "CanControl",
            Self::PlaybackStatus => "PlaybackStatus",
            Self::LoopStatus => "LoopStatus",
            Self::Rate => "Rate",
            Self::Shuffle => "Shuffle",
            Self::Volume => "Volume",
            Self::Position => "Position",
            Self::MinimumRate => "MinimumRate",
            Self::MaximumRate => "MaximumRate",
            Self::Metadata => "Metadata",
        }
    }

    pub fn interface(self) -> Interface {
        match self {
            Self::CanQuit
            | Self::CanRaise
            | Self::HasTrackList
            | Self::Fullscreen
            | Self::CanSetFullscreen
            | Self::Identity
            | Self::DesktopEntry
            | Self::SupportedUriSchemes
            | Self::SupportedMimeTypes => Interface::Root,
            _ => Interface::Player,
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Self::Identity | Self::DesktopEntry => ValueKind::Text,
            Self::SupportedUriSchemes | Self::SupportedMimeTypes => ValueKind::TextList,
            Self::PlaybackStatus => ValueKind::PlaybackStatus,
            Self::LoopStatus => ValueKind::LoopStatus,
            Self::Rate | Self::Volume | Self::MinimumRate | Self::MaximumRate => ValueKind::Double,
            Self::Position => ValueKind::Int64,
            Self::Metadata => ValueKind::Metadata,
            _ => ValueKind::Bool,
        }
    }

    pub fn access(self) -> Access {
        match self {
            Self::Identity | Self::DesktopEntry => Access::ReadOnly,
            _ => Access::ReadWrite,
        }
    }

    /// Value the property holds when the store is created.
    pub fn default_value(self) -> PropertyValue {
        match self.kind() {
            ValueKind::Bool => PropertyValue::Bool(false),
            ValueKind::Text => PropertyValue::Text(String::new()),
            ValueKind::TextList => PropertyValue::TextList(Vec::new()),
            ValueKind::Double => match self {
                Self::Volume => PropertyValue::Double(0.0),
                _ => PropertyValue::Double(1.0),
            },
            ValueKind::Int64 => PropertyValue::Int64(0),
            ValueKind::PlaybackStatus => PropertyValue::PlaybackStatus(PlaybackStatus::Stopped),
            ValueKind::LoopStatus => PropertyValue::LoopStatus(LoopStatus::None),
            ValueKind::Metadata => PropertyValue::Metadata(Metadata::default()),
        }
    }

    /// Exact, case-sensitive lookup of `name` within `interface`.
    pub fn lookup(interface: Interface, name: &str) -> Option<Property> {
        Self::ALL
            .into_iter()
            .find(|p| p.interface() == interface && p.name() == name)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }
}

impl FromStr for PlaybackStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Playing" => Ok(Self::Playing),
            "Paused" => Ok(Self::Paused),
            "Stopped" => Ok(Self::Stopped),
            _ => Err(()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LoopStatus {
    #[default]
    None,
    Track,
    Playlist,
}

impl LoopStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Track => "Track",
            Self::Playlist => "Playlist",
        }
    }

    /// Map a Home Assistant repeat mode (`off`, `one`, `all`, any case).
    /// Anything unrecognized counts as `off`.
    pub fn from_repeat(repeat: &str) -> Self {
        match repeat.to_ascii_lowercase().as_str() {
            "one" => Self::Track,
            "all" => Self::Playlist,
            _ => Self::None,
        }
    }

    pub fn as_repeat(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::Track => "one",
            Self::Playlist => "all",
        }
    }
}

impl FromStr for LoopStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Track" => Ok(Self::Track),
            "Playlist" => Ok(Self::Playlist),
            _ => Err(()),
        }
    }
}

/// A property value as held by the store.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Text(String),
    TextList(Vec<String>),
    Double(f64),
    Int64(i64),
    PlaybackStatus(PlaybackStatus),
    LoopStatus(LoopStatus),
    Metadata(Metadata),
}

impl PropertyValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => ValueKind::Bool.name(),
            Self::Text(_) => ValueKind::Text.name(),
            Self::TextList(_) => ValueKind::TextList.name(),
            Self::Double(_) => ValueKind::Double.name(),
            Self::Int64(_) => ValueKind::Int64.name(),
            Self::PlaybackStatus(_) => ValueKind::PlaybackStatus.name(),
            Self::LoopStatus(_) => ValueKind::LoopStatus.name(),
            Self::Metadata(_) => ValueKind::Metadata.name(),
        }
    }

    pub fn matches(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (Self::Bool(_), ValueKind::Bool)
                | (Self::Text(_), ValueKind::Text)
                | (Self::TextList(_), ValueKind::TextList)
                | (Self::Double(_), ValueKind::Double)
                | (Self::Int64(_), ValueKind::Int64)
                | (Self::PlaybackStatus(_), ValueKind::PlaybackStatus)
                | (Self::LoopStatus(_), ValueKind::LoopStatus)
                | (Self::Metadata(_), ValueKind::Metadata)
        )
    }

    /// Convert into `kind`, or give the value back untouched when the two
    /// types are incompatible.
    pub fn coerce(self, kind: ValueKind) -> Result<Self, Self> {
        if self.matches(kind) {
            return Ok(self);
        }
        match (self, kind) {
            (Self::Int64(i), ValueKind::Double) => Ok(Self::Double(i as f64)),
            (Self::Double(d), ValueKind::Int64)
                if d.fract() == 0.0 && d >= i64::MIN as f64 && d <= i64::MAX as f64 =>
            {
                Ok(Self::Int64(d as i64))
            }
            (Self::Text(s), ValueKind::TextList) => Ok(Self::TextList(vec![s])),
            (Self::Text(s), ValueKind::PlaybackStatus) => match s.parse() {
                Ok(status) => Ok(Self::PlaybackStatus(status)),
                Err(()) => Err(Self::Text(s)),
            },
            (Self::Text(s), ValueKind::LoopStatus) => match s.parse() {
                Ok(status) => Ok(Self::LoopStatus(status)),
                Err(()) => Err(Self::Text(s)),
            },
            (other, _) => Err(other),
        }
    }

    /// External representation: enums are reported by name.
    pub fn external(self) -> Self {
        match self {
            Self::PlaybackStatus(s) => Self::Text(s.as_str().to_string()),
            Self::LoopStatus(l) => Self::Text(l.as_str().to_string()),
            other => other,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::PlaybackStatus(s) => Some(s.as_str()),
            Self::LoopStatus(l) => Some(l.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(l) => Some(l),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextList(v)
    }
}

impl From<PlaybackStatus> for PropertyValue {
    fn from(v: PlaybackStatus) -> Self {
        Self::PlaybackStatus(v)
    }
}

impl From<LoopStatus> for PropertyValue {
    fn from(v: LoopStatus) -> Self {
        Self::LoopStatus(v)
    }
}

impl From<Metadata> for PropertyValue {
    fn from(v: Metadata) -> Self {
        Self::Metadata(v)
    }
}

/// Emitted by the store after a value actually changed.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub property: Property,
    pub value: PropertyValue,
}
