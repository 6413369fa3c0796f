//! Fixed-schema track metadata.

use zvariant::ObjectPath;

pub const NO_TRACK_PATH: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";
const TRACK_PATH_PREFIX: &str = "/org/mpris/MediaPlayer2/Track/";

/// Track metadata exported through the `Metadata` property.
///
/// Every required key is always present; missing source data shows up as an
/// empty string, an empty list or zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Content id of the current item (`mpris:trackid`).
    pub track_id: String,
    /// Track length in microseconds (`mpris:length`).
    pub length: i64,
    pub art_url: String,
    pub album: String,
    pub artist: Vec<String>,
    pub album_artist: Vec<String>,
    pub title: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue<'a> {
    Text(&'a str),
    Int64(i64),
    TextList(&'a [String]),
}

impl Metadata {
    /// Key/value pairs in export order.
    pub fn entries(&self) -> Vec<(&'static str, MetadataValue<'_>)> {
        let mut entries = vec![
            ("mpris:trackid", MetadataValue::Text(&self.track_id)),
            ("mpris:length", MetadataValue::Int64(self.length)),
            ("mpris:artUrl", MetadataValue::Text(&self.art_url)),
            ("xesam:album", MetadataValue::Text(&self.album)),
            ("xesam:artist", MetadataValue::TextList(&self.artist)),
            ("xesam:albumArtist", MetadataValue::TextList(&self.album_artist)),
            ("xesam:title", MetadataValue::Text(&self.title)),
        ];
        if let Some(url) = &self.url {
            entries.push(("xesam:url", MetadataValue::Text(url)));
        }
        entries
    }

    /// D-Bus object path used for `mpris:trackid`.
    pub fn track_path(&self) -> String {
        track_path(&self.track_id)
    }
}

/// Content ids are opaque strings; MPRIS wants an object path. Valid paths
/// pass through, everything else is flattened under a fixed prefix.
pub fn track_path(content_id: &str) -> String {
    if content_id.is_empty() {
        return NO_TRACK_PATH.to_string();
    }
    if ObjectPath::try_from(content_id).is_ok() {
        return content_id.to_string();
    }
    let element: String = content_id
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() {
                b as char
            } else {
                '_'
            }
        })
        .collect();
    format!("{TRACK_PATH_PREFIX}{element}")
}
