use percent_encoding::percent_decode_str;
use tracing::debug;
use url::Url;

use crate::hass::MediaPlayerAttributes;
use crate::mpris::Metadata;

/// Raw track attributes as reported by the entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackAttributes {
    pub content_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub duration_seconds: Option<f64>,
    /// Image sources in order of preference.
    pub image_candidates: Vec<String>,
}

impl From<&MediaPlayerAttributes> for TrackAttributes {
    fn from(attrs: &MediaPlayerAttributes) -> Self {
        let image_candidates = [
            &attrs.media_image_url,
            &attrs.entity_picture,
            &attrs.entity_picture_local,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();

        Self {
            content_id: attrs.media_content_id.clone(),
            title: attrs.media_title.clone(),
            artist: attrs.media_artist.clone(),
            album: attrs.media_album_name.clone(),
            album_artist: attrs.media_album_artist.clone(),
            duration_seconds: attrs.media_duration,
            image_candidates,
        }
    }
}

/// Builds the MPRIS metadata map from entity attributes.
#[derive(Clone, Debug)]
pub struct MetadataAssembler {
    base_url: Url,
    art_size: Option<u32>,
}

impl MetadataAssembler {
    /// `base_url` is the Home Assistant origin relative art paths are
    /// resolved against.
    pub fn new(base_url: Url, art_size: Option<u32>) -> Self {
        Self { base_url, art_size }
    }

    pub fn assemble(&self, attrs: &TrackAttributes) -> Metadata {
        let track_id = attrs.content_id.clone().unwrap_or_default();
        let url = Url::parse(&track_id).ok().map(String::from);

        Metadata {
            track_id,
            length: attrs.duration_seconds.map(seconds_to_micros).unwrap_or(0),
            art_url: self.resolve_art_url(&attrs.image_candidates),
            album: attrs.album.clone().unwrap_or_default(),
            artist: single(&attrs.artist),
            album_artist: single(&attrs.album_artist),
            title: attrs.title.clone().unwrap_or_default(),
            url,
        }
    }

    /// First candidate that resolves to an absolute http(s) URL, or an
    /// empty string.
    pub fn resolve_art_url(&self, candidates: &[String]) -> String {
        candidates
            .iter()
            .filter(|c| !c.is_empty())
            .find_map(|c| self.resolve_candidate(c))
            .map(String::from)
            .unwrap_or_default()
    }

    fn resolve_candidate(&self, candidate: &str) -> Option<Url> {
        // Home Assistant hands some proxy URLs out encoded twice.
        let decoded = decode(&decode(candidate));

        let url = match Url::parse(&decoded) {
            Ok(url) if is_http(&url) => url,
            _ => {
                let joined = format!(
                    "{}/{}",
                    self.base_url.as_str().trim_end_matches('/'),
                    decoded.trim_start_matches('/')
                );
                match Url::parse(&joined) {
                    Ok(url) if is_http(&url) => url,
                    _ => {
                        debug!(candidate, "art candidate is not an http(s) URL");
                        return None;
                    }
                }
            }
        };

        Some(self.rewrite_size(url))
    }

    /// Replace an existing `size` query parameter with the configured size.
    fn rewrite_size(&self, mut url: Url) -> Url {
        let Some(size) = self.art_size else {
            return url;
        };
        if !url.query_pairs().any(|(key, _)| key == "size") {
            return url;
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if key == "size" {
                    size.to_string()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url
    }
}

/// Seconds to whole microseconds, rounded to nearest. Negative or
/// non-finite durations count as unknown.
pub fn seconds_to_micros(seconds: f64) -> i64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1_000_000.0).round() as i64
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.has_host()
}

fn single(value: &Option<String>) -> Vec<String> {
    value.iter().filter(|s| !s.is_empty()).cloned().collect()
}
