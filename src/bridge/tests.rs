use super::*;
use crate::error::Result;
use crate::hass::{EntityState, MediaPlayerAttributes, StateChange};
use crate::mpris::{
    ControlCmd, LoopStatus, Metadata, PlaybackStatus, Property, PropertyStore,
    ServiceLifecycleManager, Transport,
};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use url::Url;

#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for Arc<RecordingTransport> {
    async fn register_object(&self) -> Result<()> {
        self.calls.lock().unwrap().push("object".to_string());
        Ok(())
    }

    async fn register_service(&self, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("register {name}"));
        Ok(())
    }

    async fn unregister_service(&self, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("unregister {name}"));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingCaller {
    calls: Mutex<Vec<(String, String, Value)>>,
}

#[async_trait]
impl ServiceCaller for Arc<RecordingCaller> {
    async fn call_service(
        &self,
        _domain: &str,
        service: &str,
        entity_id: &str,
        data: Value,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((service.to_string(), entity_id.to_string(), data));
        Ok(())
    }
}

fn assembler(art_size: Option<u32>) -> MetadataAssembler {
    MetadataAssembler::new(Url::parse("http://host:8123").unwrap(), art_size)
}

async fn mapper() -> (
    Arc<PropertyStore>,
    Arc<RecordingTransport>,
    StateMapper<Arc<RecordingTransport>>,
) {
    let store = Arc::new(PropertyStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let lifecycle = ServiceLifecycleManager::new(transport.clone(), store.clone());
    let mut mapper = StateMapper::new(store.clone(), lifecycle, assembler(None));
    mapper
        .register_player("Living Room", "hass-mpris", true)
        .await
        .unwrap();
    (store, transport, mapper)
}

fn entity(state: &str, attributes: MediaPlayerAttributes) -> EntityState {
    EntityState {
        entity_id: "media_player.living_room".to_string(),
        state: state.to_string(),
        attributes,
    }
}

const CAPABILITIES: [Property; 5] = [
    Property::CanPlay,
    Property::CanPause,
    Property::CanQuit,
    Property::CanGoNext,
    Property::CanGoPrevious,
];

#[test]
fn duration_converts_to_rounded_microseconds() {
    assert_eq!(seconds_to_micros(125.4), 125_400_000);
    assert_eq!(seconds_to_micros(1.0000004), 1_000_000);
    assert_eq!(seconds_to_micros(-3.0), 0);
    assert_eq!(seconds_to_micros(f64::NAN), 0);
}

#[test]
fn relative_art_url_resolves_against_base_and_rewrites_size() {
    let art = assembler(Some(250)).resolve_art_url(&["/local/image.png?size=100".to_string()]);
    assert_eq!(art, "http://host:8123/local/image.png?size=250");
}

#[test]
fn art_size_is_only_rewritten_when_present() {
    let art = assembler(Some(250))
        .resolve_art_url(&["/api/media_player_proxy/media_player.tv?token=abc".to_string()]);
    assert_eq!(art, "http://host:8123/api/media_player_proxy/media_player.tv?token=abc");
}

#[test]
fn absolute_art_url_is_double_decoded() {
    let art = assembler(None)
        .resolve_art_url(&["https%253A%252F%252Fcdn.example.com%252Fcover.jpg".to_string()]);
    assert_eq!(art, "https://cdn.example.com/cover.jpg");
}

#[test]
fn art_url_skips_empty_candidates_and_falls_back_to_empty() {
    let a = assembler(None);
    let art = a.resolve_art_url(&["".to_string(), "/local/b.png".to_string()]);
    assert_eq!(art, "http://host:8123/local/b.png");
    assert_eq!(a.resolve_art_url(&[]), "");
}

#[test]
fn assemble_wraps_artists_and_defaults_missing_fields() {
    let metadata = assembler(None).assemble(&TrackAttributes {
        content_id: Some("spotify:track:1".to_string()),
        title: Some("Song".to_string()),
        artist: Some("Artist".to_string()),
        duration_seconds: Some(125.4),
        ..TrackAttributes::default()
    });
    assert_eq!(metadata.track_id, "spotify:track:1");
    assert_eq!(metadata.title, "Song");
    assert_eq!(metadata.artist, vec!["Artist".to_string()]);
    assert!(metadata.album_artist.is_empty());
    assert_eq!(metadata.album, "");
    assert_eq!(metadata.art_url, "");
    assert_eq!(metadata.length, 125_400_000);

    assert_eq!(assembler(None).assemble(&TrackAttributes::default()), Metadata::default());
}

#[test]
fn track_attributes_keep_image_preference_order() {
    let attrs = MediaPlayerAttributes {
        entity_picture: Some("/b".to_string()),
        media_image_url: Some("/a".to_string()),
        ..MediaPlayerAttributes::default()
    };
    assert_eq!(
        TrackAttributes::from(&attrs).image_candidates,
        vec!["/a".to_string(), "/b".to_string()]
    );
}

#[test]
fn external_states_parse_strictly() {
    assert_eq!(ExternalState::parse("idle").unwrap(), ExternalState::Stopped);
    assert_eq!(ExternalState::parse("off").unwrap(), ExternalState::Disabled);
    assert!(ExternalState::parse("Playing").is_err());
}

#[tokio::test]
async fn playing_enables_controls_and_registers() {
    let (store, transport, mut mapper) = mapper().await;

    mapper
        .apply_state("playing", &MediaPlayerAttributes::default())
        .await
        .unwrap();

    assert_eq!(store.playback_status(), PlaybackStatus::Playing);
    for flag in CAPABILITIES {
        assert!(store.flag(flag), "{flag} should be true");
    }
    assert!(mapper.lifecycle().is_registered());
    assert_eq!(
        transport.calls.lock().unwrap().last().map(String::as_str),
        Some("register org.mpris.MediaPlayer2.hass-mpris")
    );
}

#[tokio::test]
async fn off_disables_controls_and_unregisters() {
    let (store, transport, mut mapper) = mapper().await;
    let attrs = MediaPlayerAttributes {
        supported_features: Some(SUPPORT_SEEK),
        ..MediaPlayerAttributes::default()
    };

    mapper.apply_state("paused", &attrs).await.unwrap();
    assert!(store.flag(Property::CanSeek));

    mapper.apply_state("off", &attrs).await.unwrap();
    assert_eq!(store.playback_status(), PlaybackStatus::Stopped);
    for flag in CAPABILITIES {
        assert!(!store.flag(flag), "{flag} should be false");
    }
    assert!(!store.flag(Property::CanSeek));
    assert!(!mapper.lifecycle().is_registered());
    assert_eq!(
        transport.calls.lock().unwrap().last().map(String::as_str),
        Some("unregister org.mpris.MediaPlayer2.hass-mpris")
    );
}

#[tokio::test]
async fn unknown_state_is_treated_as_off() {
    let (store, _transport, mut mapper) = mapper().await;
    mapper
        .apply_state("idle", &MediaPlayerAttributes::default())
        .await
        .unwrap();
    assert!(store.flag(Property::CanPlay));

    mapper
        .apply_state("unavailable", &MediaPlayerAttributes::default())
        .await
        .unwrap();
    assert!(!store.flag(Property::CanPlay));
    assert!(!mapper.lifecycle().is_registered());
}

#[tokio::test]
async fn attributes_propagate_regardless_of_state() {
    let (store, _transport, mut mapper) = mapper().await;
    let attrs = MediaPlayerAttributes {
        shuffle: Some(true),
        repeat: Some("ONE".to_string()),
        volume_level: Some(-0.5),
        media_position: Some(12.5),
        ..MediaPlayerAttributes::default()
    };

    mapper.apply_state("off", &attrs).await.unwrap();

    assert!(store.flag(Property::Shuffle));
    assert_eq!(store.loop_status(), LoopStatus::Track);
    assert_eq!(store.double(Property::Volume), 0.0);
    assert_eq!(store.int64(Property::Position), 12_500_000);

    let attrs = MediaPlayerAttributes {
        repeat: Some("random_mode".to_string()),
        ..MediaPlayerAttributes::default()
    };
    mapper.apply_state("playing", &attrs).await.unwrap();
    assert_eq!(store.loop_status(), LoopStatus::None);
}

#[tokio::test]
async fn seek_is_relative_to_extrapolated_position() {
    let (store, _transport, mut mapper) = mapper().await;
    let attrs = MediaPlayerAttributes {
        media_position: Some(0.0),
        media_position_updated_at: Some(Utc::now() - TimeDelta::seconds(60)),
        ..MediaPlayerAttributes::default()
    };
    mapper.apply_state("playing", &attrs).await.unwrap();

    assert_eq!(store.int64(Property::Position), 0);
    assert!(store.position() >= 60_000_000);

    let request = plan(&ControlCmd::Seek(10_000_000), &store).unwrap();
    let target = request.data["seek_position"].as_f64().unwrap();
    assert!((70.0..75.0).contains(&target), "seek_position {target}");
}

#[tokio::test]
async fn resuming_playback_is_not_a_seek() {
    let (store, _transport, mut mapper) = mapper().await;
    let t0 = Utc::now() - TimeDelta::seconds(120);
    let paused = MediaPlayerAttributes {
        media_position: Some(30.0),
        media_position_updated_at: Some(t0),
        ..MediaPlayerAttributes::default()
    };
    mapper.apply_state("paused", &paused).await.unwrap();
    let mut seeks = store.subscribe_seeks();

    let resumed = MediaPlayerAttributes {
        media_position: Some(30.0),
        media_position_updated_at: Some(t0 + TimeDelta::seconds(90)),
        ..MediaPlayerAttributes::default()
    };
    mapper.apply_state("playing", &resumed).await.unwrap();
    assert!(seeks.try_recv().is_err());

    let skipped = MediaPlayerAttributes {
        media_position: Some(100.0),
        media_position_updated_at: Some(t0 + TimeDelta::seconds(95)),
        ..MediaPlayerAttributes::default()
    };
    mapper.apply_state("playing", &skipped).await.unwrap();
    assert_eq!(seeks.try_recv().unwrap(), 100_000_000);
}

#[tokio::test]
async fn pausing_without_position_keeps_played_time() {
    let (store, _transport, mut mapper) = mapper().await;
    let attrs = MediaPlayerAttributes {
        media_position: Some(0.0),
        media_position_updated_at: Some(Utc::now() - TimeDelta::seconds(10)),
        ..MediaPlayerAttributes::default()
    };
    mapper.apply_state("playing", &attrs).await.unwrap();

    mapper
        .apply_state("paused", &MediaPlayerAttributes::default())
        .await
        .unwrap();
    let frozen = store.position();
    assert!((10_000_000..15_000_000).contains(&frozen), "position {frozen}");
    assert_eq!(store.position(), frozen);
}

#[tokio::test]
async fn numeric_content_id_drives_metadata() {
    let (store, _transport, mut mapper) = mapper().await;
    let state: EntityState = serde_json::from_value(json!({
        "entity_id": "media_player.living_room",
        "state": "playing",
        "attributes": { "media_content_id": 1234, "media_title": "Episode" }
    }))
    .unwrap();

    mapper.apply_snapshot(&state).await.unwrap();
    assert_eq!(store.metadata().track_id, "1234");
    assert_eq!(store.metadata().title, "Episode");
}

#[tokio::test]
async fn metadata_is_replaced_only_when_content_changes() {
    let (store, _transport, mut mapper) = mapper().await;
    let mut attrs = MediaPlayerAttributes {
        media_content_id: Some("track-1".to_string()),
        media_title: Some("First".to_string()),
        ..MediaPlayerAttributes::default()
    };
    mapper.apply(&entity("playing", attrs.clone())).await.unwrap();
    assert_eq!(store.metadata().title, "First");

    let mut rx = store.subscribe();
    attrs.media_title = Some("Renamed".to_string());
    mapper.apply(&entity("playing", attrs.clone())).await.unwrap();
    assert_eq!(store.metadata().title, "First");
    assert!(rx.try_recv().is_err());

    mapper.apply_snapshot(&entity("playing", attrs.clone())).await.unwrap();
    assert_eq!(store.metadata().title, "Renamed");

    attrs.media_content_id = Some("track-2".to_string());
    attrs.media_title = Some("Second".to_string());
    mapper.apply(&entity("playing", attrs)).await.unwrap();
    assert_eq!(store.metadata().title, "Second");
}

#[tokio::test]
async fn removed_entity_keeps_last_state() {
    let (store, _transport, mut mapper) = mapper().await;
    mapper
        .apply(&entity("playing", MediaPlayerAttributes::default()))
        .await
        .unwrap();

    let change = StateChange {
        entity_id: "media_player.living_room".to_string(),
        old_state: None,
        new_state: None,
    };
    mapper.apply_change(&change).await.unwrap();

    assert_eq!(store.playback_status(), PlaybackStatus::Playing);
    assert!(mapper.lifecycle().is_registered());
}

#[test]
fn plan_skips_redundant_transport_commands() {
    let store = PropertyStore::new();
    assert_eq!(plan(&ControlCmd::Stop, &store), None);
    assert_eq!(plan(&ControlCmd::Play, &store).unwrap().service, "media_play");

    store
        .set_property(Property::PlaybackStatus, PlaybackStatus::Playing.into())
        .unwrap();
    assert_eq!(plan(&ControlCmd::Play, &store), None);
    assert_eq!(plan(&ControlCmd::Pause, &store).unwrap().service, "media_pause");
    assert_eq!(plan(&ControlCmd::Stop, &store).unwrap().service, "media_stop");
    assert_eq!(plan(&ControlCmd::Raise, &store), None);
}

#[test]
fn plan_seek_is_relative_to_position_and_never_negative() {
    let store = PropertyStore::new();
    store.set_property(Property::Position, 10_000_000i64.into()).unwrap();

    let request = plan(&ControlCmd::Seek(5_500_000), &store).unwrap();
    assert_eq!(request.service, "media_seek");
    assert_eq!(request.data, json!({ "seek_position": 15.5 }));

    let request = plan(&ControlCmd::Seek(-60_000_000), &store).unwrap();
    assert_eq!(request.data, json!({ "seek_position": 0.0 }));
}

#[test]
fn plan_set_position_ignores_stale_tracks() {
    let store = PropertyStore::new();
    store
        .set_property(
            Property::Metadata,
            Metadata {
                track_id: "spotify:track:1".to_string(),
                ..Metadata::default()
            }
            .into(),
        )
        .unwrap();
    let current = "/org/mpris/MediaPlayer2/Track/spotify_track_1".to_string();

    let stale = ControlCmd::SetPosition {
        track_id: "/org/mpris/MediaPlayer2/Track/other".to_string(),
        position: 1_000_000,
    };
    assert_eq!(plan(&stale, &store), None);

    let negative = ControlCmd::SetPosition {
        track_id: current.clone(),
        position: -1,
    };
    assert_eq!(plan(&negative, &store), None);

    let valid = ControlCmd::SetPosition {
        track_id: current,
        position: 2_000_000,
    };
    assert_eq!(
        plan(&valid, &store).unwrap().data,
        json!({ "seek_position": 2.0 })
    );
}

#[test]
fn plan_property_commands_map_to_services() {
    let store = PropertyStore::new();
    assert_eq!(
        plan(&ControlCmd::SetVolume(1.4), &store).unwrap(),
        ServiceRequest {
            service: "volume_set",
            data: json!({ "volume_level": 1.0 }),
        }
    );
    assert_eq!(
        plan(&ControlCmd::SetLoopStatus(LoopStatus::Playlist), &store).unwrap(),
        ServiceRequest {
            service: "repeat_set",
            data: json!({ "repeat": "all" }),
        }
    );
    assert_eq!(
        plan(&ControlCmd::SetShuffle(false), &store).unwrap().data,
        json!({ "shuffle": false })
    );
    assert_eq!(plan(&ControlCmd::Quit, &store).unwrap().service, "turn_off");
}

#[tokio::test]
async fn executor_calls_services_in_order_on_the_entity() {
    let store = Arc::new(PropertyStore::new());
    let caller = Arc::new(RecordingCaller::default());
    let executor = Executor::new(caller.clone(), store, "media_player.kitchen");

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(ControlCmd::Next).unwrap();
    tx.send(ControlCmd::Raise).unwrap();
    tx.send(ControlCmd::PlayPause).unwrap();
    drop(tx);
    executor.run(rx).await;

    let calls = caller.calls.lock().unwrap();
    let services: Vec<_> = calls.iter().map(|(s, _, _)| s.as_str()).collect();
    assert_eq!(services, vec!["media_next_track", "media_play_pause"]);
    assert!(calls.iter().all(|(_, e, _)| e == "media_player.kitchen"));
}
