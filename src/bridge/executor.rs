use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

use crate::error::{BridgeError, Result};
use crate::hass::ClientSlot;
use crate::mpris::{ControlCmd, PlaybackStatus, PropertyStore};

const DOMAIN: &str = "media_player";

/// Outbound side of the state source.
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        data: Value,
    ) -> Result<()>;
}

#[async_trait]
impl ServiceCaller for ClientSlot {
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        data: Value,
    ) -> Result<()> {
        let client = self.get().await.ok_or(BridgeError::ConnectionClosed)?;
        client.call_service(domain, service, entity_id, data).await
    }
}

/// A `media_player` service call.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceRequest {
    pub service: &'static str,
    pub data: Value,
}

impl ServiceRequest {
    fn new(service: &'static str) -> Self {
        Self {
            service,
            data: json!({}),
        }
    }

    fn with_data(service: &'static str, data: Value) -> Self {
        Self { service, data }
    }
}

/// Service call carrying out `cmd`, or `None` when there is nothing to do.
pub fn plan(cmd: &ControlCmd, store: &PropertyStore) -> Option<ServiceRequest> {
    let status = store.playback_status();
    let request = match cmd {
        ControlCmd::Play if status == PlaybackStatus::Playing => return None,
        ControlCmd::Play => ServiceRequest::new("media_play"),
        ControlCmd::Pause if status == PlaybackStatus::Paused => return None,
        ControlCmd::Pause => ServiceRequest::new("media_pause"),
        ControlCmd::PlayPause => ServiceRequest::new("media_play_pause"),
        ControlCmd::Stop if status == PlaybackStatus::Stopped => return None,
        ControlCmd::Stop => ServiceRequest::new("media_stop"),
        ControlCmd::Next => ServiceRequest::new("media_next_track"),
        ControlCmd::Previous => ServiceRequest::new("media_previous_track"),
        ControlCmd::Seek(offset) => {
            let target = store.position().saturating_add(*offset).max(0);
            seek(target)
        }
        ControlCmd::SetPosition { track_id, position } => {
            let current = store.metadata().track_path();
            if *track_id != current {
                debug!(%track_id, %current, "ignoring SetPosition for stale track");
                return None;
            }
            if *position < 0 {
                debug!(position, "ignoring negative SetPosition");
                return None;
            }
            seek(*position)
        }
        ControlCmd::SetVolume(volume) => ServiceRequest::with_data(
            "volume_set",
            json!({ "volume_level": volume.clamp(0.0, 1.0) }),
        ),
        ControlCmd::SetShuffle(shuffle) => {
            ServiceRequest::with_data("shuffle_set", json!({ "shuffle": shuffle }))
        }
        ControlCmd::SetLoopStatus(status) => {
            ServiceRequest::with_data("repeat_set", json!({ "repeat": status.as_repeat() }))
        }
        ControlCmd::Quit => ServiceRequest::new("turn_off"),
        ControlCmd::Raise => {
            info!("Raise requested, nothing to raise");
            return None;
        }
    };
    Some(request)
}

fn seek(position_micros: i64) -> ServiceRequest {
    ServiceRequest::with_data(
        "media_seek",
        json!({ "seek_position": position_micros as f64 / 1_000_000.0 }),
    )
}

/// Single consumer of the command channel.
pub struct Executor<C: ServiceCaller> {
    caller: C,
    store: Arc<PropertyStore>,
    entity_id: String,
}

impl<C: ServiceCaller> Executor<C> {
    pub fn new(caller: C, store: Arc<PropertyStore>, entity_id: impl Into<String>) -> Self {
        Self {
            caller,
            store,
            entity_id: entity_id.into(),
        }
    }

    /// Execute commands in arrival order until every sender is gone.
    pub async fn run(self, mut rx: UnboundedReceiver<ControlCmd>) {
        while let Some(cmd) = rx.recv().await {
            self.execute(&cmd).await;
        }
        info!("command channel closed, executor stopping");
    }

    pub async fn execute(&self, cmd: &ControlCmd) {
        let Some(request) = plan(cmd, &self.store) else {
            debug!(command = cmd.name(), "nothing to execute");
            return;
        };

        debug!(command = cmd.name(), service = request.service, "executing");
        if let Err(e) = self
            .caller
            .call_service(DOMAIN, request.service, &self.entity_id, request.data)
            .await
        {
            error!(
                command = cmd.name(),
                service = request.service,
                error = %e,
                "service call failed"
            );
        }
    }
}
