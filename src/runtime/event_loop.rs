use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::bridge::StateMapper;
use crate::config::Settings;
use crate::error::Result;
use crate::hass::{ClientSlot, HassClient, find_entity};
use crate::mpris::Transport;

/// Follow the entity forever, reconnecting after every lost session.
pub async fn run<T: Transport>(mapper: &mut StateMapper<T>, client: &ClientSlot, settings: &Settings) {
    let delay = Duration::from_secs(settings.reconnect_delay_secs);

    loop {
        match session(mapper, client, settings).await {
            Ok(()) => warn!("Home Assistant connection lost"),
            Err(e) => error!(error = %e, "Home Assistant session failed"),
        }

        client.set(None).await;
        if let Err(e) = mapper.release().await {
            warn!(error = %e, "failed to release bus name");
        }

        info!(delay_secs = delay.as_secs(), "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

/// One connection: snapshot, then state changes until the socket closes.
async fn session<T: Transport>(
    mapper: &mut StateMapper<T>,
    client_slot: &ClientSlot,
    settings: &Settings,
) -> Result<()> {
    let url = settings.websocket_url()?;
    let client = Arc::new(HassClient::connect(url.as_str(), &settings.home_assistant.token).await?);
    client_slot.set(Some(client.clone())).await;

    let entity_id = settings.media_player_entity.as_str();
    // Subscribe first so nothing between snapshot and subscription is lost.
    let mut changes = client.subscribe_entity(entity_id).await?;
    let entity = find_entity(client.get_states().await?, entity_id)?;

    if !mapper.is_player_registered() {
        let identity = entity
            .attributes
            .friendly_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&settings.player.identity);
        mapper
            .register_player(
                identity,
                &settings.player.desktop_entry,
                settings.player.can_control,
            )
            .await?;
    }

    mapper.apply_snapshot(&entity).await?;
    info!(entity = entity_id, state = %entity.state, "tracking entity");

    while let Some(change) = changes.next().await {
        if let Err(e) = mapper.apply_change(&change).await {
            error!(entity = entity_id, error = %e, "failed to apply state change");
        }
    }
    Ok(())
}
