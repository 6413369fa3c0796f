use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;
use zbus::Connection;

use crate::bridge::{Executor, MetadataAssembler, StateMapper};
use crate::config;
use crate::error::Result;
use crate::hass::ClientSlot;
use crate::mpris::{CommandDispatcher, ControlCmd, PropertyStore, ServiceLifecycleManager, ZbusTransport};

/// Everything `run` drives, wired together but not started.
pub struct Components {
    pub connection: Connection,
    pub store: Arc<PropertyStore>,
    pub mapper: StateMapper<ZbusTransport>,
    pub executor: Executor<ClientSlot>,
    pub commands: UnboundedReceiver<ControlCmd>,
    pub client: ClientSlot,
}

pub async fn build(settings: &config::Settings) -> Result<Components> {
    let connection = Connection::session().await?;
    info!(unique_name = ?connection.unique_name(), "connected to session bus");

    let store = Arc::new(PropertyStore::new());
    let (control_tx, commands) = mpsc::unbounded_channel::<ControlCmd>();
    let dispatcher = CommandDispatcher::new(store.clone(), control_tx);

    let transport = ZbusTransport::new(connection.clone(), store.clone(), dispatcher);
    let lifecycle = ServiceLifecycleManager::new(transport, store.clone());
    let assembler = MetadataAssembler::new(settings.base_url()?, settings.art.size);
    let mapper = StateMapper::new(store.clone(), lifecycle, assembler);

    let client = ClientSlot::default();
    let executor = Executor::new(
        client.clone(),
        store.clone(),
        settings.media_player_entity.clone(),
    );

    Ok(Components {
        connection,
        store,
        mapper,
        executor,
        commands,
        client,
    })
}
