use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::logging;

mod event_loop;
mod mpris_sync;
mod settings;
mod startup;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings::load_settings()?;
    logging::init(&settings.log)?;
    info!(
        entity = %settings.media_player_entity,
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let startup::Components {
        connection,
        store,
        mut mapper,
        executor,
        commands,
        client,
    } = startup::build(&settings).await?;

    let forwarder = tokio::spawn(mpris_sync::forward_changes(
        connection.clone(),
        store.subscribe(),
        store.subscribe_seeks(),
    ));
    let executor = tokio::spawn(executor.run(commands));

    tokio::select! {
        _ = event_loop::run(&mut mapper, &client, &settings) => {}
        result = shutdown_signal() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for shutdown signals");
            }
        }
    }

    info!("shutting down");
    executor.abort();
    client.set(None).await;
    if let Err(e) = mapper.release().await {
        warn!(error = %e, "failed to release bus name");
    }
    forwarder.abort();

    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}
