use async_trait::async_trait;
use factorio_controller::error::Result;
use factorio_controller::server::{OsProcessLauncher, SysinfoKiller};
use factorio_controller::services::{
    InMemoryAdminStore, InMemoryBanStore, InMemoryDataStore, LocalFileManager, NullNotifier,
    ServerUpdater,
};
use factorio_controller::transport::{ChannelLink, WrapperMessage};
use factorio_controller::{Collaborators, Config, ServerController, ServerId, ServerStatus};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

/// Updater for hosts where game binaries are managed by hand
struct ManualUpdates;

#[async_trait]
impl ServerUpdater for ManualUpdates {
    async fn install(&self, server_id: &ServerId, version: &str) -> Result<()> {
        tracing::info!(server_id = %server_id, version, "Install requested; nothing to download");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!("Starting controller demo");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/controller.yaml".to_string());
    let config = Config::from_file(&config_path)?;

    let link = Arc::new(ChannelLink::default());
    let collaborators = Collaborators {
        bans: Arc::new(InMemoryBanStore::new()),
        admins: Arc::new(InMemoryAdminStore::new(["admin"])),
        data: Arc::new(InMemoryDataStore::new()),
        files: Arc::new(LocalFileManager::new(Arc::new(config.clone()))),
        notifier: Arc::new(NullNotifier),
        link: link.clone(),
        launcher: Arc::new(OsProcessLauncher),
        killer: Arc::new(SysinfoKiller),
        updater: Arc::new(ManualUpdates),
    };
    let controller = ServerController::new(config, collaborators);

    // Print every notification as JSON
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(notification) = events.recv().await {
            match serde_json::to_string(&notification) {
                Ok(json) => println!("event: {}", json),
                Err(e) => tracing::warn!(error = %e, "Could not serialize notification"),
            }
        }
    });

    let server_id = controller
        .server_ids()
        .into_iter()
        .next()
        .ok_or_else(|| factorio_controller::Error::ConfigInvalid("No servers".to_string()))?;

    // Stand in for the wrapper: echo what the controller sends and report
    // status changes back.
    let mut wrapper = link.connect(server_id.clone())?;
    let wrapper_controller = controller.clone();
    let wrapper_id = server_id.clone();
    tokio::spawn(async move {
        while let Some(message) = wrapper.recv().await {
            let reported = match message {
                WrapperMessage::Command(command) => {
                    println!("wrapper <- {}", command);
                    None
                }
                WrapperMessage::Stop => Some(ServerStatus::Stopped),
                WrapperMessage::ForceStop(ack) => {
                    let _ = ack.send(());
                    Some(ServerStatus::Killed)
                }
            };
            if let Some(status) = reported {
                if let Err(e) = wrapper_controller
                    .on_status_reported(wrapper_id.as_str(), status)
                    .await
                {
                    tracing::warn!(error = %e, "Status report rejected");
                }
            }
        }
    });

    println!("Starting scenario 'freeplay' on server {}...", server_id);
    if let Err(e) = controller
        .start_scenario(server_id.as_str(), "freeplay", Some("admin"))
        .await
    {
        println!("Start failed: {}", e);
        return Ok(());
    }

    controller
        .on_status_reported(server_id.as_str(), ServerStatus::Running)
        .await?;

    for line in [
        "2024-01-01 12:00:00 [PLAYER-JOIN] alice",
        "2024-01-01 12:00:05 [CHAT] alice: hello",
        "   12.345 Info AppManagerStates.cpp:1802: Saving finished",
    ] {
        controller.on_process_output(server_id.as_str(), line).await?;
    }

    let snapshot = controller.snapshot(server_id.as_str()).await?;
    println!(
        "{} is {} with {} player(s) online",
        snapshot.server_id, snapshot.status, snapshot.online_player_count
    );

    println!("Stopping server {}...", server_id);
    controller.stop(server_id.as_str(), Some("admin")).await?;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    println!(
        "Final status: {}",
        controller.status(server_id.as_str()).await?
    );

    Ok(())
}
