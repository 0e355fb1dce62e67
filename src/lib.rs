/*!
 # Factorio Controller

 A Rust library for supervising several game server processes from one
 application.

 ## Overview

 Factorio Controller provides functionality to:
 - Prepare and launch server processes (saves, scenarios, mod packs, ban and admin lists)
 - Stop them gracefully, or forcefully with an OS-level kill as a last resort
 - Decode the tagged lines a server prints into typed events and answer them
 - Keep a consistent in-memory model of every server, one lock per server
 - Publish status, player count and file changes to subscribers

 ## Basic Usage

 ```no_run
 use factorio_controller::services::{
     InMemoryAdminStore, InMemoryBanStore, InMemoryDataStore, LocalFileManager, NullNotifier,
     ServerUpdater,
 };
 use factorio_controller::server::{OsProcessLauncher, SysinfoKiller};
 use factorio_controller::transport::ChannelLink;
 use factorio_controller::{Collaborators, Config, Result, ServerController, ServerId};
 use std::sync::Arc;

 struct NoUpdates;

 #[async_trait::async_trait]
 impl ServerUpdater for NoUpdates {
     async fn install(&self, _: &ServerId, _: &str) -> Result<()> {
         Ok(())
     }
 }

 #[tokio::main]
 async fn main() -> Result<()> {
     let config = Config::from_file("controller.yaml")?;
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
         updater: Arc::new(NoUpdates),
     };
     let controller = ServerController::new(config, collaborators);

     // Start a scenario on server "1"
     controller.start_scenario("1", "freeplay", Some("admin")).await?;

     // Later, stop it
     controller.stop("1", Some("admin")).await?;

     Ok(())
 }
 ```

 ## Features

 - **Lifecycle**: resume, load, start scenario, force start, stop, force stop and install
 - **Protocol**: tagged line decoding and console command encoding
 - **Configuration**: JSON or YAML config files
 - **Notifications**: typed events over a broadcast channel
 - **Async Support**: built on Tokio, collaborators behind `async-trait` seams
*/

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod protocol;
pub mod server;
pub mod services;
pub mod transport;

pub use config::Config;
pub use controller::{Collaborators, ForceStopOutcome, LockedServer, ServerController, ServerSnapshot};
pub use error::{Error, Result};
pub use events::{EventHub, FileDirectory, Notification};
pub use server::{ServerId, ServerStatus};
