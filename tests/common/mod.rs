#![allow(dead_code)]

use async_trait::async_trait;
use factorio_controller::config::{ServerConfig, ServerExtraSettings};
use factorio_controller::error::{Error, Result};
use factorio_controller::server::{
    KillReport, LaunchedProcess, ProcessKiller, ProcessLaunchDescriptor, ProcessLauncher,
};
use factorio_controller::services::{
    InMemoryAdminStore, InMemoryBanStore, InMemoryDataStore, LocalFileManager, Notifier,
    RelayMessage, ServerUpdater,
};
use factorio_controller::transport::ProcessLink;
use factorio_controller::{Collaborators, Config, Notification, ServerController, ServerId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Notify, broadcast};

/// Process link recording everything sent to it
#[derive(Default)]
pub struct RecordingLink {
    pub commands: Mutex<Vec<(ServerId, String)>>,
    pub stops: Mutex<Vec<ServerId>>,
    pub force_stops: AtomicUsize,
    /// When false, force stop requests are never acknowledged
    pub acknowledge_force_stop: AtomicBool,
}

impl RecordingLink {
    pub fn commands_for(&self, id: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(server_id, _)| server_id.as_str() == id)
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn stop_count(&self, id: &str) -> usize {
        self.stops
            .lock()
            .unwrap()
            .iter()
            .filter(|server_id| server_id.as_str() == id)
            .count()
    }
}

#[async_trait]
impl ProcessLink for RecordingLink {
    async fn send_command(&self, server_id: &ServerId, command: &str) -> Result<()> {
        self.commands
            .lock()
            .unwrap()
            .push((server_id.clone(), command.to_string()));
        Ok(())
    }

    async fn stop(&self, server_id: &ServerId) -> Result<()> {
        self.stops.lock().unwrap().push(server_id.clone());
        Ok(())
    }

    async fn force_stop(&self, _server_id: &ServerId) -> Result<()> {
        self.force_stops.fetch_add(1, Ordering::SeqCst);
        if self.acknowledge_force_stop.load(Ordering::SeqCst) {
            Ok(())
        } else {
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

/// Launcher that records descriptors instead of spawning processes
#[derive(Default)]
pub struct FakeLauncher {
    pub launches: Mutex<Vec<ProcessLaunchDescriptor>>,
    pub fail: AtomicBool,
}

impl FakeLauncher {
    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<ProcessLaunchDescriptor> {
        self.launches.lock().unwrap().last().cloned()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, descriptor: &ProcessLaunchDescriptor) -> Result<LaunchedProcess> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ProcessStart("no such file".to_string()));
        }
        self.launches.lock().unwrap().push(descriptor.clone());
        Ok(LaunchedProcess {
            pid: Some(4242),
            output: None,
        })
    }
}

/// Killer that counts scans and returns a fixed report
pub struct CountingKiller {
    pub scans: AtomicUsize,
    pub report: KillReport,
    pub executables: Mutex<Vec<PathBuf>>,
}

impl CountingKiller {
    pub fn new(report: KillReport) -> Self {
        Self {
            scans: AtomicUsize::new(0),
            report,
            executables: Mutex::new(Vec::new()),
        }
    }
}

impl ProcessKiller for CountingKiller {
    fn kill_matching(&self, executable: &Path) -> KillReport {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.executables.lock().unwrap().push(executable.to_path_buf());
        self.report
    }
}

/// Notifier recording relayed messages and presence updates
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(ServerId, RelayMessage)>>,
    pub presence: Mutex<Vec<u32>>,
}

impl RecordingNotifier {
    pub fn messages_for(&self, id: &str) -> Vec<RelayMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(server_id, _)| server_id.as_str() == id)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, server_id: &ServerId, message: RelayMessage) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((server_id.clone(), message));
        Ok(())
    }

    async fn update_presence(&self, online_players: u32) -> Result<()> {
        self.presence.lock().unwrap().push(online_players);
        Ok(())
    }
}

/// Updater that waits for the test to release it
#[derive(Default)]
pub struct GatedUpdater {
    pub gate: Notify,
    pub installs: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl ServerUpdater for GatedUpdater {
    async fn install(&self, _server_id: &ServerId, version: &str) -> Result<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        if self.fail.load(Ordering::SeqCst) {
            Err(Error::Unexpected(format!("download of {} failed", version)))
        } else {
            Ok(())
        }
    }
}

/// A controller over a temporary directory with two servers, "1" and "2".
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
    pub controller: ServerController,
    pub link: Arc<RecordingLink>,
    pub launcher: Arc<FakeLauncher>,
    pub killer: Arc<CountingKiller>,
    pub notifier: Arc<RecordingNotifier>,
    pub updater: Arc<GatedUpdater>,
    pub bans: Arc<InMemoryBanStore>,
    pub data: Arc<InMemoryDataStore>,
}

pub fn test_config(root: &Path) -> Config {
    let mut servers = BTreeMap::new();
    servers.insert(
        "1".to_string(),
        ServerConfig {
            port: 34197,
            settings: ServerExtraSettings::default(),
        },
    );
    servers.insert(
        "2".to_string(),
        ServerConfig {
            port: 34198,
            settings: ServerExtraSettings::default(),
        },
    );

    Config {
        root_directory: root.join("servers"),
        wrapper_executable: PathBuf::from("factorio-wrapper"),
        factorio_executable: PathBuf::from("bin/x64/factorio"),
        scenario_directory: root.join("scenarios"),
        mod_directory: root.join("mods"),
        max_log_files: 3,
        force_stop_timeout_ms: 100,
        crash_alert_cooldown_secs: 300,
        presence_debounce_ms: 10,
        control_message_capacity: 50,
        servers,
    }
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_collaborators(|_| {})
    }

    /// Build the environment, letting the test swap collaborators first.
    pub fn with_collaborators(customize: impl FnOnce(&mut Collaborators)) -> Self {
        Self::build(|_| {}, customize)
    }

    /// Build the environment with an adjusted configuration.
    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, |_| {})
    }

    fn build(
        configure: impl FnOnce(&mut Config),
        customize: impl FnOnce(&mut Collaborators),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        configure(&mut config);

        std::fs::create_dir_all(config.scenario_directory.join("freeplay")).unwrap();
        std::fs::create_dir_all(&config.mod_directory).unwrap();
        std::fs::create_dir_all(config.root_directory.join("global_saves")).unwrap();

        let link = Arc::new(RecordingLink::default());
        link.acknowledge_force_stop.store(true, Ordering::SeqCst);
        let launcher = Arc::new(FakeLauncher::default());
        let killer = Arc::new(CountingKiller::new(KillReport { found: 2, killed: 1 }));
        let notifier = Arc::new(RecordingNotifier::default());
        let updater = Arc::new(GatedUpdater::default());
        let bans = Arc::new(InMemoryBanStore::new());
        let data = Arc::new(InMemoryDataStore::new());

        let mut collaborators = Collaborators {
            bans: bans.clone(),
            admins: Arc::new(InMemoryAdminStore::new(["admin"])),
            data: data.clone(),
            files: Arc::new(LocalFileManager::new(Arc::new(config.clone()))),
            notifier: notifier.clone(),
            link: link.clone(),
            launcher: launcher.clone(),
            killer: killer.clone(),
            updater: updater.clone(),
        };
        customize(&mut collaborators);

        let controller = ServerController::new(config.clone(), collaborators);

        Self {
            dir,
            config,
            controller,
            link,
            launcher,
            killer,
            notifier,
            updater,
            bans,
            data,
        }
    }

    pub fn server_dir(&self, id: &str) -> PathBuf {
        self.config.root_directory.join(id)
    }

    /// Bring a server to `Running` the way the wrapper reports it.
    pub async fn run_server(&self, id: &str) {
        self.controller
            .start_scenario(id, "freeplay", Some("admin"))
            .await
            .unwrap();
        self.controller
            .on_status_reported(id, factorio_controller::ServerStatus::Running)
            .await
            .unwrap();
    }
}

/// Everything published so far, without waiting.
pub fn drain(events: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut received = Vec::new();
    while let Ok(notification) = events.try_recv() {
        received.push(notification);
    }
    received
}

/// Wait until a notification matching `predicate` arrives.
pub async fn wait_for(
    events: &mut broadcast::Receiver<Notification>,
    predicate: impl Fn(&Notification) -> bool,
) -> Notification {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(notification) if predicate(&notification) => return notification,
                Ok(_) => continue,
                Err(e) => panic!("event stream failed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for notification")
}
