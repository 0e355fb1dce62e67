mod common;

use async_trait::async_trait;
use common::{TestEnv, drain, wait_for};
use factorio_controller::error::{Error, Result};
use factorio_controller::services::{AdminStore, BanStore, Ban, RelayMessage};
use factorio_controller::{ForceStopOutcome, Notification, ServerStatus};
use mockall::mock;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

mock! {
    pub BanStoreMock {}

    #[async_trait]
    impl BanStore for BanStoreMock {
        async fn add_ban(&self, ban: Ban) -> Result<()>;
        async fn remove_ban(&self, username: &str, admin: &str) -> Result<()>;
        async fn build_ban_list_file(&self, path: &Path) -> Result<()>;
    }
}

mock! {
    pub AdminStoreMock {}

    #[async_trait]
    impl AdminStore for AdminStoreMock {
        async fn get_admins(&self) -> Result<Vec<String>>;
        async fn build_admin_list(&self, path: &Path) -> Result<()>;
    }
}

fn status_changes(events: &[Notification]) -> Vec<(ServerStatus, ServerStatus)> {
    events
        .iter()
        .filter_map(|notification| match notification {
            Notification::StatusChanged {
                old_status,
                new_status,
                ..
            } => Some((*old_status, *new_status)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_start_scenario_launches_wrapper() -> Result<()> {
    let env = TestEnv::new();
    let mut events = env.controller.subscribe();

    env.controller
        .start_scenario("1", "freeplay", Some("admin"))
        .await?;

    assert_eq!(env.controller.status("1").await?, ServerStatus::WrapperStarting);
    assert_eq!(
        status_changes(&drain(&mut events)),
        vec![
            (ServerStatus::Unknown, ServerStatus::Preparing),
            (ServerStatus::Preparing, ServerStatus::Prepared),
            (ServerStatus::Prepared, ServerStatus::WrapperStarting),
        ]
    );

    let descriptor = env.launcher.last().expect("process launched");
    let base = env.server_dir("1");
    assert_eq!(descriptor.program, Path::new("factorio-wrapper"));
    assert_eq!(
        descriptor.args,
        vec![
            "1".to_string(),
            base.join("bin/x64/factorio").display().to_string(),
            "--start-server-load-scenario".to_string(),
            "freeplay".to_string(),
            "--server-settings".to_string(),
            base.join("server-settings.json").display().to_string(),
            "--port".to_string(),
            "34197".to_string(),
        ]
    );

    // Ban and admin lists were rebuilt, the scenario root is linked in.
    assert!(base.join("server-banlist.json").exists());
    assert!(base.join("server-adminlist.json").exists());
    assert!(base.join("scenarios").join("freeplay").exists());

    Ok(())
}

#[tokio::test]
async fn test_status_messages_are_recorded() -> Result<()> {
    let env = TestEnv::new();
    env.controller
        .start_scenario("1", "freeplay", Some("admin"))
        .await?;

    let messages = env.controller.control_messages("1").await?;
    assert_eq!(
        messages[0].message,
        "[STATUS] Change from Unknown to Preparing by: admin"
    );
    assert_eq!(messages[0].sender.as_deref(), Some("admin"));
    assert!(
        messages
            .iter()
            .any(|m| m.message == "[STATUS] Change from Prepared to WrapperStarting")
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_server_id() {
    let env = TestEnv::new();
    let result = env.controller.start_scenario("99", "freeplay", None).await;
    assert!(matches!(result, Err(Error::UnknownServerId(id)) if id == "99"));
}

#[tokio::test]
async fn test_missing_scenario_changes_nothing() -> Result<()> {
    let env = TestEnv::new();
    let mut events = env.controller.subscribe();

    let result = env.controller.start_scenario("1", "missing", None).await;

    assert!(matches!(result, Err(Error::MissingDirectory(_))));
    assert_eq!(env.controller.status("1").await?, ServerStatus::Unknown);
    assert!(drain(&mut events).is_empty());
    assert_eq!(env.launcher.launch_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_resume_requires_temp_save() -> Result<()> {
    let env = TestEnv::new();

    let result = env.controller.resume("1", None).await;
    assert!(matches!(result, Err(Error::MissingFile(_))));
    assert_eq!(env.controller.status("1").await?, ServerStatus::Unknown);

    let saves = env.server_dir("1").join("saves");
    std::fs::create_dir_all(&saves).unwrap();
    std::fs::write(saves.join("autosave1.zip"), b"save").unwrap();

    env.controller.resume("1", None).await?;
    let descriptor = env.launcher.last().expect("process launched");
    assert_eq!(descriptor.args[2], "--start-server-load-latest");
    Ok(())
}

#[tokio::test]
async fn test_load_global_save_copies_to_temp() -> Result<()> {
    let env = TestEnv::new();
    let global = env.config.root_directory.join("global_saves");
    std::fs::write(global.join("world.zip"), b"save").unwrap();
    let mut events = env.controller.subscribe();

    env.controller
        .load("1", "global_saves", "world.zip", Some("admin"))
        .await?;

    let copy = env.server_dir("1").join("saves").join("world.zip");
    assert!(copy.exists());

    let descriptor = env.launcher.last().expect("process launched");
    assert_eq!(descriptor.args[2], "--start-server");
    assert!(descriptor.args[3].ends_with("world.zip"));
    assert!(descriptor.args[3].contains("saves"));

    assert!(drain(&mut events).iter().any(|n| matches!(
        n,
        Notification::FilesChanged {
            directory: factorio_controller::FileDirectory::TempSaves,
            ..
        }
    )));
    Ok(())
}

#[tokio::test]
async fn test_load_rejects_traversal() -> Result<()> {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.server_dir("1").join("saves")).unwrap();

    let result = env
        .controller
        .load("1", "saves", "../../etc/passwd", None)
        .await;
    assert!(matches!(result, Err(Error::InvalidDirectory(_))));

    let result = env.controller.load("1", "../etc", "passwd", None).await;
    assert!(matches!(result, Err(Error::InvalidDirectory(_))));

    let result = env.controller.load("1", "saves", "missing.zip", None).await;
    assert!(matches!(result, Err(Error::MissingFile(_))));

    assert_eq!(env.controller.status("1").await?, ServerStatus::Unknown);
    assert_eq!(env.launcher.launch_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_start_guard_for_every_status() -> Result<()> {
    for status in ServerStatus::ALL {
        let env = TestEnv::new();
        env.controller
            .with_lock("1", |server| server.status = status)
            .await?;
        let mut events = env.controller.subscribe();

        let result = env.controller.start_scenario("1", "freeplay", None).await;

        if status.is_startable() {
            assert!(result.is_ok(), "start from {status} failed: {result:?}");
            assert_eq!(
                status_changes(&drain(&mut events))[0],
                (status, ServerStatus::Preparing)
            );
        } else {
            assert!(
                matches!(result, Err(Error::InvalidState(s)) if s == status),
                "start from {status} should be rejected"
            );
            assert_eq!(env.controller.status("1").await?, status);
            assert!(drain(&mut events).is_empty());
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_launch_failure_is_errored() -> Result<()> {
    let env = TestEnv::new();
    env.launcher.fail.store(true, Ordering::SeqCst);

    let result = env.controller.start_scenario("1", "freeplay", None).await;

    assert!(matches!(result, Err(Error::ProcessStart(_))));
    assert_eq!(env.controller.status("1").await?, ServerStatus::Errored);
    Ok(())
}

#[tokio::test]
async fn test_preparation_failures_are_aggregated() -> Result<()> {
    let env = TestEnv::with_collaborators(|collaborators| {
        let mut bans = MockBanStoreMock::new();
        bans.expect_build_ban_list_file()
            .times(1)
            .returning(|_| Err(Error::PersistenceConflict("bans".to_string())));

        let mut admins = MockAdminStoreMock::new();
        admins
            .expect_build_admin_list()
            .times(1)
            .returning(|_| Err(Error::PersistenceConflict("admins".to_string())));

        collaborators.bans = Arc::new(bans);
        collaborators.admins = Arc::new(admins);
    });

    let result = env.controller.start_scenario("1", "freeplay", None).await;

    match result {
        Err(Error::Preparation(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(
                errors
                    .iter()
                    .all(|e| matches!(e, Error::PersistenceConflict(_)))
            );
        }
        other => panic!("expected aggregated preparation error, got {other:?}"),
    }
    assert_eq!(env.controller.status("1").await?, ServerStatus::Errored);
    assert_eq!(env.launcher.launch_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_kept_ban_list_is_not_rebuilt() -> Result<()> {
    let env = TestEnv::with_collaborators(|collaborators| {
        let mut bans = MockBanStoreMock::new();
        bans.expect_build_ban_list_file().never();
        collaborators.bans = Arc::new(bans);
    });

    let mut settings = env.controller.extra_settings("1").await?;
    settings.build_bans_from_database_on_start = false;
    env.controller.set_extra_settings("1", settings).await?;

    env.controller.start_scenario("1", "freeplay", None).await?;
    assert_eq!(env.controller.status("1").await?, ServerStatus::WrapperStarting);
    Ok(())
}

#[tokio::test]
async fn test_missing_mod_pack_clears_selection() -> Result<()> {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.config.mod_directory.join("space")).unwrap();

    env.controller.set_selected_mod_pack("1", Some("space")).await?;
    env.controller.start_scenario("1", "freeplay", None).await?;
    let descriptor = env.launcher.last().expect("process launched");
    assert_eq!(descriptor.args[descriptor.args.len() - 2], "--mod-directory");

    env.controller.set_selected_mod_pack("2", Some("gone")).await?;
    env.controller.start_scenario("2", "freeplay", None).await?;
    let descriptor = env.launcher.last().expect("process launched");
    assert!(!descriptor.args.contains(&"--mod-directory".to_string()));
    assert_eq!(env.controller.extra_settings("2").await?.selected_mod_pack, None);
    Ok(())
}

#[tokio::test]
async fn test_stop_waits_for_report() -> Result<()> {
    let env = TestEnv::new();

    let result = env.controller.stop("1", None).await;
    assert!(matches!(result, Err(Error::InvalidState(ServerStatus::Unknown))));

    env.run_server("1").await;
    env.controller.stop("1", Some("admin")).await?;

    assert_eq!(env.controller.status("1").await?, ServerStatus::Stopping);
    assert_eq!(env.link.stop_count("1"), 1);

    env.controller
        .on_status_reported("1", ServerStatus::Stopped)
        .await?;
    assert_eq!(env.controller.status("1").await?, ServerStatus::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_first_running_report_sends_handshake() -> Result<()> {
    let env = TestEnv::new();
    env.run_server("1").await;

    assert_eq!(
        env.link.commands_for("1"),
        vec![
            "/silent-command Server.query_online_players()".to_string(),
            "/silent-command Server.get_tracked_data_sets()".to_string(),
        ]
    );
    assert_eq!(env.notifier.messages_for("1"), vec![RelayMessage::ServerStarted]);

    let mut events = env.controller.subscribe();
    env.controller
        .on_status_reported("1", ServerStatus::Running)
        .await?;

    assert!(drain(&mut events).is_empty());
    assert_eq!(env.link.commands_for("1").len(), 2);
    assert!(env.controller.snapshot("1").await?.last_status_report.is_some());
    Ok(())
}

#[tokio::test]
async fn test_crash_after_running_is_announced() -> Result<()> {
    let env = TestEnv::new();
    env.run_server("1").await;

    env.controller
        .on_status_reported("1", ServerStatus::Crashed)
        .await?;

    let messages = env.notifier.messages_for("1");
    assert!(matches!(
        messages.last(),
        Some(RelayMessage::Crashed { alert: false, uptime: Some(_) })
    ));
    Ok(())
}

#[tokio::test]
async fn test_force_stop_acknowledged_skips_kill() -> Result<()> {
    let env = TestEnv::new();
    env.run_server("1").await;

    let outcome = env.controller.force_stop("1", Some("admin")).await?;

    assert_eq!(outcome, ForceStopOutcome::Acknowledged);
    assert_eq!(env.killer.scans.load(Ordering::SeqCst), 0);
    assert_eq!(env.controller.status("1").await?, ServerStatus::Stopping);
    Ok(())
}

#[tokio::test]
async fn test_force_stop_timeout_kills_once() -> Result<()> {
    let env = TestEnv::new();
    env.link.acknowledge_force_stop.store(false, Ordering::SeqCst);
    env.run_server("1").await;

    let outcome = env.controller.force_stop("1", Some("admin")).await?;

    match outcome {
        ForceStopOutcome::Killed(report) => {
            assert_eq!(report.found, 2);
            assert_eq!(report.killed, 1);
            assert!(report.killed <= report.found);
        }
        other => panic!("expected kill, got {other:?}"),
    }
    assert_eq!(env.killer.scans.load(Ordering::SeqCst), 1);
    assert_eq!(
        env.killer.executables.lock().unwrap()[0],
        env.server_dir("1").join("bin/x64/factorio")
    );
    assert_eq!(env.controller.status("1").await?, ServerStatus::Killed);

    let messages = env.controller.control_messages("1").await?;
    assert!(messages.iter().any(|m| m.message == "Killed 1 of 2 processes"));
    Ok(())
}

#[tokio::test]
async fn test_force_stop_with_nothing_found_still_terminates() -> Result<()> {
    let env = TestEnv::with_collaborators(|collaborators| {
        collaborators.killer = Arc::new(common::CountingKiller::new(Default::default()));
    });
    env.link.acknowledge_force_stop.store(false, Ordering::SeqCst);
    env.run_server("1").await;

    let outcome = env.controller.force_stop("1", None).await?;

    assert_eq!(outcome, ForceStopOutcome::Killed(Default::default()));
    assert_eq!(env.controller.status("1").await?, ServerStatus::Killed);
    Ok(())
}

#[tokio::test]
async fn test_force_stop_spares_server_restarted_during_wait() -> Result<()> {
    // Leave room to restart the server before the acknowledgment times out.
    let env = TestEnv::with_config(|config| config.force_stop_timeout_ms = 1000);
    env.link.acknowledge_force_stop.store(false, Ordering::SeqCst);
    env.run_server("1").await;

    let controller = env.controller.clone();
    let force_stop = tokio::spawn(async move { controller.force_stop("1", Some("admin")).await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while env.controller.status("1").await.unwrap() != ServerStatus::Stopping {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("force stop reaches Stopping");

    // The process stops on its own and an admin starts it again.
    env.controller
        .on_status_reported("1", ServerStatus::Stopped)
        .await?;
    env.controller
        .start_scenario("1", "freeplay", Some("admin"))
        .await?;
    assert_eq!(env.launcher.launch_count(), 2);

    let outcome = force_stop.await.unwrap()?;

    assert_eq!(
        outcome,
        ForceStopOutcome::AlreadyStopped(ServerStatus::WrapperStarting)
    );
    assert_eq!(env.killer.scans.load(Ordering::SeqCst), 0);
    assert_eq!(
        env.controller.status("1").await?,
        ServerStatus::WrapperStarting
    );
    Ok(())
}

#[tokio::test]
async fn test_force_start_scenario_waits_for_stop() -> Result<()> {
    let env = TestEnv::new();
    env.run_server("1").await;
    assert_eq!(env.launcher.launch_count(), 1);

    env.controller
        .force_start_scenario("1", "freeplay", Some("admin"))
        .await?;

    assert_eq!(env.controller.status("1").await?, ServerStatus::Stopping);
    assert_eq!(env.link.stop_count("1"), 1);
    assert_eq!(env.launcher.launch_count(), 1);

    env.controller
        .on_status_reported("1", ServerStatus::Stopped)
        .await?;

    assert_eq!(env.launcher.launch_count(), 2);
    assert_eq!(env.controller.status("1").await?, ServerStatus::WrapperStarting);

    // The continuation was consumed by the first stop.
    env.controller
        .on_status_reported("1", ServerStatus::Stopped)
        .await?;
    assert_eq!(env.launcher.launch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_force_start_scenario_when_idle_starts_now() -> Result<()> {
    let env = TestEnv::new();

    env.controller
        .force_start_scenario("1", "freeplay", None)
        .await?;

    assert_eq!(env.link.stop_count("1"), 0);
    assert_eq!(env.launcher.launch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_install_returns_before_update_finishes() -> Result<()> {
    let env = TestEnv::new();
    let mut events = env.controller.subscribe();

    env.controller.install("1", "1.1.110", Some("admin")).await?;
    assert_eq!(env.controller.status("1").await?, ServerStatus::Updating);

    let second = env.controller.install("1", "1.1.110", Some("admin")).await;
    assert!(matches!(second, Err(Error::InvalidState(ServerStatus::Updating))));

    env.updater.gate.notify_one();
    wait_for(&mut events, |n| {
        matches!(
            n,
            Notification::StatusChanged {
                new_status: ServerStatus::Updated,
                ..
            }
        )
    })
    .await;

    assert_eq!(env.controller.status("1").await?, ServerStatus::Updated);
    assert_eq!(env.updater.installs.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_install_is_crashed() -> Result<()> {
    let env = TestEnv::new();
    env.updater.fail.store(true, Ordering::SeqCst);
    let mut events = env.controller.subscribe();

    env.controller.install("1", "1.1.110", None).await?;
    env.updater.gate.notify_one();
    wait_for(&mut events, |n| {
        matches!(
            n,
            Notification::StatusChanged {
                new_status: ServerStatus::Crashed,
                ..
            }
        )
    })
    .await;

    assert_eq!(env.controller.status("1").await?, ServerStatus::Crashed);
    Ok(())
}

#[tokio::test]
async fn test_different_servers_do_not_block() -> Result<()> {
    let env = TestEnv::new();
    let held = env.controller.lock("1").await?;

    let other = tokio::time::timeout(Duration::from_secs(1), env.controller.status("2")).await;
    assert!(matches!(other, Ok(Ok(ServerStatus::Unknown))));

    let same = tokio::time::timeout(Duration::from_millis(50), env.controller.status("1")).await;
    assert!(same.is_err(), "same server must wait for the lock");

    drop(held);
    assert_eq!(env.controller.status("1").await?, ServerStatus::Unknown);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_server_operations_are_serialized() -> Result<()> {
    let env = TestEnv::new();
    let first = env.controller.clone();
    let second = env.controller.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.start_scenario("1", "freeplay", None).await }),
        tokio::spawn(async move { second.start_scenario("1", "freeplay", None).await }),
    );
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(Error::InvalidState(ServerStatus::WrapperStarting))
    )));
    assert_eq!(env.launcher.launch_count(), 1);
    Ok(())
}
