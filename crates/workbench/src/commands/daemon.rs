//! `wb daemon start|status|stop`

use super::{fail, print_json};
use crate::app::Workbench;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use starbase::AppResult;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use workbench_common::WorkspaceContext;
use workbench_daemon::lock::{self, LockStatus};
use workbench_daemon::logging::{self, LoggingOptions};
use workbench_daemon::server::shutdown_signal;
use workbench_daemon::{Daemon, DaemonClient, DaemonOptions, Startup};
use workbench_sdk::Service;

/// How long `stop` waits for the lock file to disappear
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the daemon in the foreground until SIGTERM or SIGINT
pub async fn run_daemon_start(start_dir: &Path) -> AppResult {
    let workspace = match WorkspaceContext::discover(start_dir) {
        Ok(workspace) => workspace,
        Err(e) => return fail(format!("{:#}", e)),
    };
    // Before the registry is built, so skipped providers reach daemon.log
    logging::init(LoggingOptions::daemon(&workspace.log_dir()));
    let app = match Workbench::from_workspace(workspace, None) {
        Ok(app) => app,
        Err(e) => return fail(format!("{:#}", e)),
    };
    if let Err(e) = app.workspace.ensure_structure() {
        return fail(format!("{:#}", e));
    }

    let service: Arc<dyn Service> = app.dispatcher.clone();
    let daemon = Daemon::new(service, DaemonOptions::from_workspace(&app.workspace));
    let listening = match daemon.bind().await {
        Ok(Startup::Listening(listening)) => listening,
        Ok(Startup::AlreadyRunning(record)) => {
            println!(
                "Daemon already running for {} (pid {})",
                app.workspace.root.display(),
                record.pid
            );
            return Ok(None);
        }
        Err(e) => return fail(e),
    };

    println!(
        "Daemon listening on {} (pid {})",
        listening.socket_path().display(),
        listening.record().pid
    );
    match listening.serve(shutdown_signal()).await {
        Ok(()) => Ok(None),
        Err(e) => fail(e),
    }
}

pub async fn run_daemon_status(start_dir: &Path, json: bool) -> AppResult {
    let workspace = match WorkspaceContext::discover(start_dir) {
        Ok(workspace) => workspace,
        Err(e) => return fail(format!("{:#}", e)),
    };
    let (lock_path, socket_path) = (workspace.lock_path(), workspace.socket_path());

    match lock::probe(&lock_path, &socket_path).await {
        LockStatus::Live(record) => {
            let status = match DaemonClient::connect(&socket_path).await {
                Ok(mut client) => client.status().await,
                Err(e) => Err(e),
            };
            match status {
                Ok(status) if json => print_json(&status),
                Ok(status) => {
                    println!("Daemon running (pid {})", status.pid);
                    println!("  socket: {}", status.socket);
                    println!("  started: {}", status.started_at.to_rfc3339());
                    println!("  connections: {}", status.connections);
                    Ok(None)
                }
                Err(e) => fail(format!("Daemon pid {} is not answering: {}", record.pid, e)),
            }
        }
        LockStatus::Stale(record) => {
            let pid = record.map(|r| r.pid.to_string()).unwrap_or_else(|| "?".into());
            println!("Daemon not running (stale lock from pid {})", pid);
            Ok(Some(1))
        }
        LockStatus::Absent => {
            println!("Daemon not running");
            Ok(Some(1))
        }
    }
}

/// Send SIGTERM to the lock holder and wait for it to clean up
pub async fn run_daemon_stop(start_dir: &Path) -> AppResult {
    let workspace = match WorkspaceContext::discover(start_dir) {
        Ok(workspace) => workspace,
        Err(e) => return fail(format!("{:#}", e)),
    };
    let (lock_path, socket_path) = (workspace.lock_path(), workspace.socket_path());

    let record = match lock::probe(&lock_path, &socket_path).await {
        LockStatus::Live(record) => record,
        _ => {
            println!("Daemon not running");
            return Ok(None);
        }
    };
    let Ok(raw) = i32::try_from(record.pid) else {
        return fail(format!("Invalid pid in lock file: {}", record.pid));
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        return fail(format!("Failed to signal daemon pid {}: {}", record.pid, e));
    }
    info!(pid = record.pid, "Sent SIGTERM to daemon");

    let deadline = tokio::time::Instant::now() + STOP_TIMEOUT;
    while lock::read_lock(&lock_path).ok().flatten().as_ref() == Some(&record) {
        if tokio::time::Instant::now() >= deadline {
            return fail(format!(
                "Daemon pid {} did not stop within {}s",
                record.pid,
                STOP_TIMEOUT.as_secs()
            ));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    println!("Daemon stopped (pid {})", record.pid);
    Ok(None)
}
