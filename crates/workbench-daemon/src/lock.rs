//! Singleton lock: at most one live daemon per workspace
//!
//! The lock file records `{pid, startedAt}`. A holder is live only when its
//! pid is running and the socket accepts a connection; anything else is
//! stale and may be replaced.

use crate::error::{DaemonError, Result};
use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

/// How long a liveness probe waits for the socket to accept
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Contents of the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }
}

/// What the lock file says about the workspace
#[derive(Debug, Clone, PartialEq)]
pub enum LockStatus {
    /// No lock file
    Absent,
    /// Pid running and socket accepting
    Live(LockRecord),
    /// Dead pid, refused socket, or unreadable contents
    Stale(Option<LockRecord>),
}

/// Result of trying to take the lock
#[derive(Debug)]
pub enum LockOutcome {
    Acquired(SingletonLock),
    /// Another live daemon holds the workspace; nothing was touched
    Denied(LockRecord),
}

/// Ownership of the lock file; removed on release or drop
#[derive(Debug)]
pub struct SingletonLock {
    lock_path: PathBuf,
    socket_path: PathBuf,
    record: LockRecord,
    released: bool,
}

impl SingletonLock {
    /// Arbitrate ownership of the workspace
    ///
    /// A live holder denies the attempt without side effects. Otherwise any
    /// stale lock and socket files are removed and a fresh record is written
    /// atomically.
    pub async fn acquire(lock_path: &Path, socket_path: &Path) -> Result<LockOutcome> {
        match probe(lock_path, socket_path).await {
            LockStatus::Live(record) => {
                info!(pid = record.pid, lock = %lock_path.display(), "Workspace already owned by a live daemon");
                return Ok(LockOutcome::Denied(record));
            }
            LockStatus::Stale(record) => {
                warn!(
                    pid = record.as_ref().map(|r| r.pid),
                    lock = %lock_path.display(),
                    "Discarding stale daemon lock"
                );
                remove_if_exists(lock_path)?;
                remove_if_exists(socket_path)?;
            }
            LockStatus::Absent => {
                debug!(lock = %lock_path.display(), "No daemon lock present");
            }
        }

        let record = LockRecord::current();
        write_atomic(lock_path, &record)?;

        // A concurrent starter may have renamed its record over ours
        match read_lock(lock_path)? {
            Some(current) if current == record => {}
            Some(current) => return Ok(LockOutcome::Denied(current)),
            None => {
                return Err(DaemonError::Lock(format!(
                    "Lock file {:?} vanished after writing",
                    lock_path
                )));
            }
        }

        info!(pid = record.pid, lock = %lock_path.display(), "Daemon lock acquired");
        Ok(LockOutcome::Acquired(SingletonLock {
            lock_path: lock_path.to_path_buf(),
            socket_path: socket_path.to_path_buf(),
            record,
            released: false,
        }))
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Remove the lock file if it still names this holder
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match read_lock(&self.lock_path) {
            Ok(Some(current)) if current != self.record => {
                warn!(pid = current.pid, "Lock was taken over; leaving it in place");
                Ok(())
            }
            _ => {
                remove_if_exists(&self.lock_path)?;
                debug!(lock = %self.lock_path.display(), "Daemon lock released");
                Ok(())
            }
        }
    }
}

impl Drop for SingletonLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!("Failed to release daemon lock: {}", e);
        }
    }
}

/// Inspect the lock file and socket without modifying anything
pub async fn probe(lock_path: &Path, socket_path: &Path) -> LockStatus {
    let record = match read_lock(lock_path) {
        Ok(Some(record)) => record,
        Ok(None) => return LockStatus::Absent,
        Err(e) => {
            warn!(lock = %lock_path.display(), "Unreadable daemon lock: {}", e);
            return LockStatus::Stale(None);
        }
    };
    if pid_alive(record.pid) && socket_accepts(socket_path).await {
        LockStatus::Live(record)
    } else {
        LockStatus::Stale(Some(record))
    }
}

/// Read the lock record; `None` when the file does not exist
pub fn read_lock(path: &Path) -> Result<Option<LockRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| DaemonError::Lock(format!("Corrupt lock file {:?}: {}", path, e)))
}

/// Whether a process with this pid exists
///
/// `EPERM` means the process exists but belongs to someone else.
pub fn pid_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Whether something accepts connections on the socket path
pub async fn socket_accepts(socket_path: &Path) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(socket_path)).await,
        Ok(Ok(_))
    )
}

/// Distinguishes temp files of concurrent writes within one process
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_path(path: &Path, pid: u32) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DaemonError::Lock(format!("Invalid lock path {:?}", path)))?;
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    Ok(path.with_file_name(format!(".{}.{}.{}.tmp", file_name, pid, seq)))
}

fn write_atomic(path: &Path, record: &LockRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path, record.pid)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp)?;
    serde_json::to_writer(&mut file, record)?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
