//! Unix-socket daemon serving a [`Service`]
//!
//! Lifecycle: `unstarted -> locking -> (lock-denied | listening) -> serving
//! -> shutting-down -> stopped`. Requests on one connection are handled in
//! order; connections are served concurrently.

use crate::error::{DaemonError, Result};
use crate::lock::{LockOutcome, LockRecord, SingletonLock};
use crate::protocol::{
    self, CallParams, DaemonStatus, Decoded, KIND_INVALID_REQUEST, KIND_UNKNOWN_METHOD, Request,
    Response,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use workbench_common::WorkspaceContext;
use workbench_sdk::{RouterError, Service};

/// Where the daemon is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Unstarted,
    Locking,
    LockDenied,
    Listening,
    Serving,
    ShuttingDown,
    Stopped,
}

/// Paths and limits for one daemon instance
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub lock_path: PathBuf,
    pub socket_path: PathBuf,
    /// Deadline applied to every `procedure.call`; `None` waits forever
    pub call_timeout: Option<Duration>,
}

impl DaemonOptions {
    pub fn new(lock_path: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            lock_path: lock_path.into(),
            socket_path: socket_path.into(),
            call_timeout: None,
        }
    }

    pub fn from_workspace(workspace: &WorkspaceContext) -> Self {
        Self {
            lock_path: workspace.lock_path(),
            socket_path: workspace.socket_path(),
            call_timeout: workspace.call_timeout(),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}

fn transition(state: &watch::Sender<DaemonState>, next: DaemonState) {
    let previous = state.send_replace(next);
    debug!(from = ?previous, to = ?next, "Daemon state changed");
}

/// A daemon that has not yet arbitrated the lock
pub struct Daemon {
    service: Arc<dyn Service>,
    options: DaemonOptions,
    state: watch::Sender<DaemonState>,
}

/// Outcome of [`Daemon::bind`]
pub enum Startup {
    Listening(ListeningDaemon),
    AlreadyRunning(LockRecord),
}

impl Daemon {
    pub fn new(service: Arc<dyn Service>, options: DaemonOptions) -> Self {
        let (state, _) = watch::channel(DaemonState::Unstarted);
        Self {
            service,
            options,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<DaemonState> {
        self.state.subscribe()
    }

    /// Take the lock and bind the socket
    ///
    /// When a live daemon already owns the workspace nothing is created or
    /// removed.
    pub async fn bind(self) -> Result<Startup> {
        transition(&self.state, DaemonState::Locking);
        let lock = match SingletonLock::acquire(&self.options.lock_path, &self.options.socket_path)
            .await?
        {
            LockOutcome::Acquired(lock) => lock,
            LockOutcome::Denied(record) => {
                transition(&self.state, DaemonState::LockDenied);
                return Ok(Startup::AlreadyRunning(record));
            }
        };

        let socket_path = &self.options.socket_path;
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // A crash can leave the inode behind even when the lock was stale
        match std::fs::remove_file(socket_path) {
            Ok(()) => debug!(socket = %socket_path.display(), "Removed leftover socket file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let listener = UnixListener::bind(socket_path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }
        info!(socket = %socket_path.display(), pid = lock.record().pid, "Daemon listening");
        transition(&self.state, DaemonState::Listening);

        Ok(Startup::Listening(ListeningDaemon {
            service: self.service,
            options: self.options,
            state: self.state,
            lock,
            listener,
        }))
    }

    /// Bind and serve until SIGTERM or SIGINT
    pub async fn run(self) -> Result<()> {
        match self.bind().await? {
            Startup::Listening(daemon) => daemon.serve(shutdown_signal()).await,
            Startup::AlreadyRunning(record) => Err(DaemonError::AlreadyRunning { pid: record.pid }),
        }
    }
}

/// A daemon that owns the lock and a bound socket
pub struct ListeningDaemon {
    service: Arc<dyn Service>,
    options: DaemonOptions,
    state: watch::Sender<DaemonState>,
    lock: SingletonLock,
    listener: UnixListener,
}

impl ListeningDaemon {
    pub fn socket_path(&self) -> &Path {
        &self.options.socket_path
    }

    pub fn record(&self) -> &LockRecord {
        self.lock.record()
    }

    pub fn state(&self) -> watch::Receiver<DaemonState> {
        self.state.subscribe()
    }

    /// Accept connections until `shutdown` resolves, then clean up
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let ListeningDaemon {
            service,
            options,
            state,
            lock,
            listener,
        } = self;

        let shared = Arc::new(Shared {
            service,
            call_timeout: options.call_timeout,
            pid: lock.record().pid,
            started_at: lock.record().started_at,
            socket: options.socket_path.display().to_string(),
            connections: AtomicUsize::new(0),
        });

        transition(&state, DaemonState::Serving);
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let shared = Arc::clone(&shared);
                        tasks.spawn(async move {
                            let _guard = ConnectionGuard::new(&shared.connections);
                            if let Err(e) = handle_connection(stream, &shared).await {
                                debug!("Connection ended with error: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Accept error: {}", e),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Connection task panicked: {}", e);
                        }
                    }
                }
            }
        }

        transition(&state, DaemonState::ShuttingDown);
        drop(listener);
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        if let Err(e) = std::fs::remove_file(&options.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(socket = %options.socket_path.display(), "Failed to remove socket: {}", e);
            }
        }
        let released = lock.release();
        transition(&state, DaemonState::Stopped);
        info!("Daemon stopped");
        released
    }
}

/// Resolves on SIGTERM or SIGINT
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

struct Shared {
    service: Arc<dyn Service>,
    call_timeout: Option<Duration>,
    pid: u32,
    started_at: chrono::DateTime<chrono::Utc>,
    socket: String,
    connections: AtomicUsize,
}

struct ConnectionGuard<'a>(&'a AtomicUsize);

impl<'a> ConnectionGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn handle_connection(stream: UnixStream, shared: &Shared) -> Result<()> {
    debug!("Connection accepted");
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.last() != Some(&b'\n') {
            debug!(bytes = line.len(), "Discarding partial line at end of stream");
            break;
        }

        let response = match protocol::decode_line(&line) {
            Decoded::Empty => continue,
            Decoded::Framing(message) => {
                warn!("Closing connection after framing error: {}", message);
                writer.write_all(&protocol::encode_line(&Response::framing(message))?).await?;
                writer.shutdown().await?;
                return Err(DaemonError::Framing("malformed request line".to_string()));
            }
            Decoded::Invalid { id, message } => {
                Response::failure(id, KIND_INVALID_REQUEST, message, None)
            }
            Decoded::Request(request) => handle_request(request, shared).await,
        };

        writer.write_all(&protocol::encode_line(&response)?).await?;
        writer.flush().await?;
    }

    debug!("Connection closed");
    Ok(())
}

async fn handle_request(request: Request, shared: &Shared) -> Response {
    let Request { id, method, params } = request;
    match method.as_str() {
        protocol::METHOD_CALL => {
            let params: CallParams = match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    return Response::failure(
                        id,
                        KIND_INVALID_REQUEST,
                        format!("Invalid params: {}", e),
                        None,
                    );
                }
            };
            debug!(path = %params.path, input = %params.input, "procedure.call");
            match call_with_deadline(shared, &params.path, params.input).await {
                Ok(data) => Response::data(id, data),
                Err(err) => {
                    debug!(path = %params.path, kind = %err.kind(), "Procedure failed: {}", err);
                    Response::router_error(id, &err)
                }
            }
        }
        protocol::METHOD_LIST => match serde_json::to_value(shared.service.describe()) {
            Ok(data) => Response::data(id, data),
            Err(e) => Response::router_error(id, &RouterError::from(e)),
        },
        protocol::METHOD_STATUS => {
            let status = DaemonStatus {
                pid: shared.pid,
                started_at: shared.started_at,
                socket: shared.socket.clone(),
                connections: shared.connections.load(Ordering::SeqCst),
            };
            match serde_json::to_value(status) {
                Ok(data) => Response::data(id, data),
                Err(e) => Response::router_error(id, &RouterError::from(e)),
            }
        }
        other => Response::failure(
            id,
            KIND_UNKNOWN_METHOD,
            format!("Unknown method: {}", other),
            None,
        ),
    }
}

async fn call_with_deadline(
    shared: &Shared,
    path: &str,
    input: Value,
) -> std::result::Result<Value, RouterError> {
    let call = shared.service.call(path, input);
    match shared.call_timeout {
        None => call.await,
        Some(deadline) => match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(RouterError::Timeout {
                path: path.to_string(),
                timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        },
    }
}
