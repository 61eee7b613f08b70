//! Client for a running daemon

use crate::error::{DaemonError, Result};
use crate::lock::{self, LockStatus};
use crate::protocol::{self, DaemonStatus, METHOD_LIST, METHOD_STATUS, Request, Response};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;
use workbench_sdk::ProcedureDescription;

/// One connection to the daemon; requests are sent one at a time
pub struct DaemonClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: AtomicU64,
}

impl DaemonClient {
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            DaemonError::Connection(format!("Cannot connect to {:?}: {}", socket_path, e))
        })?;
        debug!(socket = %socket_path.display(), "Connected to daemon");
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            next_id: AtomicU64::new(1),
        })
    }

    /// Whether a live daemon owns the workspace
    pub async fn is_running(lock_path: &Path, socket_path: &Path) -> bool {
        matches!(lock::probe(lock_path, socket_path).await, LockStatus::Live(_))
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request {
            id: Value::from(id),
            method: method.to_string(),
            params,
        };
        self.send(&request).await?;
        let response = self.receive().await?;
        if response.id != Value::from(id) {
            return Err(DaemonError::Connection(format!(
                "Response id {} does not match request id {}",
                response.id, id
            )));
        }
        response.into_result()
    }

    /// Call a procedure by its full path
    pub async fn call(&mut self, path: &str, input: Value) -> Result<Value> {
        let params = serde_json::json!({ "path": path, "input": input });
        self.request(protocol::METHOD_CALL, params).await
    }

    pub async fn list(&mut self) -> Result<Vec<ProcedureDescription>> {
        let value = self.request(METHOD_LIST, Value::Null).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn status(&mut self) -> Result<DaemonStatus> {
        let value = self.request(METHOD_STATUS, Value::Null).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn send(&mut self, request: &Request) -> Result<()> {
        self.writer.write_all(&protocol::encode_line(request)?).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Response> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(DaemonError::Connection(
                "Daemon closed the connection".to_string(),
            ));
        }
        serde_json::from_str(line.trim_end())
            .map_err(|e| DaemonError::Framing(format!("Invalid response from daemon: {}", e)))
    }
}
