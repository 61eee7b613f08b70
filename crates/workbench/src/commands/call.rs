//! `wb call <path> [--input JSON]`: call through the running daemon

use super::{fail, print_json};
use serde_json::Value;
use starbase::AppResult;
use std::path::Path;
use workbench_common::WorkspaceContext;
use workbench_daemon::{DaemonClient, DaemonError};

pub async fn run_call(start_dir: &Path, path: &str, input: Option<String>) -> AppResult {
    let input = match input.as_deref() {
        None => Value::Null,
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(e) => return fail(format!("--input is not valid JSON: {}", e)),
        },
    };
    let workspace = match WorkspaceContext::discover(start_dir) {
        Ok(workspace) => workspace,
        Err(e) => return fail(format!("{:#}", e)),
    };

    let mut client = match DaemonClient::connect(&workspace.socket_path()).await {
        Ok(client) => client,
        Err(_) => return fail("Daemon is not running; start it with `wb daemon start`"),
    };
    match client.call(path, input).await {
        Ok(result) => print_json(&result),
        Err(DaemonError::Remote { kind, message }) => fail(format!("[{}] {}", kind, message)),
        Err(e) => fail(e),
    }
}
