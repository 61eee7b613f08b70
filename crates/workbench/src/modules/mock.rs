//! Built-in `mock` providers with deterministic data
//!
//! They make every module callable in a fresh workspace. The `issues` mock is
//! read-only: it does not declare `issue.create`.

use super::{ci, installer, issues};
use serde_json::{Value, json};
use workbench_daemon::{MockProvider, ProviderKind, ProviderRegistryBuilder};
use workbench_sdk::RouterError;

pub const MOCK: &str = "mock";

fn pull_requests() -> Vec<Value> {
    vec![
        json!({"number": 42, "title": "Add provider discovery", "state": "open", "branch": "feat/discovery"}),
        json!({"number": 41, "title": "Fix lock cleanup", "state": "closed", "branch": "fix/lock"}),
        json!({"number": 40, "title": "Document the wire format", "state": "open", "branch": "docs/wire"}),
    ]
}

fn runs() -> Vec<Value> {
    vec![
        json!({"id": 7, "branch": "feat/discovery", "status": "success"}),
        json!({"id": 6, "branch": "fix/lock", "status": "failure"}),
    ]
}

fn issue_list() -> Vec<Value> {
    vec![
        json!({"id": "WB-1", "title": "Daemon ignores SIGTERM", "state": "closed"}),
        json!({"id": "WB-2", "title": "Support linked repos", "state": "open"}),
    ]
}

fn field_matches(item: &Value, field: &str, wanted: Option<&str>) -> bool {
    match wanted {
        None | Some("all") => true,
        Some(wanted) => item[field] == wanted,
    }
}

pub fn ci_provider() -> MockProvider {
    MockProvider::new(ci::PROVIDER_TYPE, MOCK)
        .with_capability("pull-requests")
        .with_capability("runs")
        .with_responder("pr.list", |input| {
            let limit = input["limit"].as_u64().map_or(usize::MAX, |n| n as usize);
            let prs: Vec<Value> = pull_requests()
                .into_iter()
                .filter(|pr| field_matches(pr, "state", input["state"].as_str()))
                .take(limit)
                .collect();
            Ok(Value::Array(prs))
        })
        .with_responder("pr.get", |input| {
            let number = &input["number"];
            pull_requests()
                .into_iter()
                .find(|pr| &pr["number"] == number)
                .ok_or_else(|| RouterError::handler(format!("Pull request #{} not found", number)))
        })
        .with_responder("run.list", |input| {
            let runs: Vec<Value> = runs()
                .into_iter()
                .filter(|run| field_matches(run, "branch", input["branch"].as_str()))
                .collect();
            Ok(Value::Array(runs))
        })
}

pub fn issues_provider() -> MockProvider {
    MockProvider::new(issues::PROVIDER_TYPE, MOCK)
        .with_responder("issue.list", |input| {
            let issues: Vec<Value> = issue_list()
                .into_iter()
                .filter(|issue| field_matches(issue, "state", input["state"].as_str()))
                .collect();
            Ok(Value::Array(issues))
        })
        .with_responder("issue.get", |input| {
            let id = &input["id"];
            issue_list()
                .into_iter()
                .find(|issue| &issue["id"] == id)
                .ok_or_else(|| RouterError::handler(format!("Issue {} not found", id)))
        })
}

pub fn installer_provider() -> MockProvider {
    let steps = json!([
        {"step": "toolchain", "action": "verify"},
        {"step": "hooks", "action": "install"},
    ]);
    let plan = steps.clone();
    MockProvider::new(installer::PROVIDER_TYPE, MOCK)
        .with_tool("plan", json!({"steps": plan}))
        .with_responder("apply", move |input| {
            let dry_run = input["dryRun"].as_bool().unwrap_or(false);
            Ok(json!({"dryRun": dry_run, "applied": if dry_run { json!([]) } else { steps.clone() }}))
        })
}

/// Register the mock factories under `(<type>, "mock")`
pub fn register(builder: ProviderRegistryBuilder) -> ProviderRegistryBuilder {
    builder
        .register_factory(ci::PROVIDER_TYPE, MOCK, || Ok(ProviderKind::Mock(ci_provider())))
        .register_factory(issues::PROVIDER_TYPE, MOCK, || {
            Ok(ProviderKind::Mock(issues_provider()))
        })
        .register_factory(installer::PROVIDER_TYPE, MOCK, || {
            Ok(ProviderKind::Mock(installer_provider()))
        })
}
