//! CLI integration tests for `wb`
//!
//! These tests run the built `wb` binary, falling back to `cargo run`.

use cucumber::{World, given, then, when};
use integration_tests::{CliTestContext, CommandResult, cli_tests_available};
use std::time::Duration;

#[derive(Debug, Default, World)]
pub struct CliWorld {
    context: Option<CliTestContext>,
    last_result: Option<CommandResult>,
}

impl CliWorld {
    fn run(&mut self, args: &[&str]) {
        if let Some(context) = &self.context {
            match context.execute_cli_command(args) {
                Ok(result) => self.last_result = Some(result),
                Err(e) => panic!("Failed to execute CLI command: {}", e),
            }
        }
    }
}

#[given("I have a temporary workspace")]
fn given_temp_workspace(world: &mut CliWorld) {
    if !cli_tests_available() {
        return;
    }
    world.context = Some(CliTestContext::new().expect("Failed to create test context"));
}

#[given("the workspace config:")]
fn given_config(world: &mut CliWorld, step: &cucumber::gherkin::Step) {
    if let Some(context) = &world.context {
        let content = step.docstring().expect("Expected docstring with config");
        context.write_config(content).expect("Failed to write config");
    }
}

#[given(regex = r#"^a file "([^"]+)" with:$"#)]
fn given_file(world: &mut CliWorld, path: String, step: &cucumber::gherkin::Step) {
    if let Some(context) = &world.context {
        let content = step.docstring().expect("Expected docstring with file content");
        context.write_file(&path, content).expect("Failed to write file");
    }
}

#[given("a running daemon")]
fn given_running_daemon(world: &mut CliWorld) {
    if let Some(context) = world.context.as_mut() {
        context.start_daemon().expect("Failed to start daemon");
    }
}

#[when(regex = r#"^I run CLI command "([^"]+)"$"#)]
fn when_run_cli_command(world: &mut CliWorld, command: String) {
    let args: Vec<&str> = command.split_whitespace().collect();
    let args = if args.first() == Some(&"wb") {
        &args[1..]
    } else {
        &args[..]
    };
    world.run(args);
}

#[when(regex = r#"^I call "([^"]+)" through the daemon with input:$"#)]
fn when_call_through_daemon(world: &mut CliWorld, path: String, step: &cucumber::gherkin::Step) {
    let input = step.docstring().map(|s| s.trim().to_string()).unwrap_or_default();
    world.run(&["call", &path, "--input", &input]);
}

#[then("the CLI command should succeed")]
fn then_cli_should_succeed(world: &mut CliWorld) {
    if let Some(result) = &world.last_result {
        result.assert_success();
    }
}

#[then("the CLI command should fail")]
fn then_cli_should_fail(world: &mut CliWorld) {
    if let Some(result) = &world.last_result {
        result.assert_failure();
    }
}

#[then(regex = r#"^the output should contain "([^"]+)"$"#)]
fn then_output_contains(world: &mut CliWorld, text: String) {
    if let Some(result) = &world.last_result {
        result.assert_output_contains(&text);
    }
}

#[then(regex = r#"^the JSON field "([^"]+)" should be "([^"]*)"$"#)]
fn then_json_field(world: &mut CliWorld, pointer: String, expected: String) {
    if let Some(result) = &world.last_result {
        let value = result.json().expect("stdout is not JSON");
        let actual = value
            .pointer(&pointer)
            .unwrap_or_else(|| panic!("no field at {pointer} in {value}"));
        let actual = match actual {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        assert_eq!(actual, expected);
    }
}

#[then(regex = r#"^the file "([^"]+)" should have (\d+) lines?$"#)]
fn then_file_line_count(world: &mut CliWorld, path: String, expected: usize) {
    if let Some(context) = &world.context {
        let content = context.read_file(&path).unwrap_or_default();
        assert_eq!(content.lines().count(), expected, "{path}:\n{content}");
    }
}

#[then(regex = r#"^the daemon log should contain "([^"]+)"$"#)]
fn then_daemon_log_contains(world: &mut CliWorld, text: String) {
    if let Some(context) = &world.context {
        let found = context
            .wait_for_daemon_log(&text, Duration::from_secs(5))
            .expect("Failed to read daemon log");
        let log = context.daemon_log().unwrap_or_default();
        assert!(found, "daemon log does not contain {text:?}:\n{log}");
    }
}

#[then("the daemon should exit and remove its files")]
fn then_daemon_exits(world: &mut CliWorld) {
    if let Some(context) = world.context.as_mut() {
        let exited = context
            .wait_for_daemon_exit(Duration::from_secs(10))
            .expect("Failed to wait for daemon");
        assert!(exited, "daemon is still running");
        assert!(!context.socket_path().expect("socket path").exists());
        assert!(!context.lock_path().expect("lock path").exists());
    }
}

#[tokio::main]
async fn main() {
    CliWorld::cucumber()
        .max_concurrent_scenarios(1)
        .filter_run("tests/features", |feature, _rule, _scenario| {
            !feature.tags.iter().any(|t| t == "wip")
        })
        .await;
}
