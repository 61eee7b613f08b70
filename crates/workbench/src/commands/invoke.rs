//! `wb invoke <module>.<procedure> [args]`
//!
//! Failures are printed as `<module>.<procedure>: [<kind>] <message>`.

use super::{fail, print_json};
use crate::app::Workbench;
use crate::materialize::{self, ArgsError};
use starbase::AppResult;
use std::path::Path;
use tracing::debug;
use workbench_daemon::Dispatcher;
use workbench_sdk::RouterError;

pub async fn run_invoke(
    start_dir: &Path,
    full_path: &str,
    provider: Option<String>,
    args: &[String],
) -> AppResult {
    let app = match Workbench::load(start_dir, provider) {
        Ok(app) => app,
        Err(e) => return fail(format!("{}: {:#}", full_path, e)),
    };
    let dispatcher = &app.dispatcher;

    let (module, path) = match Dispatcher::split_path(full_path) {
        Ok(parts) => parts,
        Err(e) => return fail(unknown_procedure(dispatcher, full_path, &e)),
    };
    let Some(description) = dispatcher
        .router(module)
        .and_then(|router| router.describe().into_iter().find(|d| d.path == path))
    else {
        return fail(unknown_procedure(
            dispatcher,
            full_path,
            &RouterError::UnknownProcedure(full_path.to_string()),
        ));
    };

    let input = match materialize::parse_input(full_path, &description, args) {
        Ok(input) => input,
        Err(ArgsError::Clap(e)) => {
            let code = if e.use_stderr() { Some(1) } else { None };
            let _ = e.print();
            return Ok(code);
        }
        Err(ArgsError::Usage(e)) => return fail(format!("{}: {}", full_path, e)),
    };
    debug!(path = full_path, input = %input, "Invoking procedure");

    match dispatcher.dispatch(module, path, input, None).await {
        Ok(dispatched) => print_json(&dispatched),
        Err(e @ RouterError::UnknownProcedure(_)) => {
            fail(unknown_procedure(dispatcher, full_path, &e))
        }
        Err(e) => fail(procedure_error(full_path, &e)),
    }
}

fn procedure_error(full_path: &str, err: &RouterError) -> String {
    format!("{}: [{}] {}", full_path, err.kind(), err)
}

/// Error text listing what is callable instead
fn unknown_procedure(dispatcher: &Dispatcher, full_path: &str, err: &RouterError) -> String {
    let module = full_path.split('.').next().unwrap_or_default();
    let available = dispatcher.available(module);
    if available.is_empty() {
        let modules: Vec<&str> = dispatcher.modules().map(|r| r.name()).collect();
        format!(
            "{}\nAvailable modules: {}",
            procedure_error(full_path, err),
            modules.join(", ")
        )
    } else {
        let paths: Vec<String> = available
            .iter()
            .map(|p| format!("{}.{}", module, p))
            .collect();
        format!(
            "{}\nAvailable procedures: {}",
            procedure_error(full_path, err),
            paths.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_name_the_procedure_and_kind() {
        let err = RouterError::handler("Pull request #999 not found");
        assert_eq!(
            procedure_error("ci.pr.get", &err),
            "ci.pr.get: [handler] Pull request #999 not found"
        );
    }
}
