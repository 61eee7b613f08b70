use super::{fail, print_json};
use crate::app::Workbench;
use crate::help::render_providers;
use starbase::AppResult;
use std::path::Path;

/// List registered providers and any that failed to load
pub fn run_providers(start_dir: &Path, json: bool) -> AppResult {
    let app = match Workbench::load(start_dir, None) {
        Ok(app) => app,
        Err(e) => return fail(format!("{:#}", e)),
    };
    let registry = app.dispatcher.registry();
    if json {
        return print_json(&serde_json::json!({
            "providers": registry.list(),
            "failures": registry.report().failures,
        }));
    }
    print!("{}", render_providers(&registry.list(), registry.report()));
    Ok(None)
}
