use super::{fail, print_json};
use crate::app::Workbench;
use crate::help::render_procedures;
use starbase::AppResult;
use std::path::Path;
use workbench_sdk::Service;

/// List every procedure with its derived CLI usage
pub fn run_procedures(start_dir: &Path, json: bool) -> AppResult {
    let app = match Workbench::load(start_dir, None) {
        Ok(app) => app,
        Err(e) => return fail(format!("{:#}", e)),
    };
    if json {
        return print_json(&app.dispatcher.describe());
    }
    print!("{}", render_procedures(&app.dispatcher));
    Ok(None)
}
