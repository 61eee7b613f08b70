//! Built-in procedure modules of the `wb` binary
//!
//! Each module is a router named after the module. Provider-backed modules
//! declare their provider type and forward to the resolved provider's tool
//! of the same name.

pub mod ci;
pub mod installer;
pub mod issues;
pub mod mock;
pub mod workspace;

use workbench_common::WorkspaceContext;
use workbench_daemon::ProviderContext;
use workbench_sdk::{ProcedureContract, Result, Router};

/// Contract whose handler forwards the input to the provider tool `path`
pub(crate) fn provider_call(path: &'static str) -> ProcedureContract<ProviderContext> {
    ProcedureContract::new(path, move |input, ctx: ProviderContext| async move {
        ctx.call_tool(path, input).await
    })
    .requires_tool(path)
}

/// Every built-in module, in the order they are listed
pub fn builtin(workspace: &WorkspaceContext) -> Result<Vec<Router<ProviderContext>>> {
    Ok(vec![
        workspace::router(workspace)?,
        ci::router()?,
        issues::router()?,
        installer::router()?,
    ])
}
