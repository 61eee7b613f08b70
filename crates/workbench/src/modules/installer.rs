//! `installer` module: plan and apply workspace tooling installs

use super::provider_call;
use workbench_daemon::ProviderContext;
use workbench_sdk::{FieldSpec, Result, Router, Schema};

pub const MODULE: &str = "installer";
pub const PROVIDER_TYPE: &str = "installer";

pub fn router() -> Result<Router<ProviderContext>> {
    Ok(Router::builder(MODULE)
        .provider_type(PROVIDER_TYPE)
        .register(
            provider_call("plan")
                .title("Plan installation")
                .description("List the steps an apply would run")
                .idempotent(),
        )?
        .register(
            provider_call("apply")
                .input(
                    Schema::object().field(
                        FieldSpec::boolean("dryRun")
                            .describe("Report the steps without running them")
                            .with_default(serde_json::Value::Bool(false)),
                    ),
                )
                .title("Apply installation")
                .timeout_ms(300_000),
        )?
        .build())
}
