//! `ci` module: pull requests and pipeline runs

use super::provider_call;
use workbench_daemon::ProviderContext;
use workbench_sdk::{FieldSpec, Result, Router, Schema};

pub const MODULE: &str = "ci";
pub const PROVIDER_TYPE: &str = "ci";

pub fn router() -> Result<Router<ProviderContext>> {
    Ok(Router::builder(MODULE)
        .provider_type(PROVIDER_TYPE)
        .register(
            provider_call("pr.list")
                .input(
                    Schema::object()
                        .field(FieldSpec::string("state").describe("open, closed or all"))
                        .field(FieldSpec::integer("limit").describe("Maximum number of results")),
                )
                .title("List pull requests")
                .idempotent(),
        )?
        .register(
            provider_call("pr.get")
                .input(
                    Schema::object().field(
                        FieldSpec::integer("number")
                            .required()
                            .describe("Pull request number"),
                    ),
                )
                .title("Get a pull request")
                .idempotent()
                .example("Fetch pull request 42", serde_json::json!({"number": 42})),
        )?
        .register(
            provider_call("run.list")
                .input(Schema::object().field(FieldSpec::string("branch").describe("Only runs for this branch")))
                .title("List pipeline runs")
                .idempotent(),
        )?
        .build())
}
