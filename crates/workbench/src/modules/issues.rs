//! `issues` module: issue tracker access

use super::provider_call;
use workbench_daemon::ProviderContext;
use workbench_sdk::{FieldSpec, Result, Router, Schema};

pub const MODULE: &str = "issues";
pub const PROVIDER_TYPE: &str = "issues";

pub fn router() -> Result<Router<ProviderContext>> {
    Ok(Router::builder(MODULE)
        .provider_type(PROVIDER_TYPE)
        .register(
            provider_call("issue.list")
                .input(Schema::object().field(FieldSpec::string("state").describe("open, closed or all")))
                .title("List issues")
                .idempotent(),
        )?
        .register(
            provider_call("issue.get")
                .input(Schema::object().field(FieldSpec::string("id").required().describe("Issue id")))
                .title("Get an issue")
                .idempotent(),
        )?
        .register(
            provider_call("issue.create")
                .input(
                    Schema::object()
                        .field(FieldSpec::string("title").required().describe("Issue title"))
                        .field(FieldSpec::string("body").describe("Issue body")),
                )
                .title("Create an issue"),
        )?
        .build())
}
