//! Workbench SDK
//!
//! Typed procedure contracts and the router that serves them. One contract
//! definition is reachable from in-process code, from the `wb` command line
//! and from the local daemon socket.
//!
//! # Quick Start
//!
//! ```rust
//! use workbench_sdk::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> workbench_sdk::Result<()> {
//! let router = Router::builder("workspace")
//!     .register(
//!         ProcedureContract::new("echo", |input, _ctx: ()| async move { Ok(input) })
//!             .input(Schema::object().field(FieldSpec::string("text").required()))
//!             .idempotent(),
//!     )?
//!     .build();
//!
//! let out = router.call("echo", json!({"text": "hi"}), ()).await?;
//! assert_eq!(out, json!({"text": "hi"}));
//! # Ok(())
//! # }
//! ```
//!
//! # Layers
//!
//! - **schema**: `FieldSpec` descriptors read by both validation and CLI generation
//! - **contract**: a path, two schemas, metadata and an async handler
//! - **router**: immutable path -> contract mapping plus the `Service` seam
//! - **cli**: positional/flag partition derived from an input schema
//! - **provider**: provider manifests and the `ToolProvider` trait

pub mod cli;
pub mod contract;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod router;
pub mod schema;

// Re-exports
pub use cli::{CliParam, CliShape, CliUsageError};
pub use contract::{ProcedureContract, ProcedureExample, ProcedureMeta};
pub use error::{ErrorKind, FieldIssue, Result, RouterError};
pub use provider::{ProviderManifest, ToolProvider};
pub use router::{ContextRouter, ProcedureDescription, Router, RouterBuilder, Service};
pub use schema::{FieldKind, FieldSpec, Schema};
