//! Prelude module for convenient imports
//!
//! ```rust
//! use workbench_sdk::prelude::*;
//! ```

pub use crate::cli::{CliParam, CliShape};
pub use crate::contract::{ProcedureContract, ProcedureMeta};
pub use crate::error::{ErrorKind, FieldIssue, Result, RouterError};
pub use crate::provider::{ProviderManifest, ToolProvider};
pub use crate::router::{ProcedureDescription, Router, Service};
pub use crate::schema::{FieldKind, FieldSpec, Schema};
