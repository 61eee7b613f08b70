//! Procedure contracts: schemas, metadata and a handler under one path

use crate::error::{Result, RouterError};
use crate::schema::Schema;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a type-erased handler
pub type HandlerFuture = BoxFuture<'static, Result<Value>>;

/// Type-erased handler over JSON values and a per-call context
pub type Handler<C> = Arc<dyn Fn(Value, C) -> HandlerFuture + Send + Sync>;

/// A worked example attached to a procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureExample {
    pub description: String,
    pub input: Value,
}

/// Descriptive metadata; nothing here changes how a call executes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureMeta {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Advisory deadline; only enforced where a transport opts in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ProcedureExample>,
}

/// A named, schema-typed operation
pub struct ProcedureContract<C> {
    path: String,
    input: Schema,
    output: Schema,
    meta: ProcedureMeta,
    tool: Option<String>,
    handler: Handler<C>,
}

impl<C> Clone for ProcedureContract<C> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            meta: self.meta.clone(),
            tool: self.tool.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C> fmt::Debug for ProcedureContract<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureContract")
            .field("path", &self.path)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("meta", &self.meta)
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl<C: Send + 'static> ProcedureContract<C> {
    /// Create a contract over raw JSON values
    ///
    /// The input schema defaults to an empty object and the output schema
    /// to [`Schema::Any`].
    pub fn new<F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let path = path.into();
        let handler: Handler<C> =
            Arc::new(move |input: Value, ctx: C| -> HandlerFuture { Box::pin(handler(input, ctx)) });
        Self {
            meta: ProcedureMeta {
                title: path.clone(),
                ..Default::default()
            },
            path,
            input: Schema::object(),
            output: Schema::any(),
            tool: None,
            handler,
        }
    }

    /// Create a contract whose handler works on typed input and output
    ///
    /// Input that passes the schema but fails to deserialize into `I` is
    /// reported as a validation error before the handler runs.
    pub fn typed<I, O, F, Fut>(path: impl Into<String>, handler: F) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(I, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let path = path.into();
        let handler = Arc::new(handler);
        let error_path = path.clone();
        Self::new(path, move |input: Value, ctx: C| {
            let handler = Arc::clone(&handler);
            let path = error_path.clone();
            async move {
                let input: I = serde_json::from_value(input).map_err(|e| {
                    RouterError::validation(path, crate::error::FieldIssue::new("", e.to_string()))
                })?;
                let output = handler(input, ctx).await?;
                Ok(serde_json::to_value(output)?)
            }
        })
    }
}

impl<C> ProcedureContract<C> {
    pub fn input(mut self, schema: Schema) -> Self {
        self.input = schema;
        self
    }

    pub fn output(mut self, schema: Schema) -> Self {
        self.output = schema;
        self
    }

    pub fn meta(mut self, meta: ProcedureMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = description.into();
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.meta.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.meta.idempotent = true;
        self
    }

    pub fn example(mut self, description: impl Into<String>, input: Value) -> Self {
        self.meta.examples.push(ProcedureExample {
            description: description.into(),
            input,
        });
        self
    }

    /// Name the provider tool this procedure needs
    pub fn requires_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Re-root the contract under `prefix`
    pub(crate) fn prefixed(mut self, prefix: &str) -> Self {
        self.path = format!("{}.{}", prefix, self.path);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output
    }

    pub fn get_meta(&self) -> &ProcedureMeta {
        &self.meta
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    /// Apply defaults and check the input against the input schema
    pub fn validate_input(&self, input: Value) -> Result<Value> {
        let input = self.input.apply_defaults(input);
        self.input
            .validate(&input)
            .map_err(|issues| RouterError::Validation {
                path: self.path.clone(),
                issues,
            })?;
        Ok(input)
    }

    /// Run the handler on already-validated input and check its output
    pub async fn invoke(&self, input: Value, ctx: C) -> Result<Value> {
        let output = (self.handler)(input, ctx).await?;
        self.output
            .validate(&output)
            .map_err(|issues| RouterError::OutputValidation {
                path: self.path.clone(),
                issues,
            })?;
        Ok(output)
    }

    /// Validate, run and check the output in one step
    pub async fn call(&self, input: Value, ctx: C) -> Result<Value> {
        let input = self.validate_input(input)?;
        self.invoke(input, ctx).await
    }
}
