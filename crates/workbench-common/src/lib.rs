pub mod config;
pub mod workspace;

pub use config::WorkbenchConfig;
pub use workspace::WorkspaceContext;

pub type Result<T> = anyhow::Result<T>;
