//! Workbench Daemon - one router, served over a local socket
//!
//! This crate provides:
//! - Provider registry (factory registration and extension-directory discovery)
//! - Dispatcher resolving the provider each module call needs
//! - Singleton lock arbitrating ownership of a workspace
//! - Newline-delimited JSON wire protocol, Unix-socket server and client
//! - Tracing initialisation shared with the CLI

pub mod client;
pub mod dispatch;
pub mod error;
pub mod lock;
pub mod logging;
pub mod protocol;
pub mod providers;
pub mod server;

pub use client::DaemonClient;
pub use dispatch::{Dispatched, Dispatcher, ProviderContext};
pub use error::{DaemonError, Result};
pub use lock::{LockOutcome, LockRecord, LockStatus, SingletonLock};
pub use providers::{MockProvider, ProviderKind, ProviderRegistry, ProviderRegistryBuilder};
pub use server::{Daemon, DaemonOptions, DaemonState, ListeningDaemon, Startup};
