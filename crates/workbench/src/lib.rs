//! Workbench CLI library
//!
//! This library exposes the `wb` commands and built-in modules for
//! programmatic use and testing.

pub mod app;
pub mod commands;
pub mod help;
pub mod materialize;
pub mod modules;

pub use app::Workbench;
