//! Core domain types and traits for the tuide command engine.
//!
//! This crate contains:
//! - Run identifiers
//! - The per-invocation execution context
//! - Workspace tracking (open files, active file)
//! - The runner contract: command specs, output chunks, exit outcomes

pub mod context;
pub mod error;
pub mod id;
pub mod runner;
pub mod workspace;

pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use id::RunId;
pub use workspace::Workspace;
