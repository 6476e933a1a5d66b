//! Command runners for tuide.
//!
//! Provides the local runner, which executes resolved command lines as
//! child processes through the platform shell or directly.

pub mod local;
pub mod split;

pub use local::LocalRunner;
pub use tuide_core::runner::{
    CommandSpec, ExecMode, ExitOutcome, OutputChunk, OutputSink, OutputStream, RunHandle, Runner,
};
