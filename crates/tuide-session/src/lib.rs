//! Action dispatch for tuide.
//!
//! Turns a user action (run, debug, test, a macro, or an ad-hoc template)
//! into a resolved command and runs it, streaming events back to the caller.

pub mod action;
pub mod dispatcher;
pub mod error;

pub use action::Action;
pub use dispatcher::{ActionEvent, ActionRequest, ActionRun, Dispatcher, PreparedAction};
pub use error::{ActionError, ActionResult};
