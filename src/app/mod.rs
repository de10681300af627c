//! App layer - command processing and rendering
//!
//! The App actor receives parsed shell commands, runs them against the
//! stores, and emits events the shell renders as text.

pub mod actor;
pub mod render;

pub use actor::AppActor;
pub use render::render;
