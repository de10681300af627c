//! Message types exchanged between the shell and the App actor.

pub mod commands;
pub mod events;

pub use commands::{parse_command, Command, RecipeFields};
pub use events::Event;
