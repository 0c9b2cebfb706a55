//! # noteweave-cli
//!
//! The `noteweave` command: add markdown notes, ask questions about them,
//! search, inspect relationships, and back the knowledge base up.
//!
//! ```text
//! noteweave add ~/notes --recursive
//! noteweave ask "How does borrowing work?" --highlight --confidence
//! noteweave --provider mock search "ownership"
//! ```

pub mod app;
pub mod cli;
pub mod commands;
pub mod telemetry;

pub use app::App;
pub use cli::{Cli, Command, Settings};
