pub use spritesync::*;

pub mod cli;
pub mod commands;
pub mod project;
pub mod project_watch;

pub use project::ModDirectory;
