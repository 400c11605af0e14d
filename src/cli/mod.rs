//! CLI modules for key management and file commands

pub mod commands;
pub mod key_manager;

pub use commands::*;
pub use key_manager::KeyManager;
