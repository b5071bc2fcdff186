//! `courier` command-line front end.

pub mod cli;
pub mod commands;
pub mod contacts;
pub mod logging;
pub mod prompt;
pub mod settings;
pub mod summary;
