//! CLI subcommand implementations.

pub mod clear;
pub mod export;
pub mod import;
pub mod message;
pub mod push;
pub mod resume;
pub mod status;
pub mod stop;
pub mod toggle;
pub mod util;
