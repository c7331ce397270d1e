//! Command handlers.

pub mod act;
pub mod config_cmd;
pub mod models;
pub mod preview;
pub mod util;
