pub mod config;
pub mod inspect;
pub mod utils;

pub use config::{handle_config_command, ConfigCommands};
