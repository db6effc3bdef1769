//! Configuration parsing for sway-focus
//!
//! This crate parses the KDL configuration of the focus watcher: global
//! options plus the focus rules that map an application to a sway command.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{parse_config, parse_config_str};
