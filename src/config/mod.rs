//! Configuration module for the Factorio controller.
//!
//! This module handles parsing, validation, and access to configuration
//! settings for the supervised servers. Configurations load from JSON or YAML
//! files or strings, and every server slot's directory layout is derived from
//! them through [`ServerPaths`].
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use factorio_controller::config::Config;
//!
//! let config = Config::from_file("controller.json").unwrap();
//! println!("Loaded configuration with {} servers", config.servers.len());
//! ```
//!
//! Resolving a server's directory layout:
//!
//! ```
//! use factorio_controller::config::{Config, ServerPaths};
//!
//! let config = Config::parse_from_str(r#"{
//!     "rootDirectory": "/srv/factorio",
//!     "wrapperExecutable": "/srv/factorio/wrapper",
//!     "scenarioDirectory": "/srv/factorio/scenarios",
//!     "modDirectory": "/srv/factorio/mods",
//!     "servers": { "7": { "port": 34203 } }
//! }"#).unwrap();
//!
//! let paths = ServerPaths::new(&config, "7");
//! assert!(paths.temp_saves.ends_with("7/saves"));
//! ```
mod parser;
mod paths;
pub mod validator;

pub use parser::{Config, ServerConfig, ServerExtraSettings};
pub use paths::{
    GLOBAL_SAVES_DIRECTORY, LOCAL_SAVES_DIRECTORY, ServerPaths, TEMP_SAVES_DIRECTORY,
};
pub use validator::validate_config;
