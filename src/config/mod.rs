//! Configuration management
//!
//! Node settings with defaults, environment overrides and an optional
//! TOML file.

pub mod settings;

pub use settings::Config;
