/// Catalog seed file loading from TOML
pub mod catalog;

/// Database configuration and connection management
pub mod database;

/// Application settings from `nutrisport.toml` and the environment
pub mod settings;
