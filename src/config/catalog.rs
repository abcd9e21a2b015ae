//! Catalog seed file loading.
//!
//! The catalog file lists products as `[[products]]` tables. Products are
//! inserted on start when their id is not in the database yet; see
//! [`crate::core::product::seed_catalog`].

use crate::core::product::NewProduct;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Structure of the catalog file
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Products to seed
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

/// Parses a catalog from TOML text, validating every entry.
pub fn parse_catalog(contents: &str) -> Result<CatalogConfig> {
    let catalog: CatalogConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog: {e}"),
    })?;
    for product in &catalog.products {
        product.validate()?;
    }
    Ok(catalog)
}

/// Loads the catalog from a TOML file.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid or required fields are missing
/// - An entry fails product validation
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file: {e}"),
    })?;
    parse_catalog(&contents)
}
