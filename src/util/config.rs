//! Global TOML configuration.
//!
//! Embedders load one config file at startup via [`init_config`]; the image
//! can then be opened with [`ImageFs::from_global_config`]
//! (see [`crate::image::ImageFs`]).
//!
//! ```toml
//! # polaris.toml
//! image_root = "/var/lib/polaris/image"
//! preview = false
//! ```

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Primary root directory of the module image.
    pub image_root: PathBuf,
    /// Enable the preview overlay merge.
    #[serde(default)]
    pub preview: bool,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Load and install the global configuration. Fails if the file cannot be
/// read or parsed, or if the configuration was already initialized.
pub fn init_config(path: impl AsRef<Path>) -> Result<(), String> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("read config {}: {e}", path.display()))?;
    let cfg: Config =
        toml::from_str(&content).map_err(|e| format!("parse config {}: {e}", path.display()))?;
    CONFIG
        .set(cfg)
        .map_err(|_| "config already initialized".to_string())
}

/// The installed global configuration.
pub fn get() -> Result<&'static Config, Error> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("config not initialized".to_string()))
}

pub fn image_root() -> Result<PathBuf, Error> {
    Ok(get()?.image_root.clone())
}

pub fn preview_enabled() -> Result<bool, Error> {
    Ok(get()?.preview)
}
