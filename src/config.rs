//! Configuration: the menu document, its file store, and process settings

mod document;
mod settings;
mod store;

pub use document::*;
pub use settings::Settings;
pub use store::JsonFileConfigStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
