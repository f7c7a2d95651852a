//! Catalog configuration, loadable from a JSON file.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::filter::DateLocale;
use crate::runtime::handle::RuntimeConfig;
use crate::undo::UndoConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings for opening a [`Catalog`](crate::catalog::Catalog) and spawning
/// its runtime. Missing keys take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub undo: UndoConfig,
    pub date_locale: DateLocale,
    pub runtime: RuntimeConfig,
}

impl CatalogConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config =
            CatalogConfig::from_json(r#"{"undo": {"max_undo_levels": 5}}"#).expect("parse");
        assert_eq!(config.undo.max_undo_levels, 5);
        assert_eq!(config.undo.reset_undo_at, UndoConfig::default().reset_undo_at);
        assert_eq!(config.date_locale, DateLocale::default());
        assert_eq!(
            config.runtime.command_queue_bound,
            RuntimeConfig::default().command_queue_bound
        );
    }

    #[test]
    fn reads_locale_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("libris.json");
        std::fs::write(
            &path,
            concat!(
                r#"{"date_locale": {"short_date": "%Y-%m-%d", "#,
                r#""month_year": "%Y-%m", "utc_offset_minutes": 60}}"#,
            ),
        )
        .expect("write");
        let config = CatalogConfig::from_path(&path).expect("load");
        assert_eq!(config.date_locale, DateLocale::iso().with_utc_offset(60));
    }
}
