use std::{fs, path::Path};

use serde::Deserialize;

/// Names the generated commands are rendered against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub namespace: String,
    pub objective: String,
    pub storage: String,
    pub optimize: bool,
    /// Function names kept alive by the engine itself, next to `main`.
    pub hooks: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "mcscript".into(),
            objective: "mcscript".into(),
            storage: "main".into(),
            optimize: true,
            hooks: vec!["init".into(), "onTick".into()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid json in `{path}`: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Reads a JSON document from disk, attaching the path to any failure.
pub(crate) fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    pub fn is_root(&self, name: &str) -> bool {
        name == "main" || self.hooks.iter().any(|h| h == name)
    }
}
