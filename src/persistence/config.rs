//! Persisted application configuration and partial updates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths::default_download_dir;

/// Default number of simultaneous transfers on the daemon.
pub const DEFAULT_MAX_CONCURRENT: u32 = 3;

/// Default global speed limit in bytes per second (0 = unlimited).
pub const DEFAULT_MAX_GLOBAL_SPEED: u64 = 0;

/// Color scheme preference for presentation layers.
///
/// Unknown values read as [`Theme::System`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl From<String> for Theme {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "light" => Self::Light,
            "dark" => Self::Dark,
            _ => Self::System,
        }
    }
}

impl From<Theme> for String {
    fn from(theme: Theme) -> Self {
        theme.as_str().to_string()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(format!("invalid theme: {s} (expected system, light or dark)")),
        }
    }
}

/// The config document. Missing keys take their defaults; unknown keys are
/// kept so a newer writer's settings survive a rewrite by this version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Directory new downloads are saved to.
    #[serde(alias = "default_path")]
    pub default_path: PathBuf,
    #[serde(alias = "max_concurrent")]
    pub max_concurrent: u32,
    /// Bytes per second, 0 for unlimited.
    #[serde(alias = "max_global_speed")]
    pub max_global_speed: u64,
    pub theme: Theme,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_path: default_download_dir(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_global_speed: DEFAULT_MAX_GLOBAL_SPEED,
            theme: Theme::default(),
            extra: serde_json::Map::new(),
        }
    }
}

impl AppConfig {
    /// Returns a copy with every key present in `patch` replaced.
    #[must_use]
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        let mut merged = self.clone();
        if let Some(path) = &patch.default_path {
            merged.default_path.clone_from(path);
        }
        if let Some(max_concurrent) = patch.max_concurrent {
            merged.max_concurrent = max_concurrent;
        }
        if let Some(max_global_speed) = patch.max_global_speed {
            merged.max_global_speed = max_global_speed;
        }
        if let Some(theme) = patch.theme {
            merged.theme = theme;
        }
        merged
    }
}

/// A partial config update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    pub default_path: Option<PathBuf>,
    pub max_concurrent: Option<u32>,
    pub max_global_speed: Option<u64>,
    pub theme: Option<Theme>,
}

impl ConfigPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
