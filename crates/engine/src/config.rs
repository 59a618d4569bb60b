//! Editor configuration (`stonebystone.toml`).
//!
//! Every field has a default and a missing file means all defaults.
//!
//! ```toml
//! [identity]
//! user = "Anonymous"
//!
//! [exchange]
//! schema_version = "1.0.0"
//! pretty = true
//!
//! [defaults]
//! road_color = "#9ca3af"
//!
//! [grid]
//! allow_conflicting_resize = true
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use stonebystone_core::{DEFAULT_ROAD_COLOR, SCHEMA_VERSION};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditorConfig {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub grid: GridConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Written to `modified_by` on every edit.
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { user: default_user() }
    }
}

fn default_user() -> String {
    "Anonymous".to_owned()
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    /// Stamped on new and exported datasets.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            pretty: default_pretty(),
        }
    }
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_owned()
}

const fn default_pretty() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    #[serde(default = "default_road_color")]
    pub road_color: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            road_color: default_road_color(),
        }
    }
}

fn default_road_color() -> String {
    DEFAULT_ROAD_COLOR.to_owned()
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    /// When false, committing a resize that left elements out of bounds fails.
    #[serde(default = "default_allow_conflicting_resize")]
    pub allow_conflicting_resize: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            allow_conflicting_resize: default_allow_conflicting_resize(),
        }
    }
}

const fn default_allow_conflicting_resize() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub path: Option<std::path::PathBuf>,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl EditorConfig {
    /// Reads `path`; a file that does not exist yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start].matches('\n').count() + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError { path: None, message }
        })
    }
}
