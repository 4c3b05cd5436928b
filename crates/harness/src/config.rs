//! Harness configuration

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// Environment variable that switches the harness into update mode.
pub const UPDATE_ENV: &str = "UPDATE";

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory holding one subdirectory per test group
    pub root: PathBuf,

    /// Name of the rendering implementation under test
    pub implementation: String,

    /// Optional allow-list of group names
    pub tests: Option<Vec<String>>,

    /// Per-test watchdog in seconds
    pub watchdog: f64,

    /// Update mode: the renderer rewrites reference fixtures, no report is produced
    pub update: bool,

    /// Report template file name, relative to `root`
    pub template: String,

    /// Report output file name, relative to `root`
    pub index: String,

    /// Fixture server configuration
    pub fixture: FixtureConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("tests/render"),
            implementation: "native".to_string(),
            tests: None,
            watchdog: 20.0,
            update: false,
            template: "results.html.tmpl".to_string(),
            index: "index.html".to_string(),
            fixture: FixtureConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Turn on update mode when `UPDATE` is set to a non-empty value.
    pub fn with_update_from_env(mut self) -> Self {
        if std::env::var_os(UPDATE_ENV).is_some_and(|v| !v.is_empty()) {
            self.update = true;
        }
        self
    }

    /// The watchdog as a duration. Negative, NaN and unrepresentably large
    /// values are rejected.
    pub fn watchdog(&self) -> HarnessResult<Duration> {
        Duration::try_from_secs_f64(self.watchdog).map_err(|e| {
            HarnessError::InvalidConfig(format!("watchdog of {} seconds: {}", self.watchdog, e))
        })
    }

    pub fn template_path(&self) -> PathBuf {
        self.root.join(&self.template)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index)
    }

    /// Whether a group passes the allow-list
    pub fn selects(&self, group: &str) -> bool {
        self.tests
            .as_ref()
            .map_or(true, |tests| tests.iter().any(|t| t == group))
    }
}

/// Configuration for the local fixture server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Directory served as static files
    pub root: PathBuf,

    /// Host name written into localized URLs
    pub host: String,

    /// Address the listener binds to
    pub bind: IpAddr,

    /// Port to listen on
    pub port: u16,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: "localhost".to_string(),
            bind: IpAddr::from([127, 0, 0, 1]),
            port: 2900,
        }
    }
}

impl FixtureConfig {
    /// Base URL that `local://` URLs are rewritten to, with a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}
