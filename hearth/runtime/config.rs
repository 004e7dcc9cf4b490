use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use hearth_access::{NewMember, Policy, Role};
use hearth_backend::RemoteConfig;
use serde::Deserialize;
use shared_logging::LogLevel;

/// Overrides the remote base URL.
pub const ENV_API_BASE: &str = "HEARTH_API_BASE";
/// Overrides the device secret.
pub const ENV_DEVICE_SECRET: &str = "HEARTH_DEVICE_SECRET";

/// Runtime configuration, usually loaded from `hearth.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HearthConfig {
    /// Household server; absent means local only.
    #[serde(default)]
    pub remote: RemoteSection,
    /// In-process backend.
    #[serde(default)]
    pub local: LocalSection,
    /// Log and event sinks.
    #[serde(default)]
    pub telemetry: TelemetrySection,
    /// Admin session file.
    #[serde(default)]
    pub session: SessionSection,
    /// Activity history.
    #[serde(default)]
    pub activity: ActivitySection,
}

/// `[remote]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    /// API root; empty or absent disables the remote adapter.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Shared secret for device writes.
    #[serde(default)]
    pub device_secret: Option<String>,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            device_secret: None,
        }
    }
}

impl RemoteSection {
    /// Adapter settings when a base URL is configured.
    #[must_use]
    pub fn adapter_config(&self) -> Option<RemoteConfig> {
        let base_url = self.base_url.as_deref().map(str::trim)?;
        if base_url.is_empty() {
            return None;
        }
        Some(RemoteConfig {
            base_url: base_url.to_string(),
            timeout_ms: self.timeout_ms,
            device_secret: self.device_secret.clone(),
        })
    }
}

/// `[local]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalSection {
    /// JSON snapshot of the local store; in-memory only when absent.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Administrator created when the local store has none.
    #[serde(default)]
    pub seed_admin: Option<SeedAdmin>,
}

/// `[local.seed_admin]`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAdmin {
    /// Display name.
    pub name: String,
    /// Sign-in email.
    pub email: String,
    /// Sign-in PIN.
    pub pin: String,
}

impl SeedAdmin {
    /// Registration payload for the seed administrator, who owns the
    /// household and starts with every gate open.
    #[must_use]
    pub fn to_new_member(&self) -> NewMember {
        NewMember::new(&self.name, Role::Admin, &self.pin)
            .email(&self.email)
            .relation("owner")
            .policies(Policy::unrestricted())
    }
}

/// `[telemetry]`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySection {
    /// JSON-lines log file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// JSON-lines event file.
    #[serde(default)]
    pub event_log_path: Option<PathBuf>,
    /// Lowest level written to the log file.
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_path: None,
            event_log_path: None,
            min_level: default_min_level(),
        }
    }
}

/// `[session]`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// Where the admin session is persisted.
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

/// `[activity]`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivitySection {
    /// JSON-lines journal replayed on start; in-memory only when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Entries shown by default.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for ActivitySection {
    fn default() -> Self {
        Self {
            path: None,
            recent_limit: default_recent_limit(),
        }
    }
}

const fn default_timeout_ms() -> u64 {
    5_000
}

const fn default_min_level() -> LogLevel {
    LogLevel::Info
}

fn default_session_path() -> PathBuf {
    PathBuf::from("state/session.json")
}

const fn default_recent_limit() -> usize {
    20
}

impl HearthConfig {
    /// Loads configuration from a TOML file; relative paths are resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading hearth config {}", path.display()))?;
        let mut config = Self::parse(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_paths(&source_dir);
        Ok(config)
    }

    /// Parses TOML text without touching paths.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise, then applies the
    /// environment overrides.
    pub fn from_env_or_file(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies `HEARTH_API_BASE` and `HEARTH_DEVICE_SECRET` from `lookup`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base) = lookup(ENV_API_BASE) {
            self.remote.base_url = Some(base);
        }
        if let Some(secret) = lookup(ENV_DEVICE_SECRET) {
            self.remote.device_secret = Some(secret);
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.remote.timeout_ms == 0 {
            bail!("remote.timeout_ms must be positive");
        }
        if let Some(seed) = &self.local.seed_admin {
            seed.to_new_member()
                .validate()
                .context("local.seed_admin")?;
        }
        Ok(())
    }

    fn resolve_paths(&mut self, source_dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = source_dir.join(&*path);
            }
        };
        self.local.snapshot_path.iter_mut().for_each(resolve);
        self.telemetry.log_path.iter_mut().for_each(resolve);
        self.telemetry.event_log_path.iter_mut().for_each(resolve);
        self.activity.path.iter_mut().for_each(resolve);
        resolve(&mut self.session.path);
    }
}
