//! Test-run configuration snapshot.
//!
//! Values are looked up by dotted key path (`Auth.AdminUsername`) in a JSON
//! document. `BaseUrl` is mandatory; everything else has a default. Numbers
//! may be written either as JSON numbers or as numeric strings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::error::ConfigError;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Immutable configuration resolved once per test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfig {
    pub base_url: String,
    pub admin_username: String,
    pub admin_password: String,
    pub timeout_seconds: u64,
    /// Read and exposed for collaborators; the client never retries.
    pub retry_count: u32,
    pub logs_dir: PathBuf,
    pub attachments_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl TestConfig {
    pub fn from_value(root: &Value) -> Result<Self, ConfigError> {
        let base_url = lookup_str(root, "BaseUrl")?
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                key: "BaseUrl".to_string(),
            })?;

        Ok(Self {
            base_url,
            admin_username: lookup_str(root, "Auth.AdminUsername")?
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password: lookup_str(root, "Auth.AdminPassword")?
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            timeout_seconds: lookup_number(root, "TestSettings.TimeoutSeconds")?
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            retry_count: lookup_number(root, "TestSettings.RetryCount")?
                .unwrap_or(DEFAULT_RETRY_COUNT),
            logs_dir: lookup_str(root, "Paths.Logs")?
                .unwrap_or_else(|| "TestLogs".to_string())
                .into(),
            attachments_dir: lookup_str(root, "Paths.Attachments")?
                .unwrap_or_else(|| "allure-results".to_string())
                .into(),
            report_dir: lookup_str(root, "Paths.Report")?
                .unwrap_or_else(|| "allure-report".to_string())
                .into(),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(json).map_err(|e| ConfigError::Unreadable {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(&root)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let unreadable = |message: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let root: Value = serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))?;
        Self::from_value(&root)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Walk a dotted key path. A missing segment yields `None`.
pub fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
        .filter(|value| !value.is_null())
}

fn lookup_str(root: &Value, key: &str) -> Result<Option<String>, ConfigError> {
    match lookup(root, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("expected a string, found {other}"),
        }),
    }
}

fn lookup_number<N>(root: &Value, key: &str) -> Result<Option<N>, ConfigError>
where
    N: TryFrom<u64> + std::str::FromStr,
{
    let invalid = |found: &Value| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("expected a non-negative integer, found {found}"),
    };
    match lookup(root, key) {
        None => Ok(None),
        Some(v @ Value::Number(n)) => n
            .as_u64()
            .and_then(|n| N::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(v)),
        Some(v @ Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid(v)),
        Some(other) => Err(invalid(other)),
    }
}
