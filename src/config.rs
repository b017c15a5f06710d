use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::orchestrator::scripts::DEFAULT_HOLD_MUSIC;
use crate::orchestrator::OperatingMode;
use crate::provider::twilio::DEFAULT_API_BASE;

pub const DEFAULT_CONFIG_FILE: &str = "warm-transfer.toml";
pub const ENV_PREFIX: &str = "WARM_TRANSFER";

/// Main configuration structure for the warm transfer responder
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WarmTransferConfig {
    /// NORMAL places calls, TESTING only logs
    pub mode: OperatingMode,
    /// Externally reachable base URL used to build provider callbacks
    pub public_url: Option<String>,
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Calling provider settings
    pub provider: ProviderConfig,
    /// Branch (multi-tenant) settings
    pub tenancy: TenancyConfig,
    /// Workflow tunables
    pub workflow: WorkflowConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider account identifier (can be set via TWILIO_ACCOUNT_SID)
    pub account_sid: Option<String>,
    /// Provider auth secret (can be set via TWILIO_AUTH_TOKEN)
    pub auth_token: Option<String>,
    /// Outbound caller number (can be set via TWILIO_PHONE_NUMBER)
    pub caller_number: Option<String>,
    pub api_base_url: String,
    /// Upper bound for one placement request
    pub placement_timeout_ms: u64,
    pub requests_per_second: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Branch identifier; when set, settings are fetched from the admin service
    pub branch: Option<String>,
    pub admin_url: String,
    pub fetch_timeout_ms: u64,
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Technician rung when a trigger names nobody
    pub default_technician_phone: Option<String>,
    /// An active session older than this may be superseded by a new trigger
    pub session_ttl_seconds: u64,
    pub hold_music_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive, overridden by RUST_LOG
    pub log_level: String,
    /// JSON log lines (plain text when false)
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            caller_number: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            placement_timeout_ms: 10_000,
            requests_per_second: 1,
            burst: 10,
        }
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            branch: None,
            admin_url: "http://admin:5000".to_string(),
            fetch_timeout_ms: 2_000,
            cache_ttl_seconds: 60,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_technician_phone: None,
            session_ttl_seconds: 30 * 60,
            hold_music_url: DEFAULT_HOLD_MUSIC.to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

impl WarmTransferConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path`, or warm-transfer.toml when present)
    /// 3. Environment variables (prefixed with WARM_TRANSFER_, `__` between sections)
    /// 4. Legacy deployment variables for anything still unset
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, std::env::vars().collect())
    }

    /// Same as [`load`](Self::load) with an explicit environment, for tests and tooling
    pub fn load_from(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(Some(env.clone())),
        );

        let mut config: WarmTransferConfig = builder.build()?.try_deserialize()?;
        config.apply_legacy_env(|key| env.get(key).cloned());

        Ok(config)
    }

    /// Fill unset values from the variable names older deployments use.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefixed = |key: &str| lookup(&format!("{ENV_PREFIX}_{key}")).is_some();

        fill(&mut self.provider.account_sid, lookup("TWILIO_ACCOUNT_SID"));
        fill(&mut self.provider.auth_token, lookup("TWILIO_AUTH_TOKEN"));
        fill(&mut self.provider.caller_number, lookup("TWILIO_PHONE_NUMBER"));
        fill(&mut self.public_url, lookup("PUBLIC_URL"));
        fill(&mut self.tenancy.branch, lookup("BRANCH_NAME"));

        if !prefixed("MODE") {
            if let Some(mode) = lookup("OPERATING_MODE").and_then(|m| m.parse().ok()) {
                self.mode = mode;
            }
        }
        if !prefixed("TENANCY__ADMIN_URL") {
            if let Some(admin_url) = lookup("ADMIN_DASHBOARD_URL") {
                self.tenancy.admin_url = admin_url;
            }
        }
    }

    /// Settings whose absence will make every trigger fail.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.public_url) {
            missing.push("public_url");
        }
        if self.tenancy.branch.is_none() {
            if blank(&self.provider.account_sid) {
                missing.push("provider.account_sid");
            }
            if blank(&self.provider.auth_token) {
                missing.push("provider.auth_token");
            }
            if blank(&self.provider.caller_number) {
                missing.push("provider.caller_number");
            }
        }
        missing
    }

    /// Copy safe to print: secrets replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.provider.auth_token.is_some() {
            copy.provider.auth_token = Some("********".to_string());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value.filter(|v| !v.trim().is_empty());
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = WarmTransferConfig::load_from(None, HashMap::new()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.mode, OperatingMode::Normal);
        assert_eq!(config.provider.placement_timeout_ms, 10_000);
        assert_eq!(config.tenancy.fetch_timeout_ms, 2_000);
        assert!(config.tenancy.branch.is_none());
    }

    #[test]
    fn test_prefixed_environment_overrides() {
        let config = WarmTransferConfig::load_from(
            None,
            env(&[
                ("WARM_TRANSFER_MODE", "TESTING"),
                ("WARM_TRANSFER_PROVIDER__CALLER_NUMBER", "+15550001111"),
                ("WARM_TRANSFER_PROVIDER__PLACEMENT_TIMEOUT_MS", "2500"),
                ("WARM_TRANSFER_SERVER__BIND", "127.0.0.1:8080"),
            ]),
        )
        .unwrap();

        assert_eq!(config.mode, OperatingMode::Testing);
        assert_eq!(config.provider.caller_number.as_deref(), Some("+15550001111"));
        assert_eq!(config.provider.placement_timeout_ms, 2500);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_legacy_variables_fill_gaps() {
        let config = WarmTransferConfig::load_from(
            None,
            env(&[
                ("TWILIO_ACCOUNT_SID", "AC123"),
                ("TWILIO_AUTH_TOKEN", "secret"),
                ("TWILIO_PHONE_NUMBER", "+15550001111"),
                ("PUBLIC_URL", "https://responder.example.com"),
                ("OPERATING_MODE", "TESTING"),
                ("BRANCH_NAME", "tuc"),
                ("ADMIN_DASHBOARD_URL", "http://admin.internal:5000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.provider.account_sid.as_deref(), Some("AC123"));
        assert_eq!(config.public_url.as_deref(), Some("https://responder.example.com"));
        assert_eq!(config.mode, OperatingMode::Testing);
        assert_eq!(config.tenancy.branch.as_deref(), Some("tuc"));
        assert_eq!(config.tenancy.admin_url, "http://admin.internal:5000");
        assert!(config.missing_settings().is_empty());
    }

    #[test]
    fn test_prefixed_mode_beats_legacy_mode() {
        let config = WarmTransferConfig::load_from(
            None,
            env(&[("WARM_TRANSFER_MODE", "NORMAL"), ("OPERATING_MODE", "TESTING")]),
        )
        .unwrap();
        assert_eq!(config.mode, OperatingMode::Normal);
    }

    #[test]
    fn test_config_file_source() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "public_url = \"https://from-file.example.com\"\n\n[workflow]\ndefault_technician_phone = \"+15557776666\"\n"
        )
        .unwrap();

        let config = WarmTransferConfig::load_from(Some(file.path()), HashMap::new()).unwrap();
        assert_eq!(config.public_url.as_deref(), Some("https://from-file.example.com"));
        assert_eq!(
            config.workflow.default_technician_phone.as_deref(),
            Some("+15557776666")
        );
    }

    #[test]
    fn test_missing_settings_and_redaction() {
        let mut config = WarmTransferConfig::default();
        assert_eq!(
            config.missing_settings(),
            vec![
                "public_url",
                "provider.account_sid",
                "provider.auth_token",
                "provider.caller_number"
            ]
        );

        config.provider.auth_token = Some("super-secret".to_string());
        let printed = config.redacted().to_toml().unwrap();
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("********"));
    }
}
