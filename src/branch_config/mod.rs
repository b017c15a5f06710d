//! Branch configuration lookup.
//!
//! Every placement needs provider credentials and a caller number. In
//! single-tenant deployments they come straight from the process configuration
//! ([`StaticBranchConfig`]); in branch mode they are fetched from the admin
//! service and cached ([`AdminBranchConfig`]).

pub mod admin;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::WarmTransferConfig;
use crate::provider::ProviderCredentials;

pub use admin::AdminBranchConfig;

/// Calling settings for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSettings {
    pub credentials: ProviderCredentials,
    pub caller_number: String,
    pub default_technician_address: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BranchConfigError {
    #[error("branch '{branch}' is not configured with calling credentials")]
    NotConfigured { branch: String },
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BranchConfigResolver: Send + Sync {
    async fn resolve(&self, branch_id: &str) -> Result<BranchSettings, BranchConfigError>;
}

/// Settings fixed at startup, shared by every branch id.
#[derive(Debug, Clone, Default)]
pub struct StaticBranchConfig {
    settings: Option<BranchSettings>,
}

impl StaticBranchConfig {
    pub fn new(settings: Option<BranchSettings>) -> Self {
        Self { settings }
    }

    /// Build from the provider section; incomplete credentials mean "not configured".
    pub fn from_config(config: &WarmTransferConfig) -> Self {
        let provider = &config.provider;
        let settings = match (
            non_blank(provider.account_sid.as_deref()),
            non_blank(provider.auth_token.as_deref()),
            non_blank(provider.caller_number.as_deref()),
        ) {
            (Some(account_sid), Some(auth_token), Some(caller_number)) => Some(BranchSettings {
                credentials: ProviderCredentials {
                    account_sid: account_sid.to_string(),
                    auth_token: auth_token.to_string(),
                },
                caller_number: caller_number.to_string(),
                default_technician_address: non_blank(
                    config.workflow.default_technician_phone.as_deref(),
                )
                .map(str::to_string),
            }),
            _ => None,
        };

        Self { settings }
    }
}

#[async_trait]
impl BranchConfigResolver for StaticBranchConfig {
    async fn resolve(&self, branch_id: &str) -> Result<BranchSettings, BranchConfigError> {
        self.settings
            .clone()
            .ok_or_else(|| BranchConfigError::NotConfigured {
                branch: branch_id.to_string(),
            })
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
