use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{non_blank, BranchConfigError, BranchConfigResolver, BranchSettings};
use crate::provider::ProviderCredentials;

/// Fetches branch settings from the admin service (`GET {admin_url}/api/settings/{branch}`).
///
/// Any failure (timeout, non-200, undecodable body, missing credentials) is
/// reported as "not configured". Only successful lookups are cached.
#[derive(Debug, Clone)]
pub struct AdminBranchConfig {
    http: reqwest::Client,
    admin_url: String,
    cache: Cache<String, BranchSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminSettings {
    #[serde(default)]
    twilio_sid: Option<String>,
    #[serde(default)]
    twilio_token: Option<String>,
    #[serde(default)]
    twilio_number: Option<String>,
    #[serde(default)]
    default_tech_phone: Option<String>,
}

impl AdminBranchConfig {
    pub fn new(
        admin_url: impl Into<String>,
        fetch_timeout: Duration,
        cache_ttl: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(fetch_timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(64)
            .time_to_live(cache_ttl)
            .build();

        Ok(Self {
            http,
            admin_url: admin_url.into().trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// Drop cached settings so the next lookup hits the admin service.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// `{admin_url}/api/settings/{branch}` with the branch id percent-encoded as one segment.
    fn settings_url(&self, branch_id: &str) -> Option<Url> {
        let mut url = Url::parse(&self.admin_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["api", "settings", branch_id]);
        Some(url)
    }

    async fn fetch(&self, branch_id: &str) -> Option<BranchSettings> {
        let url = match self.settings_url(branch_id) {
            Some(url) => url,
            None => {
                error!(branch = %branch_id, admin_url = %self.admin_url, "Admin URL cannot carry a path");
                return None;
            }
        };

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(branch = %branch_id, error = %e, "Could not fetch settings from admin");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                branch = %branch_id,
                status = response.status().as_u16(),
                "Admin service returned no settings"
            );
            return None;
        }

        let settings: AdminSettings = match response.json().await {
            Ok(settings) => settings,
            Err(e) => {
                error!(branch = %branch_id, error = %e, "Admin settings could not be decoded");
                return None;
            }
        };

        let account_sid = non_blank(settings.twilio_sid.as_deref())?;
        let auth_token = non_blank(settings.twilio_token.as_deref())?;
        let caller_number = non_blank(settings.twilio_number.as_deref())?;

        Some(BranchSettings {
            credentials: ProviderCredentials {
                account_sid: account_sid.to_string(),
                auth_token: auth_token.to_string(),
            },
            caller_number: caller_number.to_string(),
            default_technician_address: non_blank(settings.default_tech_phone.as_deref())
                .map(str::to_string),
        })
    }
}

#[async_trait]
impl BranchConfigResolver for AdminBranchConfig {
    async fn resolve(&self, branch_id: &str) -> Result<BranchSettings, BranchConfigError> {
        if let Some(cached) = self.cache.get(branch_id).await {
            debug!(branch = %branch_id, "Branch settings cache hit");
            return Ok(cached);
        }

        match self.fetch(branch_id).await {
            Some(settings) => {
                self.cache
                    .insert(branch_id.to_string(), settings.clone())
                    .await;
                Ok(settings)
            }
            None => Err(BranchConfigError::NotConfigured {
                branch: branch_id.to_string(),
            }),
        }
    }
}
