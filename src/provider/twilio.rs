use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CallProvider, OutboundCall, PlacedCall, ProviderCredentials, ProviderError};

pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// Rate-limited client for the Twilio Calls REST resource
#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    api_base: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

impl TwilioClient {
    /// Create a client that places at most `requests_per_second` calls, with bursts up to `burst`.
    pub fn new(
        api_base: impl Into<String>,
        requests_per_second: u32,
        burst: u32,
    ) -> Result<Self, ProviderError> {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let http = reqwest::Client::builder()
            .user_agent(concat!("warm-transfer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    fn calls_url(&self, account_sid: &str) -> String {
        format!("{}/2010-04-01/Accounts/{}/Calls.json", self.api_base, account_sid)
    }
}

#[async_trait]
impl CallProvider for TwilioClient {
    async fn place_call(
        &self,
        credentials: &ProviderCredentials,
        call: OutboundCall,
    ) -> Result<PlacedCall, ProviderError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let mut form = vec![
            ("To", call.to.as_str()),
            ("From", call.from.as_str()),
            ("Twiml", call.markup.as_str()),
        ];
        if let Some(callback) = call.status_callback.as_deref() {
            form.push(("StatusCallback", callback));
            form.push(("StatusCallbackEvent", "completed"));
            form.push(("StatusCallbackMethod", "POST"));
        }

        debug!(to = %call.to, "Placing call through Twilio");

        let response = self
            .http
            .post(self.calls_url(&credentials.account_sid))
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                code: body.code,
                message: body
                    .message
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string()),
            });
        }

        let resource: CallResource = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(PlacedCall {
            call_sid: resource.sid,
        })
    }
}
