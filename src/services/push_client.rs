use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::models::credentials::{AccessToken, ParsedRsaKey, ServiceAccountKey};
use crate::models::errors::{DeliveryError, NotificationError};
use crate::models::notifications::{
    BroadcastOutcome, NotificationPayload, NotificationRequest, PipelineOutcome,
};
use crate::repositories::recipient_source::{RecipientFilter, RecipientSource};
use crate::services::token_exchange::exchange_assertion_for_token;
use crate::utilities::assertions::build_signed_assertion;
use crate::utilities::config;
use crate::utilities::logging::log_error;
use crate::utilities::rsa_keys::parse_private_key;

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_API_BASE: &str = "https://fcm.googleapis.com";
const ANDROID_CHANNEL_ID: &str = "default";

// Tokens inside this margin of expiry are treated as expired.
const REFRESH_MARGIN_SECS: i64 = 60;
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Holds the service account, the parsed key and the token cache.
///
/// One client per process is enough: the cache refreshes itself and the
/// credential never changes after construction.
pub struct PushClient {
    key: ServiceAccountKey,
    parsed_key: ParsedRsaKey,
    api_base: String,
    http: reqwest::Client,
    cached_token: Arc<RwLock<Option<AccessToken>>>,
}

impl PushClient {
    pub fn new(key: ServiceAccountKey) -> Result<Self, NotificationError> {
        let parsed_key = parse_private_key(&key.private_key)?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            key,
            parsed_key,
            api_base: DEFAULT_API_BASE.to_string(),
            http,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Builds a client from the environment: credential blob plus optional
    /// endpoint overrides.
    pub fn from_env() -> Result<Self, NotificationError> {
        config::init();
        let mut key = ServiceAccountKey::from_json(&config::get_service_account_json())?;
        if let Some(uri) = config::get_token_endpoint_override() {
            key.token_uri = uri;
        }
        Ok(Self::new(key)?.with_api_base(config::get_push_endpoint()))
    }

    /// Points the send path at a different gateway base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Runs one full pipeline invocation. Never panics and never returns an
    /// error: auth failures come back as a failed outcome with zero sends.
    pub async fn dispatch(&self, request: &NotificationRequest) -> PipelineOutcome {
        match self.broadcast(&request.recipients, &request.payload).await {
            Ok(outcome) => PipelineOutcome {
                succeeded: true,
                message: format!(
                    "delivered {}/{} notifications",
                    outcome.delivered, outcome.attempted
                ),
                attempted: outcome.attempted,
                delivered: outcome.delivered,
            },
            Err(e) => {
                log_error("push_pipeline", &e.to_string());
                PipelineOutcome::failure(e.to_string())
            }
        }
    }

    /// Resolves an audience through the recipient source, drops the
    /// originating actor and broadcasts to the rest.
    pub async fn dispatch_to_audience(
        &self,
        source: &dyn RecipientSource,
        collection: &str,
        filter: &RecipientFilter,
        exclude_user: Option<&str>,
        payload: &NotificationPayload,
    ) -> PipelineOutcome {
        let candidates = match source.candidate_tokens(collection, filter).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log_error("recipient_lookup", &e.to_string());
                return PipelineOutcome::failure(e.to_string());
            }
        };

        let recipients: Vec<String> = candidates
            .into_iter()
            .filter(|c| exclude_user.map_or(true, |user| c.user_id != user))
            .map(|c| c.push_token)
            .collect();

        self.dispatch(&NotificationRequest {
            recipients,
            payload: payload.clone(),
        })
        .await
    }

    /// Single-recipient send. `Ok(false)` is a delivery failure; `Err` is
    /// reserved for the auth path.
    pub async fn send_to_recipient(
        &self,
        recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<bool, NotificationError> {
        if recipient.trim().is_empty() {
            log::warn!("[Push] skipping send: empty recipient token");
            return Ok(false);
        }

        let token = self.ensure_token().await?;
        match self.dispatch_one(&token, recipient, payload).await {
            Ok(()) => {
                log::info!("[Push] delivered to {}", recipient);
                Ok(true)
            }
            Err(e) => {
                log::warn!("[Push] delivery to {} failed: {}", recipient, e);
                Ok(false)
            }
        }
    }

    /// Sequential fan-out with partial-failure accounting. A recipient's
    /// failure is counted and logged, never propagated to its siblings.
    pub async fn broadcast(
        &self,
        recipients: &[String],
        payload: &NotificationPayload,
    ) -> Result<BroadcastOutcome, NotificationError> {
        let targets: Vec<&String> = recipients.iter().filter(|t| !t.is_empty()).collect();
        if targets.is_empty() {
            return Ok(BroadcastOutcome {
                attempted: 0,
                delivered: 0,
            });
        }

        let token = self.ensure_token().await?;

        let mut delivered = 0usize;
        for recipient in &targets {
            match self.dispatch_one(&token, recipient, payload).await {
                Ok(()) => delivered += 1,
                Err(e) => log_error(
                    "push_delivery",
                    &format!("recipient {}: {}", recipient, e),
                ),
            }
        }

        log::info!(
            "[Push] fan-out complete: {}/{} delivered",
            delivered,
            targets.len()
        );

        Ok(BroadcastOutcome {
            attempted: targets.len(),
            delivered,
        })
    }

    async fn dispatch_one(
        &self,
        token: &AccessToken,
        recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        if recipient.trim().is_empty() {
            return Err(DeliveryError::EmptyRecipient);
        }

        let message = serde_json::json!({
            "message": {
                "token": recipient,
                "notification": {
                    "title": payload.title,
                    "body": payload.body
                },
                "data": payload.data,
                "android": {
                    "priority": "high",
                    "notification": {
                        "channel_id": ANDROID_CHANNEL_ID,
                        "sound": "default"
                    }
                }
            }
        });

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base, self.key.project_id
        );

        let res = self
            .http
            .post(&url)
            .bearer_auth(&token.value)
            .json(&message)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status, body });
        }

        Ok(())
    }

    /// Auth gate for the dispatch paths: a failed exchange means the whole
    /// invocation needs re-authentication, so it surfaces as such.
    async fn ensure_token(&self) -> Result<AccessToken, NotificationError> {
        self.get_access_token().await.map_err(|e| match e {
            err @ NotificationError::TokenExchange { .. } => {
                NotificationError::AuthenticationRequired(err.to_string())
            }
            other => other,
        })
    }

    async fn get_access_token(&self) -> Result<AccessToken, NotificationError> {
        let refresh_margin = Duration::seconds(REFRESH_MARGIN_SECS);
        let now = Utc::now();

        let mut guard = self.cached_token.write().await;
        if let Some(token) = guard.as_ref() {
            if !token.needs_refresh(now, refresh_margin) {
                log::info!(
                    "[Push] token cache hit (expires in {}s)",
                    (token.expires_at - now).num_seconds()
                );
                return Ok(token.clone());
            }
            log::info!("[Push] token near expiry, refreshing");
        } else {
            log::info!("[Push] token cache miss, no token loaded yet");
        }

        // An expired token is dropped even if the refresh below fails.
        *guard = None;

        let assertion = build_signed_assertion(
            &self.parsed_key,
            &self.key.client_email,
            MESSAGING_SCOPE,
            &self.key.token_uri,
            now,
        )?;

        let token = exchange_assertion_for_token(&self.http, &self.key.token_uri, &assertion).await?;
        log::info!("[Push] new token cached (valid until {})", token.expires_at);
        *guard = Some(token.clone());

        Ok(token)
    }
}
