use chrono::Utc;

use crate::models::credentials::AccessToken;
use crate::models::errors::NotificationError;
use crate::models::notifications::TokenResponse;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Exchanges one signed assertion for a bearer token. The only network call
/// on the auth path; callers decide whether and when to retry.
pub async fn exchange_assertion_for_token(
    http: &reqwest::Client,
    token_uri: &str,
    assertion: &str,
) -> Result<AccessToken, NotificationError> {
    let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)];

    let res = http
        .post(token_uri)
        .form(&params)
        .send()
        .await
        .map_err(|e| NotificationError::TokenExchange {
            status: None,
            body: e.to_string(),
        })?;

    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(NotificationError::TokenExchange {
            status: Some(status.as_u16()),
            body,
        });
    }

    let token_response: TokenResponse =
        res.json()
            .await
            .map_err(|e| NotificationError::TokenExchange {
                status: Some(status.as_u16()),
                body: format!("unparseable token response: {}", e),
            })?;

    Ok(AccessToken::new(
        token_response.access_token,
        Utc::now(),
        token_response.expires_in,
    ))
}
