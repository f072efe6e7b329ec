use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::PaddingScheme;
use sha2::{Digest, Sha256};

use crate::models::credentials::ParsedRsaKey;
use crate::models::errors::NotificationError;
use crate::models::notifications::AssertionClaims;

/// Fixed assertion validity window required by the token endpoint.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

const HEADER_JSON: &str = r#"{"alg":"RS256","typ":"JWT"}"#;

/// Builds a compact RS256 assertion (`header.claims.signature`) for the
/// JWT-bearer grant. Single use: one assertion per exchange attempt.
pub fn build_signed_assertion(
    key: &ParsedRsaKey,
    issuer: &str,
    scope: &str,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<String, NotificationError> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: issuer,
        scope,
        aud: audience,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    let claims_json = serde_json::to_string(&claims)
        .map_err(|e| NotificationError::Signing(format!("claims serialization failed: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER_JSON),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let signing_key = key.to_signing_key()?;
    let digest = Sha256::digest(signing_input.as_bytes());
    let signature = signing_key
        .sign(PaddingScheme::new_pkcs1v15_sign::<Sha256>(), &digest)
        .map_err(|e| NotificationError::Signing(format!("RSA signing failed: {}", e)))?;

    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature)
    ))
}
