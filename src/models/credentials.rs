use chrono::{DateTime, Duration, Utc};
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;

use crate::models::errors::NotificationError;

/// Service-account credential as shipped in the provider's JSON blob.
/// Loaded once and held in memory for the process lifetime; the private key
/// never touches durable storage.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub private_key: String,
    pub client_email: String,
    pub token_uri: String,
    pub project_id: String,
}

impl ServiceAccountKey {
    pub fn from_json(blob: &str) -> Result<Self, NotificationError> {
        serde_json::from_str(blob).map_err(|e| {
            NotificationError::CredentialFormat(format!("invalid service account JSON: {}", e))
        })
    }
}

/// RSA key material lifted out of the credential's DER encoding.
/// Derived once per credential and never mutated.
#[derive(Debug, Clone)]
pub struct ParsedRsaKey {
    pub modulus: BigUint,
    pub public_exponent: BigUint,
    pub private_exponent: BigUint,
    pub prime1: BigUint,
    pub prime2: BigUint,
}

impl ParsedRsaKey {
    /// Rebuilds a signing key from the extracted components. A key whose
    /// components are mutually inconsistent is a signing error, not a
    /// credential-format error: the encoding parsed fine.
    pub fn to_signing_key(&self) -> Result<RsaPrivateKey, NotificationError> {
        let key = RsaPrivateKey::from_components(
            self.modulus.clone(),
            self.public_exponent.clone(),
            self.private_exponent.clone(),
            vec![self.prime1.clone(), self.prime2.clone()],
        )
        .map_err(|e| NotificationError::Signing(format!("invalid RSA key: {}", e)))?;
        key.validate()
            .map_err(|e| NotificationError::Signing(format!("invalid RSA key: {}", e)))?;
        Ok(key)
    }
}

/// Short-lived bearer token from the token endpoint. Cached by the push
/// client and discarded once it is inside the refresh margin.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: String, obtained_at: DateTime<Utc>, lifetime_secs: i64) -> Self {
        Self {
            value,
            obtained_at,
            expires_at: obtained_at + Duration::seconds(lifetime_secs),
        }
    }

    /// True once the token is within `margin` of its expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin <= now
    }
}
