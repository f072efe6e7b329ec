use thiserror::Error;

/// Pipeline-level failures. Credential and signing errors are fatal for the
/// whole run; token exchange is transient and safe to retry on the next
/// trigger; `AuthenticationRequired` means the auth path must be re-run
/// before any dispatch proceeds.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Malformed service credential: {0}")]
    CredentialFormat(String),

    #[error("Assertion signing failed: {0}")]
    Signing(String),

    #[error("Token exchange failed (status {status:?}): {body}")]
    TokenExchange { status: Option<u16>, body: String },

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Per-recipient delivery failures. These are counted into the fan-out
/// tally and never abort sibling deliveries.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Recipient token is empty")]
    EmptyRecipient,

    #[error("Push rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum RecipientLookupError {
    #[error("Recipient query failed: {0}")]
    QueryFailed(String),
}
