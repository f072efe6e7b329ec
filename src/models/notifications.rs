use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What gets shown on the device, plus the opaque data map the client app
/// handles itself. Data values are plain strings; callers coerce richer
/// values before handing them over.
#[derive(Debug, Clone, Default)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.data.insert(key.into(), value.to_string());
        self
    }
}

/// Shaped by the routing layer before the core is invoked; the core never
/// inspects raw webhook JSON.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub recipients: Vec<String>,
    pub payload: NotificationPayload,
}

#[derive(Serialize)]
pub struct AssertionClaims<'a> {
    pub iss: &'a str,
    pub scope: &'a str,
    pub aud: &'a str,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Fan-out tally. Failures only ever show up here as `attempted - delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub attempted: usize,
    pub delivered: usize,
}

/// Structured result of one pipeline invocation. Returned for every run,
/// including ones that fail before any send goes out.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub succeeded: bool,
    pub message: String,
    pub attempted: usize,
    pub delivered: usize,
}

impl PipelineOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
            attempted: 0,
            delivered: 0,
        }
    }
}
