use async_trait::async_trait;

use crate::models::errors::RecipientLookupError;

/// Business-rule parameters for candidate selection. Which role/status
/// combination gates eligibility is the caller's decision, not a crate
/// constant.
#[derive(Debug, Clone)]
pub struct RecipientFilter {
    pub role: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct RecipientCandidate {
    pub user_id: String,
    pub push_token: String,
}

/// Interface to the document store that owns recipient records. The crate
/// only consumes candidates; storage lives with the collaborator.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn candidate_tokens(
        &self,
        collection: &str,
        filter: &RecipientFilter,
    ) -> Result<Vec<RecipientCandidate>, RecipientLookupError>;
}
