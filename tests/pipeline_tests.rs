use std::sync::OnceLock;

use async_trait::async_trait;
use httpmock::Method::POST;
use httpmock::MockServer;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use serde_json::json;

use pigeon_push::models::credentials::ServiceAccountKey;
use pigeon_push::models::errors::{NotificationError, RecipientLookupError};
use pigeon_push::models::notifications::{NotificationPayload, NotificationRequest};
use pigeon_push::repositories::recipient_source::{
    RecipientCandidate, RecipientFilter, RecipientSource,
};
use pigeon_push::services::push_client::PushClient;

const PROJECT_ID: &str = "demo-project";
const SEND_PATH: &str = "/v1/projects/demo-project/messages:send";

fn test_key_pem() -> &'static str {
    static PEM: OnceLock<String> = OnceLock::new();
    PEM.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation failed");
        key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
    })
}

fn test_client(server: &MockServer) -> PushClient {
    let _ = env_logger::builder().is_test(true).try_init();

    let key = ServiceAccountKey {
        private_key: test_key_pem().to_string(),
        client_email: "svc@demo-project.iam.gserviceaccount.com".to_string(),
        token_uri: server.url("/token"),
        project_id: PROJECT_ID.to_string(),
    };
    PushClient::new(key)
        .expect("client construction failed")
        .with_api_base(server.base_url())
}

async fn mock_token_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=")
                .body_contains("assertion=");
            then.status(200)
                .json_body(json!({ "access_token": "test-bearer", "expires_in": 3600 }));
        })
        .await
}

/// One 200 mock per accepted recipient token, so failing recipients never
/// race a catch-all.
async fn mock_send_ok<'a>(server: &'a MockServer, recipient: &str) -> httpmock::Mock<'a> {
    let needle = format!("\"token\":\"{}\"", recipient);
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .header("authorization", "Bearer test-bearer")
                .body_contains(needle);
            then.status(200).json_body(json!({
                "name": format!("projects/{}/messages/1", PROJECT_ID)
            }));
        })
        .await
}

async fn mock_send_fail<'a>(server: &'a MockServer, recipient: &str) -> httpmock::Mock<'a> {
    let needle = format!("\"token\":\"{}\"", recipient);
    server
        .mock_async(move |when, then| {
            when.method(POST).path(SEND_PATH).body_contains(needle);
            then.status(404)
                .json_body(json!({ "error": { "status": "UNREGISTERED" } }));
        })
        .await
}

#[tokio::test]
async fn single_recipient_dispatch_succeeds() {
    let server = MockServer::start_async().await;
    let token_mock = mock_token_endpoint(&server).await;
    let send_mock = mock_send_ok(&server, "tok-1").await;

    let client = test_client(&server);
    let payload = NotificationPayload::new("New listing", "A listing was approved")
        .with_data("listing_id", "42");

    let delivered = client.send_to_recipient("tok-1", &payload).await.unwrap();

    assert!(delivered);
    token_mock.assert_async().await;
    send_mock.assert_async().await;
}

#[tokio::test]
async fn fan_out_counts_partial_failures() {
    let server = MockServer::start_async().await;
    mock_token_endpoint(&server).await;
    mock_send_ok(&server, "a").await;
    mock_send_fail(&server, "b").await;
    mock_send_ok(&server, "c").await;

    let client = test_client(&server);
    let request = NotificationRequest {
        recipients: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        payload: NotificationPayload::new("Update", "Something changed"),
    };

    let outcome = client.dispatch(&request).await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.attempted, 3);
    assert_eq!(outcome.delivered, 2);
}

#[tokio::test]
async fn fan_out_tally_is_order_independent() {
    let server = MockServer::start_async().await;
    mock_token_endpoint(&server).await;
    mock_send_ok(&server, "r1").await;
    mock_send_fail(&server, "r2").await;
    mock_send_ok(&server, "r3").await;
    mock_send_fail(&server, "r4").await;

    let client = test_client(&server);
    let payload = NotificationPayload::new("Update", "Something changed");

    let forward: Vec<String> = ["r1", "r2", "r3", "r4"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let reversed: Vec<String> = forward.iter().rev().cloned().collect();

    let first = client.broadcast(&forward, &payload).await.unwrap();
    let second = client.broadcast(&reversed, &payload).await.unwrap();

    assert_eq!(first.attempted, 4);
    assert_eq!(first.delivered, 2);
    assert_eq!(second, first);
}

#[tokio::test]
async fn empty_recipient_short_circuits_without_network_call() {
    let server = MockServer::start_async().await;
    let token_mock = mock_token_endpoint(&server).await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(200);
        })
        .await;

    let client = test_client(&server);
    let payload = NotificationPayload::new("Update", "Something changed");

    // broadcast filters empty tokens before any auth or send happens
    let outcome = client
        .broadcast(&[String::new(), String::new()], &payload)
        .await
        .unwrap();

    assert_eq!(outcome.attempted, 0);
    assert_eq!(outcome.delivered, 0);
    assert_eq!(send_mock.hits_async().await, 0);
    assert_eq!(token_mock.hits_async().await, 0);

    // same for the single-recipient path
    let delivered = client.send_to_recipient("", &payload).await.unwrap();
    assert!(!delivered);
    assert_eq!(send_mock.hits_async().await, 0);
    assert_eq!(token_mock.hits_async().await, 0);
}

#[tokio::test]
async fn failed_token_exchange_aborts_before_any_send() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(500).body("upstream unavailable");
        })
        .await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(200);
        })
        .await;

    let client = test_client(&server);
    let payload = NotificationPayload::new("Update", "Something changed");
    let recipients = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    let err = client.broadcast(&recipients, &payload).await.unwrap_err();
    assert!(matches!(
        err,
        NotificationError::AuthenticationRequired(_)
    ));
    assert_eq!(send_mock.hits_async().await, 0);

    // the structured outcome reports the failure instead of propagating it
    let outcome = client
        .dispatch(&NotificationRequest {
            recipients,
            payload,
        })
        .await;
    assert!(!outcome.succeeded);
    assert_eq!(outcome.attempted, 0);
    assert_eq!(outcome.delivered, 0);
    assert_eq!(send_mock.hits_async().await, 0);
}

#[tokio::test]
async fn token_is_cached_across_invocations() {
    let server = MockServer::start_async().await;
    let token_mock = mock_token_endpoint(&server).await;
    mock_send_ok(&server, "tok-1").await;

    let client = test_client(&server);
    let payload = NotificationPayload::new("Update", "Something changed");

    assert!(client.send_to_recipient("tok-1", &payload).await.unwrap());
    assert!(client.send_to_recipient("tok-1", &payload).await.unwrap());

    assert_eq!(token_mock.hits_async().await, 1);
}

struct FixedRecipients(Vec<RecipientCandidate>);

#[async_trait]
impl RecipientSource for FixedRecipients {
    async fn candidate_tokens(
        &self,
        _collection: &str,
        _filter: &RecipientFilter,
    ) -> Result<Vec<RecipientCandidate>, RecipientLookupError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn audience_dispatch_excludes_originating_actor() {
    let server = MockServer::start_async().await;
    mock_token_endpoint(&server).await;
    mock_send_ok(&server, "buyer-token-1").await;
    let actor_mock = mock_send_ok(&server, "actor-token").await;

    let source = FixedRecipients(vec![
        RecipientCandidate {
            user_id: "buyer-1".to_string(),
            push_token: "buyer-token-1".to_string(),
        },
        RecipientCandidate {
            user_id: "seller-9".to_string(),
            push_token: "actor-token".to_string(),
        },
        RecipientCandidate {
            user_id: "buyer-2".to_string(),
            push_token: String::new(),
        },
    ]);

    let client = test_client(&server);
    let filter = RecipientFilter {
        role: "buyer".to_string(),
        status: "approved".to_string(),
    };
    let payload = NotificationPayload::new("New listing", "A listing was approved");

    let outcome = client
        .dispatch_to_audience(&source, "users", &filter, Some("seller-9"), &payload)
        .await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.delivered, 1);
    assert_eq!(actor_mock.hits_async().await, 0);
}
