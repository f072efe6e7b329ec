use dotenv::dotenv;
use std::env;

/// Initialize dotenv (only needs to be called once at startup)
pub fn init() {
    if dotenv().is_ok() {
        println!("Loaded .env file");
    } else {
        println!("Failed to load .env file");
    }
}

/// Fetch environment variables by key
pub fn get_env_var(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("Environment variable {} must be set", key))
}

/// The full service-account credential JSON blob
pub fn get_service_account_json() -> String {
    get_env_var("PUSH_SERVICE_ACCOUNT_JSON")
}

/// Push gateway base URL; overridable for test harnesses
pub fn get_push_endpoint() -> String {
    env::var("PUSH_API_ENDPOINT").unwrap_or_else(|_| "https://fcm.googleapis.com".to_string())
}

/// Optional override for the credential's token endpoint
pub fn get_token_endpoint_override() -> Option<String> {
    env::var("PUSH_TOKEN_ENDPOINT").ok()
}
