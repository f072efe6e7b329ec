pub mod push_client;
pub mod token_exchange;
