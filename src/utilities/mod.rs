pub mod assertions;
pub mod config;
pub mod der;
pub mod logging;
pub mod rsa_keys;
