use reqwest::Client;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("watchdeck/", env!("CARGO_PKG_VERSION"));

/// Shared client for every provider. Shikimori rejects requests without a user agent.
pub fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5).min(timeout))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}
