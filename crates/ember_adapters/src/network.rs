//! Shared HTTP client configuration for the launcher server and auth providers.

use std::time::Duration;

use ember_core::Error;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const USER_AGENT: &str = concat!("ember-launcher/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by every adapter.
pub fn build_client(timeout: Duration) -> Result<Client, Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
        .build()
        .map_err(|e| Error::Network(format!("failed to create HTTP client: {}", e)))
}

pub fn build_default_client() -> Result<Client, Error> {
    build_client(DEFAULT_TIMEOUT)
}

/// Join a base URL and a path without doubling the slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Fail on non-success status, then decode the JSON body
pub async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Network(format!(
            "failed to fetch {}: {}",
            what, status
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::InvalidServerResponse(format!("failed to parse {}: {}", what, e)))
}

pub(crate) fn send_error(e: reqwest::Error) -> Error {
    Error::Network(e.to_string())
}
