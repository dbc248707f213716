//! Account providers: Microsoft (Xbox Live), AZauth and Mojang.
//!
//! Every adapter answers with an [`AuthPayload`] shaped like the stored
//! account record; a provider rejection is returned as `Error::Provider`.

pub mod azauth;
pub mod microsoft;
pub mod mojang;

pub use azauth::AzAuthClient;
pub use microsoft::MicrosoftRefresher;
pub use mojang::MojangClient;

use ember_core::entities::Account;
use ember_core::Error;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// String credential stored alongside the account
pub(crate) fn credential<'a>(account: &'a Account, key: &str) -> Option<&'a str> {
    account
        .credentials
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub(crate) fn require_credential<'a>(
    account: &'a Account,
    key: &str,
    provider: &str,
) -> Result<&'a str, Error> {
    credential(account, key)
        .ok_or_else(|| Error::provider(provider, format!("stored account has no {}", key)))
}

/// Decode a provider response, turning a non-success status into a provider error
pub(crate) async fn provider_json<T: DeserializeOwned>(
    response: Response,
    provider: &str,
    step: &str,
) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::provider(
            provider,
            format!("{} failed with {}: {}", step, status, body.trim()),
        ));
    }

    response.json::<T>().await.map_err(|e| {
        Error::InvalidServerResponse(format!("failed to parse {} response: {}", step, e))
    })
}

/// Mojang style uuids are sent without dashes
pub(crate) fn simple_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credential_lookup() {
        let account: Account = serde_json::from_value(json!({
            "id": "a",
            "name": "Alice",
            "meta": { "type": "Xbox" },
            "refresh_token": "r-1",
            "client_token": "",
            "expires_in": 3600
        }))
        .unwrap();

        assert_eq!(credential(&account, "refresh_token"), Some("r-1"));
        assert_eq!(credential(&account, "client_token"), None);
        assert_eq!(credential(&account, "expires_in"), None);
        assert!(matches!(
            require_credential(&account, "access_token", "Xbox"),
            Err(Error::Provider { provider, .. }) if provider == "Xbox"
        ));
    }

    #[test]
    fn test_simple_uuid_has_no_dashes() {
        let id = simple_uuid();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }
}
