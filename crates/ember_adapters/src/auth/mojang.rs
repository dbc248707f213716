use async_trait::async_trait;
use ember_core::entities::{Account, AuthPayload};
use ember_core::ports::MojangAuthenticator;
use ember_core::Error;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{credential, require_credential, simple_uuid};
use crate::network::{join_url, send_error};

const PROVIDER: &str = "Mojang";

pub const DEFAULT_AUTH_SERVER: &str = "https://authserver.mojang.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    client_token: Option<String>,
    #[serde(default)]
    selected_profile: Option<SelectedProfile>,
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectedProfile {
    id: String,
    name: String,
}

/// Offline profiles plus Yggdrasil style session refresh
pub struct MojangClient {
    client: Client,
    auth_server: String,
}

impl MojangClient {
    pub fn new(client: Client) -> Self {
        Self::with_auth_server(client, DEFAULT_AUTH_SERVER)
    }

    pub fn with_auth_server(client: Client, auth_server: impl Into<String>) -> Self {
        Self {
            client,
            auth_server: auth_server.into(),
        }
    }
}

/// Local account with a random uuid; nothing leaves the machine
pub fn offline_payload(name: &str) -> AuthPayload {
    let uuid = simple_uuid();
    AuthPayload::new(json!({
        "access_token": uuid,
        "client_token": uuid,
        "uuid": uuid,
        "name": name,
        "user_properties": "{}",
        "meta": {
            "type": PROVIDER,
            "online": false,
        },
    }))
}

fn refreshed_payload(response: RefreshResponse, previous: &Account) -> Result<AuthPayload, Error> {
    if let Some(error) = response.error {
        return Err(Error::provider(
            PROVIDER,
            response.error_message.unwrap_or(error),
        ));
    }
    let profile = response
        .selected_profile
        .ok_or_else(|| Error::provider(PROVIDER, "session has no selected profile"))?;
    let access_token = response
        .access_token
        .ok_or_else(|| Error::provider(PROVIDER, "refresh returned no access token"))?;

    let properties = response
        .user
        .as_ref()
        .and_then(|user| user.get("properties"))
        .map(Value::to_string)
        .unwrap_or_else(|| "{}".to_string());

    Ok(AuthPayload::new(json!({
        "access_token": access_token,
        "client_token": response
            .client_token
            .or_else(|| credential(previous, "client_token").map(str::to_string)),
        "uuid": profile.id,
        "name": profile.name,
        "user_properties": properties,
        "meta": {
            "type": PROVIDER,
            "online": true,
        },
    })))
}

#[async_trait]
impl MojangAuthenticator for MojangClient {
    #[instrument(skip(self))]
    async fn login(&self, name: &str) -> Result<AuthPayload, Error> {
        debug!("creating offline profile");
        Ok(offline_payload(name))
    }

    #[instrument(skip(self, account), fields(username = %account.name))]
    async fn refresh(&self, account: &Account) -> Result<AuthPayload, Error> {
        let access_token = require_credential(account, "access_token", PROVIDER)?;
        let client_token = credential(account, "client_token");

        let response = self
            .client
            .post(join_url(&self.auth_server, "refresh"))
            .json(&json!({
                "accessToken": access_token,
                "clientToken": client_token,
                "requestUser": true,
            }))
            .send()
            .await
            .map_err(send_error)?;

        // Yggdrasil reports rejections as a JSON error document with a 4xx status
        let body: RefreshResponse = response.json().await.map_err(|e| {
            Error::InvalidServerResponse(format!("failed to parse refresh response: {}", e))
        })?;
        refreshed_payload(body, account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::entities::AccountId;

    fn stored() -> Account {
        serde_json::from_value(json!({
            "id": "m",
            "name": "Steve",
            "access_token": "old",
            "client_token": "ct-1",
            "meta": { "type": "Mojang", "online": true }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_offline_login() {
        let client = MojangClient::new(Client::new());

        let payload = client.login("Steve").await.unwrap();
        let account = Account::from_payload(AccountId::new("o"), payload).unwrap();

        assert_eq!(account.name, "Steve");
        assert!(account.is_offline());
        assert_eq!(account.uuid.as_deref().map(str::len), Some(32));
        assert_eq!(account.access_token(), account.uuid.as_deref());
    }

    #[test]
    fn test_offline_profiles_get_fresh_uuids() {
        let first = offline_payload("Steve");
        let second = offline_payload("Steve");

        assert_ne!(first.as_value()["uuid"], second.as_value()["uuid"]);
    }

    #[test]
    fn test_refresh_response() {
        let response: RefreshResponse = serde_json::from_value(json!({
            "accessToken": "new",
            "selectedProfile": { "id": "p-1", "name": "Steve2" },
            "user": { "id": "u", "properties": [{ "name": "preferredLanguage", "value": "en" }] }
        }))
        .unwrap();

        let payload = refreshed_payload(response, &stored()).unwrap();
        let value = payload.as_value();

        assert_eq!(value["name"], json!("Steve2"));
        assert_eq!(value["access_token"], json!("new"));
        assert_eq!(value["client_token"], json!("ct-1"));
        assert_eq!(value["meta"]["online"], json!(true));
        assert!(value["user_properties"]
            .as_str()
            .unwrap()
            .contains("preferredLanguage"));
    }

    #[test]
    fn test_refresh_error_document() {
        let response: RefreshResponse = serde_json::from_value(json!({
            "error": "ForbiddenOperationException",
            "errorMessage": "Invalid token."
        }))
        .unwrap();

        let result = refreshed_payload(response, &stored());

        assert!(matches!(
            result,
            Err(Error::Provider { message, .. }) if message == "Invalid token."
        ));
    }
}
