use async_trait::async_trait;
use ember_core::entities::{Account, AuthPayload};
use ember_core::ports::AzAuthenticator;
use ember_core::Error;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::require_credential;
use crate::network::{join_url, send_error};

const PROVIDER: &str = "AZauth";

/// Answer of `/api/auth/verify`: the user record, or a status/reason error
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    money: Option<Value>,
    #[serde(default)]
    role: Option<Value>,
    #[serde(default)]
    banned: bool,
}

impl VerifyResponse {
    fn into_payload(self, previous_token: &str) -> Result<AuthPayload, Error> {
        if self.status.as_deref() == Some("error") {
            let message = self
                .message
                .or(self.reason)
                .unwrap_or_else(|| "session rejected".to_string());
            return Err(Error::provider(PROVIDER, message));
        }
        if self.banned {
            return Err(Error::provider(PROVIDER, "this account is banned"));
        }

        let uuid = self.uuid.unwrap_or_default();
        Ok(AuthPayload::new(json!({
            "access_token": self.access_token.unwrap_or_else(|| previous_token.to_string()),
            "client_token": uuid,
            "uuid": uuid,
            "name": self.username,
            "user_properties": "{}",
            "user_info": {
                "id": self.id,
                "role": self.role,
                "monnaie": self.money,
                "verified": self.email_verified,
            },
            "meta": {
                "type": PROVIDER,
                "online": false,
            },
        })))
    }
}

/// Verifies stored sessions against an AZauth (Azuriom) server
pub struct AzAuthClient {
    client: Client,
    base_url: String,
}

impl AzAuthClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AzAuthenticator for AzAuthClient {
    #[instrument(skip(self, account), fields(username = %account.name))]
    async fn verify(&self, account: &Account) -> Result<AuthPayload, Error> {
        let access_token = require_credential(account, "access_token", PROVIDER)?;

        let response = self
            .client
            .post(join_url(&self.base_url, "api/auth/verify"))
            .json(&json!({ "access_token": access_token }))
            .send()
            .await
            .map_err(send_error)?;

        // Rejected sessions come back with a 4xx and an error document
        let body: VerifyResponse = response.json().await.map_err(|e| {
            Error::InvalidServerResponse(format!("failed to parse verify response: {}", e))
        })?;

        let payload = body.into_payload(access_token)?;
        info!("azauth session verified");
        Ok(payload)
    }
}
