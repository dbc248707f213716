use async_trait::async_trait;
use ember_core::ports::{UnlockValidator, UnlockVerdict};
use ember_core::Error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::network::send_error;

/// Message the validation endpoint sends when the user already holds the unlock
pub const ALREADY_UNLOCKED_MESSAGE: &str = "Ya tienes acceso a esta instancia";

#[derive(Debug, Serialize)]
struct ValidationRequest<'a> {
    codigo: &'a str,
    usuario: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub instance: Option<String>,
}

impl ValidationResponse {
    pub fn into_verdict(self) -> Result<UnlockVerdict, Error> {
        match self.status.as_str() {
            "success" => self
                .instance_name
                .or(self.instance)
                .filter(|name| !name.is_empty())
                .map(|instance| UnlockVerdict::Granted { instance })
                .ok_or_else(|| {
                    Error::InvalidServerResponse("code accepted without an instance name".into())
                }),
            "error" if self.message.as_deref() == Some(ALREADY_UNLOCKED_MESSAGE) => {
                Ok(UnlockVerdict::AlreadyUnlocked)
            }
            _ => Ok(UnlockVerdict::Invalid {
                message: self
                    .message
                    .unwrap_or_else(|| "invalid code or instance not found".to_string()),
            }),
        }
    }
}

/// Redeems unlock codes against the validation endpoint
pub struct HttpUnlockValidator {
    client: Client,
    validation_url: String,
}

impl HttpUnlockValidator {
    pub fn new(client: Client, validation_url: impl Into<String>) -> Self {
        Self {
            client,
            validation_url: validation_url.into(),
        }
    }
}

#[async_trait]
impl UnlockValidator for HttpUnlockValidator {
    #[instrument(skip(self, code))]
    async fn validate(&self, code: &str, user: &str) -> Result<UnlockVerdict, Error> {
        let response = self
            .client
            .post(&self.validation_url)
            .json(&ValidationRequest {
                codigo: code,
                usuario: user,
            })
            .send()
            .await
            .map_err(send_error)?;

        // Rejections come back as JSON with an error status, so the HTTP status is not checked
        let body: ValidationResponse = response.json().await.map_err(|e| {
            Error::InvalidServerResponse(format!("failed to parse validation response: {}", e))
        })?;
        debug!(status = %body.status, "validation response received");

        body.into_verdict()
    }
}
