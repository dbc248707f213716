use async_trait::async_trait;
use ember_core::entities::{Account, AuthPayload};
use ember_core::ports::MicrosoftAuthenticator;
use ember_core::Error;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::{provider_json, require_credential};
use crate::network::send_error;

const PROVIDER: &str = "Xbox";

/// Public client id of the official launcher, used when none is configured
pub const DEFAULT_CLIENT_ID: &str = "00000000402b5328";

const TOKEN_URL: &str = "https://login.live.com/oauth20_token.srf";
const XBL_AUTH_URL: &str = "https://user.auth.xboxlive.com/user/authenticate";
const XSTS_AUTH_URL: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
const MC_LOGIN_URL: &str = "https://api.minecraftservices.com/authentication/login_with_xbox";
const MC_PROFILE_URL: &str = "https://api.minecraftservices.com/minecraft/profile";
const XBOX_PROFILE_URL: &str = "https://profile.xboxlive.com/users/me/profile/settings";

const OAUTH_SCOPE: &str = "service::user.auth.xboxlive.com::MBI_SSL";

#[derive(Debug, Deserialize)]
struct OAuthTokens {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XboxToken {
    token: String,
    display_claims: DisplayClaims,
}

#[derive(Debug, Deserialize)]
struct DisplayClaims {
    xui: Vec<Value>,
}

impl XboxToken {
    fn user_hash(&self) -> Result<&str, Error> {
        self.display_claims
            .xui
            .first()
            .and_then(|claim| claim.get("uhs"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::provider(PROVIDER, "xbox token carries no user hash"))
    }
}

#[derive(Debug, Deserialize)]
struct XstsError {
    #[serde(rename = "XErr", default)]
    xerr: u64,
}

#[derive(Debug, Deserialize)]
struct MinecraftToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct MinecraftProfile {
    id: String,
    name: String,
    #[serde(default)]
    skins: Vec<Value>,
    #[serde(default)]
    capes: Vec<Value>,
}

/// Human readable reason for an XSTS `XErr` code
pub fn xsts_error_message(code: u64) -> String {
    match code {
        2148916233 => "this Microsoft account has no Xbox profile".to_string(),
        2148916235 => "Xbox Live is not available in this account's country".to_string(),
        2148916236 | 2148916237 => "this account needs adult verification".to_string(),
        2148916238 => "this is a child account and must be added to a family".to_string(),
        other => format!("xsts authorization failed (XErr {})", other),
    }
}

/// Refreshes stored Microsoft accounts through the Xbox Live token chain
pub struct MicrosoftRefresher {
    client: Client,
    client_id: String,
}

impl MicrosoftRefresher {
    pub fn new(client: Client, client_id: impl Into<String>) -> Self {
        Self {
            client,
            client_id: client_id.into(),
        }
    }

    async fn refresh_oauth(&self, refresh_token: &str) -> Result<OAuthTokens, Error> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", OAUTH_SCOPE),
        ];
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&form)
            .send()
            .await
            .map_err(send_error)?;
        provider_json(response, PROVIDER, "token refresh").await
    }

    async fn xbox_live(&self, oauth_token: &str) -> Result<XboxToken, Error> {
        let body = json!({
            "Properties": {
                "AuthMethod": "RPS",
                "SiteName": "user.auth.xboxlive.com",
                "RpsTicket": format!("d={}", oauth_token),
            },
            "RelyingParty": "http://auth.xboxlive.com",
            "TokenType": "JWT",
        });
        let response = self
            .client
            .post(XBL_AUTH_URL)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        provider_json(response, PROVIDER, "xbox live authentication").await
    }

    async fn xsts(&self, xbl_token: &str, relying_party: &str) -> Result<XboxToken, Error> {
        let body = json!({
            "Properties": {
                "SandboxId": "RETAIL",
                "UserTokens": [xbl_token],
            },
            "RelyingParty": relying_party,
            "TokenType": "JWT",
        });
        let response = self
            .client
            .post(XSTS_AUTH_URL)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let error: XstsError = response.json().await.map_err(|e| {
                Error::InvalidServerResponse(format!("failed to parse xsts error: {}", e))
            })?;
            return Err(Error::provider(PROVIDER, xsts_error_message(error.xerr)));
        }
        provider_json(response, PROVIDER, "xsts authorization").await
    }

    async fn minecraft_login(
        &self,
        user_hash: &str,
        xsts_token: &str,
    ) -> Result<MinecraftToken, Error> {
        let body = json!({
            "identityToken": format!("XBL3.0 x={};{}", user_hash, xsts_token),
        });
        let response = self
            .client
            .post(MC_LOGIN_URL)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        provider_json(response, PROVIDER, "minecraft login").await
    }

    async fn minecraft_profile(&self, access_token: &str) -> Result<MinecraftProfile, Error> {
        let response = self
            .client
            .get(MC_PROFILE_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(send_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::provider(
                PROVIDER,
                "this account does not own Minecraft: Java Edition",
            ));
        }
        provider_json(response, PROVIDER, "minecraft profile").await
    }

    /// Gamertag lookup is best effort; the profile name is what gets stored
    async fn xbox_profile(&self, user_hash: &str, xbox_token: &str) -> Option<Value> {
        let response = self
            .client
            .get(XBOX_PROFILE_URL)
            .query(&[("settings", "Gamertag,PublicGamerpic")])
            .header("Authorization", format!("XBL3.0 x={};{}", user_hash, xbox_token))
            .header("x-xbl-contract-version", "2")
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json::<Value>().await.ok()
    }
}

fn gamertag(xbox_profile: &Value) -> Option<&str> {
    xbox_profile
        .pointer("/profileUsers/0/settings")?
        .as_array()?
        .iter()
        .find(|s| s.get("id").and_then(Value::as_str) == Some("Gamertag"))?
        .get("value")?
        .as_str()
}

fn build_payload(
    oauth: &OAuthTokens,
    minecraft: &MinecraftToken,
    profile: &MinecraftProfile,
    xbox_profile: Option<&Value>,
) -> AuthPayload {
    let mut payload = json!({
        "access_token": minecraft.access_token,
        "client_token": super::simple_uuid(),
        "uuid": profile.id,
        "name": profile.name,
        "refresh_token": oauth.refresh_token,
        "user_properties": "{}",
        "meta": {
            "type": PROVIDER,
            "online": true,
            "access_token_expires_in": minecraft.expires_in,
            "oauth_expires_in": oauth.expires_in,
            "demo": false,
        },
        "profile": {
            "name": profile.name,
            "skins": profile.skins,
            "capes": profile.capes,
        },
    });

    if let Some(tag) = xbox_profile.and_then(gamertag) {
        payload["profile"]["xboxProfile"] = json!({ "gamertag": tag });
    }
    AuthPayload::new(payload)
}

#[async_trait]
impl MicrosoftAuthenticator for MicrosoftRefresher {
    #[instrument(skip(self, account), fields(username = %account.name))]
    async fn refresh(&self, account: &Account) -> Result<AuthPayload, Error> {
        let refresh_token = require_credential(account, "refresh_token", PROVIDER)?;

        let oauth = self.refresh_oauth(refresh_token).await?;
        debug!("oauth token refreshed");

        let xbl = self.xbox_live(&oauth.access_token).await?;
        let xsts = self.xsts(&xbl.token, "rp://api.minecraftservices.com/").await?;
        let user_hash = xsts.user_hash()?;

        let minecraft = self.minecraft_login(user_hash, &xsts.token).await?;
        let profile = self.minecraft_profile(&minecraft.access_token).await?;

        let xbox_profile = match self.xsts(&xbl.token, "http://xboxlive.com").await {
            Ok(token) => match token.user_hash() {
                Ok(hash) => self.xbox_profile(hash, &token.token).await,
                Err(_) => None,
            },
            Err(e) => {
                debug!(error = %e, "skipping xbox profile lookup");
                None
            }
        };

        info!(username = %profile.name, "microsoft account refreshed");
        Ok(build_payload(&oauth, &minecraft, &profile, xbox_profile.as_ref()))
    }
}
