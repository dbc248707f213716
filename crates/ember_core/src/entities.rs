use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Opaque identifier assigned when an account is first stored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authentication backend an account was created with.
///
/// Stored on disk as the provider's wire name (`Xbox`, `AZauth`, `Mojang`).
/// Anything else is kept verbatim so it can be reported and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderType {
    Microsoft,
    AzAuth,
    Mojang,
    Unknown(String),
}

impl ProviderType {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderType::Microsoft => "Xbox",
            ProviderType::AzAuth => "AZauth",
            ProviderType::Mojang => "Mojang",
            ProviderType::Unknown(kind) => kind,
        }
    }
}

impl Default for ProviderType {
    fn default() -> Self {
        ProviderType::Unknown(String::new())
    }
}

impl From<String> for ProviderType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Xbox" => ProviderType::Microsoft,
            "AZauth" => ProviderType::AzAuth,
            "Mojang" => ProviderType::Mojang,
            _ => ProviderType::Unknown(value),
        }
    }
}

impl From<ProviderType> for String {
    fn from(value: ProviderType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountMeta {
    #[serde(rename = "type", default)]
    pub provider: ProviderType,
    /// Only meaningful for Mojang accounts: `false` means a local offline profile
    #[serde(default)]
    pub online: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stored account record.
///
/// Tokens and profile data are owned by the provider adapter and kept as an
/// opaque map next to the fields this crate actually reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub meta: AccountMeta,
    #[serde(flatten)]
    pub credentials: Map<String, Value>,
}

impl Account {
    /// Build a stored record from a provider payload, keeping `id`.
    ///
    /// Fails when the payload carries no usable display name.
    pub fn from_payload(id: AccountId, payload: AuthPayload) -> Result<Self, Error> {
        let name = payload
            .display_name()
            .ok_or(Error::UnresolvableDisplayName)?
            .to_string();

        let mut fields = match payload.into_inner() {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidServerResponse(format!(
                    "expected an account object, got {}",
                    other
                )))
            }
        };
        fields.remove("ID");
        fields.insert("id".to_string(), Value::String(id.as_str().to_string()));
        fields.insert("name".to_string(), Value::String(name));

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| Error::InvalidServerResponse(format!("malformed account payload: {}", e)))
    }

    pub fn provider(&self) -> &ProviderType {
        &self.meta.provider
    }

    pub fn is_offline(&self) -> bool {
        self.meta.provider == ProviderType::Mojang && !self.meta.online
    }

    /// Records written after a failed login carry `error: true`
    pub fn has_error_flag(&self) -> bool {
        matches!(self.credentials.get("error"), Some(Value::Bool(true)))
    }

    pub fn access_token(&self) -> Option<&str> {
        self.credentials.get("access_token").and_then(Value::as_str)
    }

    /// Full record as handed back to provider adapters
    pub fn to_payload(&self) -> AuthPayload {
        AuthPayload(serde_json::to_value(self).unwrap_or(Value::Null))
    }
}

/// Name lookup order used when an account is first saved
const LOGIN_NAME_PATHS: [&str; 8] = [
    "name",
    "profile.name",
    "profile.xboxProfile.gamertag",
    "profile.xboxProfile.username",
    "profile.realName",
    "profile.displayName",
    "profile.id",
    "uuid",
];

/// Name lookup order used when an existing account is refreshed
const DISPLAY_NAME_PATHS: [&str; 2] = ["name", "profile.name"];

/// Raw account document returned by a provider adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthPayload(Value);

impl AuthPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    fn lookup(&self, path: &str) -> Option<&str> {
        path.split('.')
            .try_fold(&self.0, |value, key| value.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn display_name(&self) -> Option<&str> {
        DISPLAY_NAME_PATHS.iter().find_map(|path| self.lookup(path))
    }

    pub fn login_name(&self) -> Option<&str> {
        LOGIN_NAME_PATHS.iter().find_map(|path| self.lookup(path))
    }

    pub fn set_name(&mut self, name: &str) {
        if let Value::Object(map) = &mut self.0 {
            map.insert("name".to_string(), Value::String(name.to_string()));
        }
    }

    /// Error message when the payload is a provider error document
    pub fn error_message(&self) -> Option<String> {
        match self.0.get("error") {
            Some(Value::Bool(true)) => Some(
                ["errorMessage", "message"]
                    .iter()
                    .find_map(|key| self.0.get(*key).and_then(Value::as_str))
                    .unwrap_or("unknown error")
                    .to_string(),
            ),
            _ => None,
        }
    }
}

// ============================================================================
// Instances
// ============================================================================

/// How an instance restricts who may see it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule<'a> {
    Open,
    Password(&'a str),
    Whitelist(&'a [String]),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoaderInfo {
    #[serde(default)]
    pub minecraft_version: Option<String>,
    #[serde(rename = "loadder_type", alias = "loader_type", default)]
    pub loader_type: Option<String>,
    #[serde(rename = "loadder_version", alias = "loader_version", default)]
    pub loader_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerStatusTarget {
    #[serde(rename = "nameServer", default)]
    pub name_server: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Background/avatar field: a single URL or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaSource {
    Single(String),
    Many(Vec<String>),
}

fn is_video(url: &str) -> bool {
    let path = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
    [".mp4", ".webm", ".ogg"].iter().any(|ext| path.ends_with(ext))
}

impl MediaSource {
    /// First still image, or the first entry when the list only has videos
    pub fn first_image(&self) -> Option<&str> {
        match self {
            MediaSource::Single(url) if url.is_empty() => None,
            MediaSource::Single(url) => Some(url),
            MediaSource::Many(urls) => urls
                .iter()
                .find(|u| !is_video(u))
                .or_else(|| urls.first())
                .map(String::as_str),
        }
    }

    pub fn first(&self) -> Option<&str> {
        match self {
            MediaSource::Single(url) => Some(url.as_str()).filter(|u| !u.is_empty()),
            MediaSource::Many(urls) => urls.first().map(String::as_str),
        }
    }
}

fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

/// Instance entry published by the launcher server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "loadder", alias = "loader", default)]
    pub loader: Option<LoaderInfo>,
    #[serde(default)]
    pub verify: bool,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub ignored: Vec<String>,
    #[serde(default)]
    pub status: Option<ServerStatusTarget>,
    #[serde(default, alias = "backgroundUrl")]
    pub background: Option<MediaSource>,
    #[serde(default, alias = "avatarUrl", alias = "iconUrl", alias = "icon")]
    pub avatar: Option<MediaSource>,
    #[serde(default, alias = "musicUrl")]
    pub music: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub whitelist_active: bool,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub whitelist: Vec<String>,
}

impl InstanceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Password wins over the whitelist; an empty password means none.
    pub fn access(&self) -> AccessRule<'_> {
        match self.password() {
            Some(password) => AccessRule::Password(password),
            None if self.whitelist_active => AccessRule::Whitelist(&self.whitelist),
            None => AccessRule::Open,
        }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn background_image(&self) -> Option<&str> {
        self.background.as_ref().and_then(MediaSource::first_image)
    }

    /// Avatar for list entries, falling back to the background image
    pub fn avatar_image(&self) -> Option<&str> {
        self.avatar
            .as_ref()
            .and_then(MediaSource::first_image)
            .or_else(|| self.background_image())
    }

    pub fn minecraft_version(&self) -> Option<&str> {
        self.loader.as_ref()?.minecraft_version.as_deref()
    }
}

// ============================================================================
// Launcher server documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publish_date: Option<String>,
}

/// Remote launcher configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LauncherManifest {
    #[serde(default)]
    pub maintenance: bool,
    #[serde(default)]
    pub maintenance_message: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(rename = "dataDirectory", default)]
    pub data_directory: Option<String>,
    /// AZauth server URL, or `false` when the server only allows Microsoft/offline
    #[serde(default)]
    pub online: Value,
}

impl LauncherManifest {
    pub fn ensure_available(&self) -> Result<(), Error> {
        if self.maintenance {
            return Err(Error::Maintenance(
                self.maintenance_message
                    .clone()
                    .unwrap_or_else(|| "maintenance in progress".to_string()),
            ));
        }
        Ok(())
    }

    pub fn azauth_url(&self) -> Option<&str> {
        self.online.as_str().filter(|s| !s.is_empty())
    }
}

/// Launcher screens the UI can switch between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Login,
    Home,
    Settings,
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Panel::Login => write!(f, "login"),
            Panel::Home => write!(f, "home"),
            Panel::Settings => write!(f, "settings"),
        }
    }
}
