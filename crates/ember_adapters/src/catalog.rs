use async_trait::async_trait;
use ember_core::entities::{InstanceDescriptor, LauncherManifest};
use ember_core::ports::InstanceCatalog;
use ember_core::Error;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::network::{join_url, read_json, send_error};

pub const INSTANCES_PATH: &str = "files/?instance=null";
pub const MANIFEST_PATH: &str = "launcher/config-launcher/config.json";

/// Instance list and remote launcher configuration served by the launcher server
pub struct HttpInstanceCatalog {
    client: Client,
    api_url: String,
}

impl HttpInstanceCatalog {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

/// The server answers either with an object keyed by instance name or with a
/// plain list. Keys win over any `name` inside the entry. Entries that do not
/// describe an instance are skipped. Server order is kept (`preserve_order`).
pub fn parse_instance_list(body: Value) -> Result<Vec<InstanceDescriptor>, Error> {
    let entries: Vec<(Option<String>, Value)> = match body {
        Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        other => {
            return Err(Error::InvalidServerResponse(format!(
                "expected an instance list, got {}",
                other
            )))
        }
    };

    let mut instances = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match serde_json::from_value::<InstanceDescriptor>(value) {
            Ok(mut instance) => {
                if let Some(key) = key {
                    instance.name = key;
                }
                if instance.name.is_empty() {
                    warn!("skipping unnamed instance");
                    continue;
                }
                instances.push(instance);
            }
            Err(e) => warn!(instance = ?key, error = %e, "skipping malformed instance"),
        }
    }
    Ok(instances)
}

#[async_trait]
impl InstanceCatalog for HttpInstanceCatalog {
    #[instrument(skip(self))]
    async fn list_instances(&self) -> Result<Vec<InstanceDescriptor>, Error> {
        let url = join_url(&self.api_url, INSTANCES_PATH);
        let response = self.client.get(&url).send().await.map_err(send_error)?;
        let body: Value = read_json(response, "instance list").await?;

        let instances = parse_instance_list(body)?;
        debug!(count = instances.len(), "instance list fetched");
        Ok(instances)
    }

    #[instrument(skip(self))]
    async fn launcher_manifest(&self) -> Result<LauncherManifest, Error> {
        let url = join_url(&self.api_url, MANIFEST_PATH);
        let response = self.client.get(&url).send().await.map_err(send_error)?;
        read_json(response, "launcher config").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::authorization::reconcile_instance_selection;
    use ember_core::config::ClientConfig;
    use ember_core::entities::AccessRule;
    use serde_json::json;

    #[test]
    fn test_parse_keyed_object() {
        let body = json!({
            "Survival": {
                "url": "http://localhost/files/?instance=Survival",
                "loadder": {
                    "minecraft_version": "1.20.1",
                    "loadder_type": "forge",
                    "loadder_version": "47.2.0"
                },
                "verify": true,
                "ignored": ["config", "logs"],
                "whitelistActive": true,
                "whitelist": ["Alice"]
            },
            "Vault": { "password": "X123" }
        });

        let instances = parse_instance_list(body).unwrap();

        assert_eq!(instances.len(), 2);
        let (survival, vault) = (&instances[0], &instances[1]);
        assert_eq!(survival.name, "Survival");
        assert_eq!(survival.minecraft_version(), Some("1.20.1"));
        assert_eq!(survival.ignored, ["config", "logs"]);
        assert_eq!(
            survival.access(),
            AccessRule::Whitelist(&["Alice".to_string()])
        );
        assert_eq!(vault.name, "Vault");
        assert_eq!(vault.access(), AccessRule::Password("X123"));
    }

    #[test]
    fn test_keyed_object_keeps_server_order() {
        let body: Value = serde_json::from_str(
            r#"{"Zeta":{},"Arena":{"whitelistActive":true,"whitelist":["Alice"]},"Lobby":{}}"#,
        )
        .unwrap();

        let instances = parse_instance_list(body).unwrap();
        let names: Vec<&str> = instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Arena", "Lobby"]);

        // Fallback is the first open instance as served, not alphabetically
        let mut config = ClientConfig {
            selected_instance: Some("Arena".to_string()),
            ..ClientConfig::default()
        };
        let fallback = reconcile_instance_selection(&mut config, &instances, "Carol");
        assert_eq!(fallback.map(|i| i.name.as_str()), Some("Zeta"));
        assert_eq!(config.selected_instance.as_deref(), Some("Zeta"));
    }

    #[test]
    fn test_parse_list_keeps_order_and_skips_junk() {
        let body = json!([
            { "name": "Lobby" },
            { "url": "http://localhost/unnamed" },
            "not an instance",
            { "name": "Arena", "whitelistActive": false }
        ]);

        let names: Vec<String> = parse_instance_list(body)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();

        assert_eq!(names, ["Lobby", "Arena"]);
    }

    #[test]
    fn test_parse_rejects_scalar_body() {
        assert!(matches!(
            parse_instance_list(json!("maintenance")),
            Err(Error::InvalidServerResponse(_))
        ));
    }

    #[test]
    fn test_manifest_shape() {
        let manifest: LauncherManifest = serde_json::from_value(json!({
            "maintenance": true,
            "maintenance_message": "Back soon",
            "client_id": "abc",
            "dataDirectory": "Arcadia",
            "online": "https://auth.example.net"
        }))
        .unwrap();

        assert_eq!(manifest.azauth_url(), Some("https://auth.example.net"));
        assert_eq!(manifest.data_directory.as_deref(), Some("Arcadia"));
        assert!(matches!(manifest.ensure_available(), Err(Error::Maintenance(m)) if m == "Back soon"));
    }
}
