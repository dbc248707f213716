//! In-memory port implementations shared by the use case tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::entities::{
    Account, AccountId, AuthPayload, InstanceDescriptor, LauncherManifest, NewsItem, Panel,
};
use crate::error::Error;
use crate::launch_options::{LaunchEvent, LaunchOptions};
use crate::ledger::UnlockLedger;
use crate::ports::{
    AccountRepository, AzAuthenticator, ClientConfigRepository, GameLauncher, InstanceCatalog,
    LauncherView, MicrosoftAuthenticator, MojangAuthenticator, NewsRepository,
    UnlockLedgerRepository, UnlockValidator, UnlockVerdict,
};
use crate::use_cases::ProviderSet;

pub fn account(id: &str, name: &str, provider: &str) -> Account {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "uuid": format!("uuid-{}", id),
        "access_token": "old-token",
        "meta": { "type": provider, "online": true }
    }))
    .unwrap()
}

pub fn offline_account(id: &str, name: &str) -> Account {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "meta": { "type": "Mojang", "online": false }
    }))
    .unwrap()
}

// ============================================================================
// Repositories
// ============================================================================

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<Vec<Account>>,
    next_id: AtomicUsize,
    pub fail_deletes: AtomicBool,
}

impl InMemoryAccounts {
    pub fn with(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|a| a.id.as_str().to_string())
            .collect()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccounts {
    async fn list_accounts(&self) -> Result<Vec<Account>, Error> {
        Ok(self.snapshot())
    }

    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        Ok(self.snapshot().into_iter().find(|a| &a.id == id))
    }

    async fn create_account(&self, payload: AuthPayload) -> Result<Account, Error> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let account = Account::from_payload(AccountId::new(format!("new-{}", n)), payload)?;
        self.accounts.lock().unwrap().push(account.clone());
        Ok(account)
    }

    async fn update_account(&self, account: &Account) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().unwrap();
        let slot = accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| Error::AccountNotFound(account.id.to_string()))?;
        *slot = account.clone();
        Ok(())
    }

    async fn delete_account(&self, id: &AccountId) -> Result<(), Error> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Storage("disk full".to_string()));
        }
        self.accounts.lock().unwrap().retain(|a| &a.id != id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryClientConfig {
    stored: Mutex<Option<ClientConfig>>,
    /// Every record passed to `save`, in order
    pub history: Mutex<Vec<ClientConfig>>,
}

impl InMemoryClientConfig {
    pub fn with(config: ClientConfig) -> Self {
        Self {
            stored: Mutex::new(Some(config)),
            ..Default::default()
        }
    }

    pub fn current(&self) -> ClientConfig {
        self.stored.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

#[async_trait]
impl ClientConfigRepository for InMemoryClientConfig {
    async fn load(&self) -> Result<ClientConfig, Error> {
        Ok(self.current())
    }

    async fn exists(&self) -> bool {
        self.stored.lock().unwrap().is_some()
    }

    async fn save(&self, config: &ClientConfig) -> Result<(), Error> {
        *self.stored.lock().unwrap() = Some(config.clone());
        self.history.lock().unwrap().push(config.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    ledger: Mutex<UnlockLedger>,
    pub saves: AtomicUsize,
    pub unreadable: AtomicBool,
}

impl InMemoryLedger {
    pub fn with(ledger: UnlockLedger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            ..Default::default()
        }
    }

    pub fn current(&self) -> UnlockLedger {
        self.ledger.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnlockLedgerRepository for InMemoryLedger {
    async fn load(&self) -> Result<UnlockLedger, Error> {
        if self.unreadable.load(Ordering::SeqCst) {
            return Err(Error::Storage("unlock ledger is corrupt".to_string()));
        }
        Ok(self.current())
    }

    async fn save(&self, ledger: &UnlockLedger) -> Result<(), Error> {
        *self.ledger.lock().unwrap() = ledger.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Launcher server
// ============================================================================

#[derive(Default)]
pub struct StaticCatalog {
    pub instances: Vec<InstanceDescriptor>,
    pub manifest: LauncherManifest,
    pub news: Vec<NewsItem>,
    pub offline: bool,
}

impl StaticCatalog {
    pub fn with(instances: Vec<InstanceDescriptor>) -> Self {
        Self {
            instances,
            ..Default::default()
        }
    }

    fn check_online(&self) -> Result<(), Error> {
        if self.offline {
            Err(Error::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl InstanceCatalog for StaticCatalog {
    async fn list_instances(&self) -> Result<Vec<InstanceDescriptor>, Error> {
        self.check_online()?;
        Ok(self.instances.clone())
    }

    async fn launcher_manifest(&self) -> Result<LauncherManifest, Error> {
        self.check_online()?;
        Ok(self.manifest.clone())
    }
}

#[async_trait]
impl NewsRepository for StaticCatalog {
    async fn latest_news(&self) -> Result<Vec<NewsItem>, Error> {
        self.check_online()?;
        Ok(self.news.clone())
    }
}

/// Code to verdict table; unknown codes are invalid
#[derive(Default)]
pub struct CodeTable {
    pub verdicts: HashMap<String, UnlockVerdict>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl CodeTable {
    pub fn grant(code: &str, instance: &str) -> Self {
        let mut table = Self::default();
        table.verdicts.insert(
            code.to_string(),
            UnlockVerdict::Granted {
                instance: instance.to_string(),
            },
        );
        table
    }
}

#[async_trait]
impl UnlockValidator for CodeTable {
    async fn validate(&self, code: &str, user: &str) -> Result<UnlockVerdict, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((code.to_string(), user.to_string()));
        Ok(self
            .verdicts
            .get(code)
            .cloned()
            .unwrap_or(UnlockVerdict::Invalid {
                message: "invalid code".to_string(),
            }))
    }
}

// ============================================================================
// Providers
// ============================================================================

/// What a scripted provider answers for one account name
#[derive(Debug, Clone)]
pub enum Script {
    /// Refresh succeeds; the payload keeps the account's provider and name
    Renew,
    /// Refresh succeeds but the payload has no name anywhere
    Nameless,
    /// Adapter reports `{ error: true, ... }`
    ErrorDocument(String),
    /// Adapter call itself fails
    Fail(String),
}

/// Answers every provider port from a per-name script; unscripted names renew
#[derive(Default)]
pub struct ScriptedProviders {
    pub scripts: HashMap<String, Script>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedProviders {
    pub fn with(scripts: &[(&str, Script)]) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts
                .iter()
                .map(|(name, script)| (name.to_string(), script.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set(self: &Arc<Self>) -> ProviderSet {
        ProviderSet {
            microsoft: self.clone(),
            azauth: self.clone(),
            mojang: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, op: &str, name: &str, base: Value) -> Result<AuthPayload, Error> {
        self.calls.lock().unwrap().push(format!("{}:{}", op, name));

        match self.scripts.get(name).cloned().unwrap_or(Script::Renew) {
            Script::Renew => {
                let mut value = base;
                value["access_token"] = json!("new-token");
                Ok(AuthPayload::new(value))
            }
            Script::Nameless => {
                let mut value = base;
                if let Value::Object(map) = &mut value {
                    map.remove("name");
                    map.remove("profile");
                }
                Ok(AuthPayload::new(value))
            }
            Script::ErrorDocument(message) => Ok(AuthPayload::new(json!({
                "error": true,
                "errorMessage": message
            }))),
            Script::Fail(message) => Err(Error::Network(message)),
        }
    }

    fn renewed(&self, op: &str, account: &Account) -> Result<AuthPayload, Error> {
        let mut value = account.to_payload().into_inner();
        // Providers answer with their own id field, never the stored one
        if let Value::Object(map) = &mut value {
            map.remove("id");
            map.insert("ID".to_string(), json!("provider-side-id"));
        }
        self.answer(op, &account.name, value)
    }
}

#[async_trait]
impl MicrosoftAuthenticator for ScriptedProviders {
    async fn refresh(&self, account: &Account) -> Result<AuthPayload, Error> {
        self.renewed("xbox", account)
    }
}

#[async_trait]
impl AzAuthenticator for ScriptedProviders {
    async fn verify(&self, account: &Account) -> Result<AuthPayload, Error> {
        self.renewed("azauth", account)
    }
}

#[async_trait]
impl MojangAuthenticator for ScriptedProviders {
    async fn login(&self, name: &str) -> Result<AuthPayload, Error> {
        self.answer(
            "mojang-login",
            name,
            json!({
                "name": name,
                "uuid": format!("offline-{}", name),
                "meta": { "type": "Mojang", "online": false }
            }),
        )
    }

    async fn refresh(&self, account: &Account) -> Result<AuthPayload, Error> {
        self.renewed("mojang-refresh", account)
    }
}

// ============================================================================
// Launcher and view
// ============================================================================

#[derive(Default)]
pub struct RecordingLauncher {
    pub launched: Mutex<Vec<LaunchOptions>>,
    pub events: Vec<LaunchEvent>,
}

#[async_trait]
impl GameLauncher for RecordingLauncher {
    async fn launch(
        &self,
        options: &LaunchOptions,
        on_event: &(dyn Fn(LaunchEvent) + Send + Sync),
    ) -> Result<(), Error> {
        self.launched.lock().unwrap().push(options.clone());
        for event in &self.events {
            on_event(event.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Refreshing(String),
    Added(String),
    Removed(String),
    Selected(String),
    Status(String),
    Panel(Panel),
}

#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn last_panel(&self) -> Option<Panel> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::Panel(panel) => Some(panel),
            _ => None,
        })
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl LauncherView for RecordingView {
    fn account_refreshing(&self, account: &Account) {
        self.push(ViewEvent::Refreshing(account.name.clone()));
    }

    fn account_added(&self, account: &Account) {
        self.push(ViewEvent::Added(account.name.clone()));
    }

    fn account_removed(&self, id: &AccountId) {
        self.push(ViewEvent::Removed(id.to_string()));
    }

    fn account_selected(&self, id: &AccountId) {
        self.push(ViewEvent::Selected(id.to_string()));
    }

    fn instance_status(&self, instance: &InstanceDescriptor) {
        self.push(ViewEvent::Status(instance.name.clone()));
    }

    fn show_panel(&self, panel: Panel) {
        self.push(ViewEvent::Panel(panel));
    }
}
