use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::entities::{
    Account, AccountId, AuthPayload, InstanceDescriptor, LauncherManifest, NewsItem, Panel,
};
use crate::error::Error;
use crate::launch_options::{LaunchEvent, LaunchOptions};
use crate::ledger::UnlockLedger;

// ============================================================================
// Persistence Ports
// ============================================================================

/// Stored accounts, kept in creation order
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>, Error>;

    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, Error>;

    /// Store a new account under a freshly assigned id
    async fn create_account(&self, payload: AuthPayload) -> Result<Account, Error>;

    /// Replace the stored record with the same id, keeping its position
    async fn update_account(&self, account: &Account) -> Result<(), Error>;

    async fn delete_account(&self, id: &AccountId) -> Result<(), Error>;
}

/// The singleton client config record
#[async_trait]
pub trait ClientConfigRepository: Send + Sync {
    /// Stored record, or defaults when nothing has been saved yet
    async fn load(&self) -> Result<ClientConfig, Error>;

    async fn exists(&self) -> bool;

    async fn save(&self, config: &ClientConfig) -> Result<(), Error>;
}

#[async_trait]
pub trait UnlockLedgerRepository: Send + Sync {
    async fn load(&self) -> Result<UnlockLedger, Error>;

    async fn save(&self, ledger: &UnlockLedger) -> Result<(), Error>;
}

// ============================================================================
// Launcher Server Ports
// ============================================================================

#[async_trait]
pub trait InstanceCatalog: Send + Sync {
    async fn list_instances(&self) -> Result<Vec<InstanceDescriptor>, Error>;

    async fn launcher_manifest(&self) -> Result<LauncherManifest, Error>;
}

#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn latest_news(&self) -> Result<Vec<NewsItem>, Error>;
}

/// Server verdict on an unlock code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockVerdict {
    Granted { instance: String },
    AlreadyUnlocked,
    Invalid { message: String },
}

#[async_trait]
pub trait UnlockValidator: Send + Sync {
    async fn validate(&self, code: &str, user: &str) -> Result<UnlockVerdict, Error>;
}

// ============================================================================
// Authentication Ports
// ============================================================================

/// Microsoft / Xbox Live accounts
#[async_trait]
pub trait MicrosoftAuthenticator: Send + Sync {
    /// Renew the stored tokens
    async fn refresh(&self, account: &Account) -> Result<AuthPayload, Error>;
}

/// AZauth (self hosted CMS) accounts
#[async_trait]
pub trait AzAuthenticator: Send + Sync {
    async fn verify(&self, account: &Account) -> Result<AuthPayload, Error>;
}

/// Mojang style accounts, online or offline
#[async_trait]
pub trait MojangAuthenticator: Send + Sync {
    /// Create an account from a bare name (offline profile)
    async fn login(&self, name: &str) -> Result<AuthPayload, Error>;

    async fn refresh(&self, account: &Account) -> Result<AuthPayload, Error>;
}

// ============================================================================
// Launch and UI Ports
// ============================================================================

#[async_trait]
pub trait GameLauncher: Send + Sync {
    /// Run the game to completion, reporting events through `on_event`
    async fn launch(
        &self,
        options: &LaunchOptions,
        on_event: &(dyn Fn(LaunchEvent) + Send + Sync),
    ) -> Result<(), Error>;
}

/// Notifications the use cases send to whatever renders the launcher
pub trait LauncherView: Send + Sync {
    /// A stored account is about to be refreshed
    fn account_refreshing(&self, _account: &Account) {}

    fn account_added(&self, account: &Account);

    fn account_removed(&self, _id: &AccountId) {}

    fn account_selected(&self, id: &AccountId);

    /// Status line for the selected instance
    fn instance_status(&self, instance: &InstanceDescriptor);

    fn show_panel(&self, panel: Panel);
}
