use std::path::PathBuf;

use async_trait::async_trait;
use ember_core::entities::{Account, AccountId, AuthPayload};
use ember_core::ports::AccountRepository;
use ember_core::Error;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument};

#[derive(Debug, Serialize, Deserialize, Default)]
struct AccountStore {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// File-based account repository
pub struct FileAccountRepository {
    store_path: PathBuf,
}

impl FileAccountRepository {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            store_path: config_dir.join("accounts.json"),
        }
    }

    async fn load(&self) -> Result<AccountStore, Error> {
        if !fs::try_exists(&self.store_path).await.unwrap_or(false) {
            return Ok(AccountStore::default());
        }

        let content = fs::read_to_string(&self.store_path).await?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("failed to parse accounts file: {}", e)))
    }

    async fn save(&self, store: &AccountStore) -> Result<(), Error> {
        if let Some(parent) = self.store_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(store)
            .map_err(|e| Error::Storage(format!("failed to serialize accounts: {}", e)))?;
        fs::write(&self.store_path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for FileAccountRepository {
    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<Account>, Error> {
        let store = self.load().await?;
        Ok(store.accounts)
    }

    #[instrument(skip(self))]
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let store = self.load().await?;
        Ok(store.accounts.into_iter().find(|a| &a.id == id))
    }

    #[instrument(skip(self, payload))]
    async fn create_account(&self, payload: AuthPayload) -> Result<Account, Error> {
        let account = Account::from_payload(AccountId::generate(), payload)?;
        let mut store = self.load().await?;

        debug!(username = %account.name, id = %account.id, "creating account");
        store.accounts.push(account.clone());

        self.save(&store).await?;
        Ok(account)
    }

    #[instrument(skip(self, account))]
    async fn update_account(&self, account: &Account) -> Result<(), Error> {
        let mut store = self.load().await?;

        let existing = store
            .accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| Error::AccountNotFound(account.id.to_string()))?;

        debug!(username = %account.name, "updating account");
        *existing = account.clone();

        self.save(&store).await
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: &AccountId) -> Result<(), Error> {
        let mut store = self.load().await?;
        store.accounts.retain(|a| &a.id != id);
        self.save(&store).await
    }
}
