use std::sync::Arc;

use tracing::{info, instrument};

use crate::entities::{Account, AccountId, Panel};
use crate::error::Error;
use crate::ports::{AccountRepository, ClientConfigRepository, InstanceCatalog, LauncherView};
use crate::use_cases::reselect_instance_for;

/// Listing, switching and removing stored accounts
pub struct AccountsUseCase<A, C, I, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    I: InstanceCatalog,
    V: LauncherView,
{
    account_repo: Arc<A>,
    config_repo: Arc<C>,
    catalog: Arc<I>,
    view: Arc<V>,
}

impl<A, C, I, V> AccountsUseCase<A, C, I, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    I: InstanceCatalog,
    V: LauncherView,
{
    pub fn new(account_repo: Arc<A>, config_repo: Arc<C>, catalog: Arc<I>, view: Arc<V>) -> Self {
        Self {
            account_repo,
            config_repo,
            catalog,
            view,
        }
    }

    /// Stored accounts paired with whether each is the selected one
    pub async fn list(&self) -> Result<Vec<(Account, bool)>, Error> {
        let config = self.config_repo.load().await?;
        let accounts = self.account_repo.list_accounts().await?;
        Ok(accounts
            .into_iter()
            .map(|account| {
                let selected = config.is_selected(&account.id);
                (account, selected)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn select(&self, id: &AccountId) -> Result<Account, Error> {
        let account = self
            .account_repo
            .get_account(id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))?;

        self.make_selected(&account).await?;
        Ok(account)
    }

    /// Delete an account. Returns the account selected afterwards, if any.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &AccountId) -> Result<Option<AccountId>, Error> {
        if self.account_repo.get_account(id).await?.is_none() {
            return Err(Error::AccountNotFound(id.to_string()));
        }

        self.account_repo.delete_account(id).await?;
        self.view.account_removed(id);
        info!(account = %id, "account removed");

        let mut config = self.config_repo.load().await?;
        let remaining = self.account_repo.list_accounts().await?;

        let Some(first) = remaining.first() else {
            if config.selected_account.take().is_some() {
                self.config_repo.save(&config).await?;
            }
            self.view.show_panel(Panel::Login);
            return Ok(None);
        };

        if config.is_selected(id) {
            self.make_selected(first).await?;
            return Ok(Some(first.id.clone()));
        }
        Ok(config.selected_account)
    }

    async fn make_selected(&self, account: &Account) -> Result<(), Error> {
        let mut config = self.config_repo.load().await?;
        config.selected_account = Some(account.id.clone());
        reselect_instance_for(
            self.catalog.as_ref(),
            self.view.as_ref(),
            &mut config,
            account,
        )
        .await;
        self.config_repo.save(&config).await?;

        self.view.account_selected(&account.id);
        info!(username = %account.name, "account selected");
        Ok(())
    }
}
