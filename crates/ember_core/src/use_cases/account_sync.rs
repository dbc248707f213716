use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::ClientConfig;
use crate::entities::{Account, AccountId, AuthPayload, Panel, ProviderType};
use crate::error::{Error, RefreshFailure};
use crate::ports::{AccountRepository, ClientConfigRepository, LauncherView};
use crate::use_cases::ProviderSet;

/// What a provider made of one stored account
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed(Account),
    Failed(RefreshFailure),
}

impl RefreshOutcome {
    /// Interpret a provider answer for `original`.
    ///
    /// Error documents and payloads without a display name count as failures.
    pub fn from_provider(original: &Account, result: Result<AuthPayload, Error>) -> Self {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => return RefreshOutcome::Failed(RefreshFailure::Rejected(e.to_string())),
        };

        if let Some(message) = payload.error_message() {
            return RefreshOutcome::Failed(RefreshFailure::Rejected(message));
        }

        match Account::from_payload(original.id.clone(), payload) {
            Ok(mut refreshed) => {
                if refreshed.meta.provider == ProviderType::default() {
                    refreshed.meta.provider = original.meta.provider.clone();
                }
                RefreshOutcome::Refreshed(refreshed)
            }
            Err(Error::UnresolvableDisplayName) => {
                RefreshOutcome::Failed(RefreshFailure::MissingDisplayName)
            }
            Err(e) => RefreshOutcome::Failed(RefreshFailure::Rejected(e.to_string())),
        }
    }
}

/// Side effect produced by the sync fold, performed in order
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEffect {
    UpdateAccount(Account),
    DeleteAccount(AccountId),
    PersistConfig(ClientConfig),
    AccountListed(Account),
    AccountSelected(AccountId),
    ShowPanel(Panel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedAccount {
    pub id: AccountId,
    pub name: String,
    pub reason: RefreshFailure,
}

/// Final state of a sync run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub accounts: Vec<Account>,
    pub removed: Vec<RemovedAccount>,
    pub config: ClientConfig,
    pub panel: Panel,
}

/// Accumulator threaded through the stored accounts.
///
/// Each step only sees the deletions of the steps before it, which is what
/// keeps `selected_account` pointing at an existing account between steps.
#[derive(Debug, Clone)]
pub struct SyncState {
    config: ClientConfig,
    kept: Vec<Account>,
    removed: Vec<RemovedAccount>,
}

impl SyncState {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            kept: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn kept(&self) -> &[Account] {
        &self.kept
    }

    pub fn removed(&self) -> &[RemovedAccount] {
        &self.removed
    }

    pub fn apply(&mut self, original: &Account, outcome: RefreshOutcome) -> Vec<SyncEffect> {
        let id = original.id.clone();
        let was_selected = self.config.is_selected(&id);

        match outcome {
            RefreshOutcome::Refreshed(mut account) => {
                account.id = id.clone();
                let mut effects = vec![
                    SyncEffect::UpdateAccount(account.clone()),
                    SyncEffect::AccountListed(account.clone()),
                ];
                if was_selected {
                    effects.push(SyncEffect::AccountSelected(id));
                }
                self.kept.push(account);
                effects
            }
            RefreshOutcome::Failed(reason) => {
                let mut effects = vec![SyncEffect::DeleteAccount(id.clone())];
                if was_selected {
                    self.config.selected_account = None;
                    effects.push(SyncEffect::PersistConfig(self.config.clone()));
                }
                self.removed.push(RemovedAccount {
                    id,
                    name: original.name.clone(),
                    reason,
                });
                effects
            }
        }
    }

    /// Close the fold over the accounts that are actually left in the store
    pub fn finish(mut self, remaining: Vec<Account>) -> (SyncReport, Vec<SyncEffect>) {
        let mut effects = Vec::new();

        let selection_valid = self
            .config
            .selected_account
            .as_ref()
            .map(|id| remaining.iter().any(|a| &a.id == id))
            .unwrap_or(false);

        let panel = match remaining.first() {
            None => {
                if self.config.selected_account.take().is_some() {
                    effects.push(SyncEffect::PersistConfig(self.config.clone()));
                }
                Panel::Login
            }
            Some(first) => {
                if !selection_valid {
                    self.config.selected_account = Some(first.id.clone());
                    effects.push(SyncEffect::PersistConfig(self.config.clone()));
                    effects.push(SyncEffect::AccountSelected(first.id.clone()));
                }
                Panel::Home
            }
        };
        effects.push(SyncEffect::ShowPanel(panel));

        let report = SyncReport {
            accounts: remaining,
            removed: self.removed,
            config: self.config,
            panel,
        };
        (report, effects)
    }
}

/// Refreshes every stored account at startup and keeps the selection consistent
pub struct AccountSyncUseCase<A, C, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    V: LauncherView,
{
    account_repo: Arc<A>,
    config_repo: Arc<C>,
    providers: ProviderSet,
    view: Arc<V>,
}

impl<A, C, V> AccountSyncUseCase<A, C, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    V: LauncherView,
{
    pub fn new(
        account_repo: Arc<A>,
        config_repo: Arc<C>,
        providers: ProviderSet,
        view: Arc<V>,
    ) -> Self {
        Self {
            account_repo,
            config_repo,
            providers,
            view,
        }
    }

    /// Write the default client config on first start
    pub async fn ensure_client_config(&self) -> Result<ClientConfig, Error> {
        if self.config_repo.exists().await {
            return self.config_repo.load().await;
        }
        info!("no client config found, writing defaults");
        let config = ClientConfig::default();
        self.config_repo.save(&config).await?;
        Ok(config)
    }

    /// Run the reconciliation.
    ///
    /// Never fails: storage errors are logged and the run continues with what
    /// it has in memory.
    #[instrument(skip(self))]
    pub async fn execute(&self) -> SyncReport {
        let config = match self.ensure_client_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "could not read client config, using defaults");
                ClientConfig::default()
            }
        };

        let accounts = match self.account_repo.list_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "could not read stored accounts");
                Vec::new()
            }
        };
        info!(count = accounts.len(), "refreshing stored accounts");

        let mut state = SyncState::new(config);
        for account in &accounts {
            self.view.account_refreshing(account);
            let outcome = self.refresh(account).await;
            for effect in state.apply(account, outcome) {
                self.perform(effect).await;
            }
        }

        let remaining = match self.account_repo.list_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, "could not reload accounts, using refreshed set");
                state.kept().to_vec()
            }
        };

        let (report, effects) = state.finish(remaining);
        for effect in effects {
            self.perform(effect).await;
        }

        info!(
            kept = report.accounts.len(),
            removed = report.removed.len(),
            panel = %report.panel,
            "account sync finished"
        );
        report
    }

    async fn refresh(&self, account: &Account) -> RefreshOutcome {
        if account.has_error_flag() {
            return RefreshOutcome::Failed(RefreshFailure::StoredError);
        }

        debug!(
            provider = %account.provider(),
            username = %account.name,
            "refreshing account"
        );

        let result = match account.provider() {
            ProviderType::Microsoft => self.providers.microsoft.refresh(account).await,
            ProviderType::AzAuth => self.providers.azauth.verify(account).await,
            ProviderType::Mojang if !account.meta.online => {
                self.providers.mojang.login(&account.name).await
            }
            ProviderType::Mojang => self.providers.mojang.refresh(account).await,
            ProviderType::Unknown(kind) => {
                return RefreshOutcome::Failed(RefreshFailure::UnknownProvider(kind.clone()))
            }
        };

        RefreshOutcome::from_provider(account, result)
    }

    async fn perform(&self, effect: SyncEffect) {
        match effect {
            SyncEffect::UpdateAccount(account) => {
                if let Err(e) = self.account_repo.update_account(&account).await {
                    error!(username = %account.name, error = %e, "failed to store refreshed account");
                }
            }
            SyncEffect::DeleteAccount(id) => {
                if let Err(e) = self.account_repo.delete_account(&id).await {
                    error!(account = %id, error = %e, "failed to delete account");
                }
                self.view.account_removed(&id);
            }
            SyncEffect::PersistConfig(config) => {
                if let Err(e) = self.config_repo.save(&config).await {
                    error!(error = %e, "failed to persist client config");
                }
            }
            SyncEffect::AccountListed(account) => self.view.account_added(&account),
            SyncEffect::AccountSelected(id) => self.view.account_selected(&id),
            SyncEffect::ShowPanel(panel) => self.view.show_panel(panel),
        }
    }
}
