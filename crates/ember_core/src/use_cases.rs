mod account_sync;
mod accounts;
mod instances;
mod launch;
mod login;
mod settings;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::warn;

pub use account_sync::{
    AccountSyncUseCase, RefreshOutcome, RemovedAccount, SyncEffect, SyncReport, SyncState,
};
pub use accounts::AccountsUseCase;
pub use instances::{InstanceAccessUseCase, RedeemOutcome};
pub use launch::LaunchUseCase;
pub use login::{validate_offline_name, LoginUseCase, UNKNOWN_ACCOUNT_NAME};
pub use settings::SettingsUseCase;

use crate::authorization;
use crate::config::ClientConfig;
use crate::entities::{Account, InstanceDescriptor};
use crate::error::Error;
use crate::ports::{
    AccountRepository, AzAuthenticator, InstanceCatalog, LauncherView, MicrosoftAuthenticator,
    MojangAuthenticator,
};

/// One adapter per account provider
#[derive(Clone)]
pub struct ProviderSet {
    pub microsoft: Arc<dyn MicrosoftAuthenticator>,
    pub azauth: Arc<dyn AzAuthenticator>,
    pub mojang: Arc<dyn MojangAuthenticator>,
}

/// Account the config record points at, if it still exists
pub(crate) async fn selected_account<A: AccountRepository + ?Sized>(
    accounts: &A,
    config: &ClientConfig,
) -> Result<Option<Account>, Error> {
    match &config.selected_account {
        Some(id) => accounts.get_account(id).await,
        None => Ok(None),
    }
}

/// Move the instance selection off whitelist instances `account` cannot play.
///
/// A catalog failure only skips the check; the caller still persists the config.
pub(crate) async fn reselect_instance_for<I, V>(
    catalog: &I,
    view: &V,
    config: &mut ClientConfig,
    account: &Account,
) where
    I: InstanceCatalog + ?Sized,
    V: LauncherView + ?Sized,
{
    let instances: Vec<InstanceDescriptor> = match catalog.list_instances().await {
        Ok(instances) => instances,
        Err(e) => {
            warn!(error = %e, "could not load instances, keeping instance selection");
            return;
        }
    };

    if let Some(fallback) =
        authorization::reconcile_instance_selection(config, &instances, &account.name)
    {
        view.instance_status(fallback);
    }
}
