use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::authorization::is_whitelisted;
use crate::error::Error;
use crate::launch_options::{LaunchEvent, LaunchOptions};
use crate::ports::{AccountRepository, ClientConfigRepository, GameLauncher, InstanceCatalog};
use crate::use_cases::selected_account;

/// Starts the selected instance with the selected account
pub struct LaunchUseCase<A, C, I, G>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    I: InstanceCatalog,
    G: GameLauncher,
{
    account_repo: Arc<A>,
    config_repo: Arc<C>,
    catalog: Arc<I>,
    launcher: Arc<G>,
    game_path: PathBuf,
}

impl<A, C, I, G> LaunchUseCase<A, C, I, G>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    I: InstanceCatalog,
    G: GameLauncher,
{
    pub fn new(
        account_repo: Arc<A>,
        config_repo: Arc<C>,
        catalog: Arc<I>,
        launcher: Arc<G>,
        game_path: PathBuf,
    ) -> Self {
        Self {
            account_repo,
            config_repo,
            catalog,
            launcher,
            game_path,
        }
    }

    /// Resolve everything the launch needs without starting anything
    pub async fn prepare(&self) -> Result<LaunchOptions, Error> {
        match self.catalog.launcher_manifest().await {
            Ok(manifest) => manifest.ensure_available()?,
            Err(e) => warn!(error = %e, "could not fetch launcher manifest"),
        }

        let config = self.config_repo.load().await?;
        let instance_name = config
            .selected_instance
            .clone()
            .ok_or(Error::NoInstanceSelected)?;

        let instances = self.catalog.list_instances().await?;
        let instance = instances
            .iter()
            .find(|i| i.name == instance_name)
            .ok_or_else(|| Error::InstanceNotFound(instance_name.clone()))?;

        let account = selected_account(self.account_repo.as_ref(), &config)
            .await?
            .ok_or(Error::NoAccountSelected)?;

        if instance.whitelist_active && !is_whitelisted(instance, &account.name) {
            return Err(Error::InstanceNotAuthorized {
                instance: instance.name.clone(),
                account: account.name.clone(),
            });
        }

        if instance.loader.is_none() {
            warn!(instance = %instance.name, "instance has no loader info, using defaults");
        }

        Ok(LaunchOptions::build(
            instance,
            &account,
            &config,
            self.game_path.clone(),
        ))
    }

    #[instrument(skip(self, on_event))]
    pub async fn execute<F>(&self, on_event: F) -> Result<LaunchOptions, Error>
    where
        F: Fn(LaunchEvent) + Send + Sync,
    {
        let options = self.prepare().await?;
        info!(
            instance = %options.instance,
            username = %options.authenticator.name,
            version = ?options.version,
            "launching game"
        );

        self.launcher.launch(&options, &on_event).await?;
        Ok(options)
    }
}
