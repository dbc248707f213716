use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::entities::{Account, AuthPayload, Panel};
use crate::error::Error;
use crate::ports::{
    AccountRepository, ClientConfigRepository, InstanceCatalog, LauncherView, MojangAuthenticator,
};
use crate::use_cases::reselect_instance_for;

/// Stored when a provider payload carries no usable name at all
pub const UNKNOWN_ACCOUNT_NAME: &str = "Unknown Account";

const MIN_OFFLINE_NAME_LEN: usize = 3;

/// Turns a fresh provider payload into the stored, selected account
pub struct LoginUseCase<A, C, I, M, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    I: InstanceCatalog,
    M: MojangAuthenticator,
    V: LauncherView,
{
    account_repo: Arc<A>,
    config_repo: Arc<C>,
    catalog: Arc<I>,
    mojang: Arc<M>,
    view: Arc<V>,
}

impl<A, C, I, M, V> LoginUseCase<A, C, I, M, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    I: InstanceCatalog,
    M: MojangAuthenticator,
    V: LauncherView,
{
    pub fn new(
        account_repo: Arc<A>,
        config_repo: Arc<C>,
        catalog: Arc<I>,
        mojang: Arc<M>,
        view: Arc<V>,
    ) -> Self {
        Self {
            account_repo,
            config_repo,
            catalog,
            mojang,
            view,
        }
    }

    /// Create an offline profile for `nick`
    #[instrument(skip(self))]
    pub async fn login_offline(&self, nick: &str) -> Result<Account, Error> {
        validate_offline_name(nick)?;

        let payload = self.mojang.login(nick).await?;
        self.complete_login(payload).await
    }

    /// Store a payload returned by any provider and make it the active account.
    ///
    /// The name is taken from the first populated name field; see
    /// [`AuthPayload::login_name`].
    pub async fn complete_login(&self, mut payload: AuthPayload) -> Result<Account, Error> {
        if let Some(message) = payload.error_message() {
            return Err(Error::provider("login", message));
        }

        let name = match payload.login_name() {
            Some(name) => name.to_string(),
            None => {
                warn!("login payload has no usable name");
                UNKNOWN_ACCOUNT_NAME.to_string()
            }
        };
        payload.set_name(&name);

        let account = self.account_repo.create_account(payload).await?;
        info!(username = %account.name, provider = %account.provider(), "account added");
        self.view.account_added(&account);

        let mut config = self.config_repo.load().await?;
        config.selected_account = Some(account.id.clone());
        reselect_instance_for(
            self.catalog.as_ref(),
            self.view.as_ref(),
            &mut config,
            &account,
        )
        .await;
        self.config_repo.save(&config).await?;

        self.view.account_selected(&account.id);
        self.view.show_panel(Panel::Home);
        Ok(account)
    }
}

/// Offline names need at least three characters and no whitespace
pub fn validate_offline_name(nick: &str) -> Result<(), Error> {
    if nick.chars().count() < MIN_OFFLINE_NAME_LEN {
        return Err(Error::InvalidUsername(format!(
            "'{}' must be at least {} characters",
            nick, MIN_OFFLINE_NAME_LEN
        )));
    }
    if nick.chars().any(char::is_whitespace) {
        return Err(Error::InvalidUsername(format!(
            "'{}' must not contain spaces",
            nick
        )));
    }
    Ok(())
}
