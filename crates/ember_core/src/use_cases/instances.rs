use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::authorization::{self, FilterOutcome};
use crate::entities::{AccessRule, InstanceDescriptor};
use crate::error::Error;
use crate::ledger::{GrantResult, UnlockLedger};
use crate::ports::{
    AccountRepository, ClientConfigRepository, InstanceCatalog, LauncherView,
    UnlockLedgerRepository, UnlockValidator, UnlockVerdict,
};
use crate::use_cases::selected_account;

/// Name sent to the unlock server when no account exists
pub const GUEST_NAME: &str = "Guest";

/// Result of redeeming an unlock code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    Unlocked { instance: String, user: String },
    AlreadyUnlocked,
    Invalid { message: String },
}

/// Visible instances, instance selection and unlock codes
pub struct InstanceAccessUseCase<A, C, L, I, U, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    L: UnlockLedgerRepository,
    I: InstanceCatalog,
    U: UnlockValidator,
    V: LauncherView,
{
    account_repo: Arc<A>,
    config_repo: Arc<C>,
    ledger_repo: Arc<L>,
    catalog: Arc<I>,
    validator: Arc<U>,
    view: Arc<V>,
}

impl<A, C, L, I, U, V> InstanceAccessUseCase<A, C, L, I, U, V>
where
    A: AccountRepository,
    C: ClientConfigRepository,
    L: UnlockLedgerRepository,
    I: InstanceCatalog,
    U: UnlockValidator,
    V: LauncherView,
{
    pub fn new(
        account_repo: Arc<A>,
        config_repo: Arc<C>,
        ledger_repo: Arc<L>,
        catalog: Arc<I>,
        validator: Arc<U>,
        view: Arc<V>,
    ) -> Self {
        Self {
            account_repo,
            config_repo,
            ledger_repo,
            catalog,
            validator,
            view,
        }
    }

    /// Instances the selected account may see, in catalog order.
    ///
    /// Prunes stale unlocks on the way and writes the ledger back if it changed.
    #[instrument(skip(self))]
    pub async fn visible_instances(&self) -> Result<Vec<InstanceDescriptor>, Error> {
        let config = self.config_repo.load().await?;
        let account_name = selected_account(self.account_repo.as_ref(), &config)
            .await?
            .map(|a| a.name);
        let instances = self.catalog.list_instances().await?;

        let mut ledger = self.load_ledger().await;
        let FilterOutcome {
            visible,
            ledger_changed,
        } = authorization::prune_and_filter(&instances, account_name.as_deref(), &mut ledger);

        if ledger_changed {
            if let Err(e) = self.ledger_repo.save(&ledger).await {
                warn!(error = %e, "failed to persist pruned unlock ledger");
            }
        }
        Ok(visible)
    }

    /// Make sure the stored instance selection is one the account can see.
    ///
    /// Falls back to the first visible instance. Returns the selected instance,
    /// or `None` when nothing is visible.
    pub async fn ensure_selection(&self) -> Result<Option<InstanceDescriptor>, Error> {
        let visible = self.visible_instances().await?;
        let mut config = self.config_repo.load().await?;

        if let Some(current) = config
            .selected_instance
            .as_deref()
            .and_then(|name| visible.iter().find(|i| i.name == name))
        {
            return Ok(Some(current.clone()));
        }

        let Some(first) = visible.first() else {
            return Ok(None);
        };
        info!(instance = %first.name, "selecting first visible instance");
        config.selected_instance = Some(first.name.clone());
        self.config_repo.save(&config).await?;
        self.view.instance_status(first);
        Ok(Some(first.clone()))
    }

    #[instrument(skip(self))]
    pub async fn select_instance(&self, name: &str) -> Result<InstanceDescriptor, Error> {
        let visible = self.visible_instances().await?;

        let Some(instance) = visible.iter().find(|i| i.name == name) else {
            let known = self
                .catalog
                .list_instances()
                .await?
                .iter()
                .any(|i| i.name == name);
            if known {
                let config = self.config_repo.load().await?;
                let account = selected_account(self.account_repo.as_ref(), &config)
                    .await?
                    .map(|a| a.name)
                    .unwrap_or_default();
                return Err(Error::InstanceNotAuthorized {
                    instance: name.to_string(),
                    account,
                });
            }
            return Err(Error::InstanceNotFound(name.to_string()));
        };

        let mut config = self.config_repo.load().await?;
        config.selected_instance = Some(instance.name.clone());
        self.config_repo.save(&config).await?;
        self.view.instance_status(instance);
        Ok(instance.clone())
    }

    /// Redeem an unlock code for the selected account.
    ///
    /// With no account selected the first stored one is selected first; with
    /// no accounts at all the code is redeemed for [`GUEST_NAME`]. An unreadable
    /// ledger fails the redemption before the code is sent.
    #[instrument(skip(self, code))]
    pub async fn redeem_code(&self, code: &str) -> Result<RedeemOutcome, Error> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::EmptyUnlockCode);
        }

        let mut config = self.config_repo.load().await?;
        if config.selected_account.is_none() {
            if let Some(first) = self.account_repo.list_accounts().await?.first() {
                config.selected_account = Some(first.id.clone());
                self.config_repo.save(&config).await?;
            }
        }
        let user = selected_account(self.account_repo.as_ref(), &config)
            .await?
            .map(|a| a.name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| GUEST_NAME.to_string());

        // Strict read: an unreadable ledger is never replaced by a fresh one
        let mut ledger = self.ledger_repo.load().await?;

        let verdict = self.validator.validate(code, &user).await?;
        let instance = match verdict {
            UnlockVerdict::Granted { instance } => instance,
            UnlockVerdict::AlreadyUnlocked => {
                info!(username = %user, "instance already unlocked");
                return Ok(RedeemOutcome::AlreadyUnlocked);
            }
            UnlockVerdict::Invalid { message } => {
                warn!(username = %user, %message, "unlock code rejected");
                return Ok(RedeemOutcome::Invalid { message });
            }
        };

        // Password instances are only kept unlocked while the stored code matches
        let stored_code = match self.catalog.list_instances().await {
            Ok(instances) => instances
                .iter()
                .find(|i| i.name == instance)
                .and_then(|i| match i.access() {
                    AccessRule::Password(_) => Some(code.to_string()),
                    _ => None,
                }),
            Err(e) => {
                warn!(error = %e, "could not load instances, storing grant without code");
                None
            }
        };

        if ledger.grant(&instance, &user, stored_code.as_deref()) == GrantResult::Added {
            info!(username = %user, %instance, "instance unlocked");
        }
        self.ledger_repo.save(&ledger).await?;

        Ok(RedeemOutcome::Unlocked { instance, user })
    }

    async fn load_ledger(&self) -> UnlockLedger {
        match self.ledger_repo.load().await {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(error = %e, "could not read unlock ledger, filtering without unlocks");
                UnlockLedger::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use std::sync::atomic::Ordering;
    use crate::entities::AccountId;
    use crate::ledger::LedgerEntry;
    use crate::use_cases::testing::{
        account, CodeTable, InMemoryAccounts, InMemoryClientConfig, InMemoryLedger, RecordingView,
        StaticCatalog, ViewEvent,
    };

    type TestAccess = InstanceAccessUseCase<
        InMemoryAccounts,
        InMemoryClientConfig,
        InMemoryLedger,
        StaticCatalog,
        CodeTable,
        RecordingView,
    >;

    struct Harness {
        accounts: Arc<InMemoryAccounts>,
        config: Arc<InMemoryClientConfig>,
        ledger: Arc<InMemoryLedger>,
        validator: Arc<CodeTable>,
        view: Arc<RecordingView>,
        use_case: TestAccess,
    }

    fn harness(
        accounts: Vec<crate::entities::Account>,
        config: ClientConfig,
        ledger: UnlockLedger,
        validator: CodeTable,
    ) -> Harness {
        let accounts = Arc::new(InMemoryAccounts::with(accounts));
        let config = Arc::new(InMemoryClientConfig::with(config));
        let ledger = Arc::new(InMemoryLedger::with(ledger));
        let validator = Arc::new(validator);
        let view = Arc::new(RecordingView::default());
        let use_case = InstanceAccessUseCase::new(
            accounts.clone(),
            config.clone(),
            ledger.clone(),
            Arc::new(StaticCatalog::with(catalog())),
            validator.clone(),
            view.clone(),
        );
        Harness {
            accounts,
            config,
            ledger,
            validator,
            view,
            use_case,
        }
    }

    fn catalog() -> Vec<InstanceDescriptor> {
        let mut fort = InstanceDescriptor::new("Fort");
        fort.password = Some("X123".to_string());
        let mut arena = InstanceDescriptor::new("Arena");
        arena.whitelist_active = true;
        arena.whitelist = vec!["Alice".to_string()];
        vec![fort, arena, InstanceDescriptor::new("Lobby")]
    }

    fn as_user(id: &str) -> ClientConfig {
        ClientConfig {
            selected_account: Some(AccountId::new(id)),
            ..Default::default()
        }
    }

    fn names(instances: &[InstanceDescriptor]) -> Vec<&str> {
        instances.iter().map(|i| i.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_visible_instances_prunes_and_persists_once() {
        let mut ledger = UnlockLedger::new();
        ledger.insert("Fort", LedgerEntry::Flag(true));
        let h = harness(
            vec![account("b", "Bob", "Xbox")],
            as_user("b"),
            ledger,
            CodeTable::default(),
        );

        let first = h.use_case.visible_instances().await.unwrap();
        let second = h.use_case.visible_instances().await.unwrap();

        assert_eq!(names(&first), ["Lobby"]);
        assert_eq!(first, second);
        assert_eq!(h.ledger.save_count(), 1);
        assert!(h.ledger.current().is_empty());
    }

    #[tokio::test]
    async fn test_whitelist_grant_from_ledger() {
        let mut ledger = UnlockLedger::new();
        ledger.grant("Arena", "Bob", None);
        let h = harness(
            vec![account("b", "Bob", "Xbox"), account("c", "Carol", "Xbox")],
            as_user("b"),
            ledger,
            CodeTable::default(),
        );

        assert_eq!(
            names(&h.use_case.visible_instances().await.unwrap()),
            ["Arena", "Lobby"]
        );

        h.config
            .save(&as_user("c"))
            .await
            .unwrap();
        assert_eq!(
            names(&h.use_case.visible_instances().await.unwrap()),
            ["Lobby"]
        );
    }

    #[tokio::test]
    async fn test_ensure_selection_falls_back_to_first_visible() {
        let mut config = as_user("c");
        config.selected_instance = Some("Arena".to_string());
        let h = harness(
            vec![account("c", "Carol", "Xbox")],
            config,
            UnlockLedger::new(),
            CodeTable::default(),
        );

        let selected = h.use_case.ensure_selection().await.unwrap();

        assert_eq!(selected.map(|i| i.name), Some("Lobby".to_string()));
        assert_eq!(h.config.current().selected_instance.as_deref(), Some("Lobby"));
        assert_eq!(h.view.events(), vec![ViewEvent::Status("Lobby".to_string())]);
    }

    #[tokio::test]
    async fn test_select_instance_errors() {
        let h = harness(
            vec![account("c", "Carol", "Xbox")],
            as_user("c"),
            UnlockLedger::new(),
            CodeTable::default(),
        );

        let locked = h.use_case.select_instance("Arena").await;
        assert!(matches!(
            locked,
            Err(Error::InstanceNotAuthorized { instance, account })
                if instance == "Arena" && account == "Carol"
        ));

        let missing = h.use_case.select_instance("Nowhere").await;
        assert!(matches!(missing, Err(Error::InstanceNotFound(_))));

        let lobby = h.use_case.select_instance("Lobby").await.unwrap();
        assert_eq!(lobby.name, "Lobby");
        assert_eq!(h.config.current().selected_instance.as_deref(), Some("Lobby"));
    }

    #[tokio::test]
    async fn test_redeem_password_code_unlocks_and_survives_pruning() {
        let h = harness(
            vec![account("c", "Carol", "Xbox")],
            as_user("c"),
            UnlockLedger::new(),
            CodeTable::grant("X123", "Fort"),
        );

        let outcome = h.use_case.redeem_code("  X123 ").await.unwrap();

        assert_eq!(
            outcome,
            RedeemOutcome::Unlocked {
                instance: "Fort".to_string(),
                user: "Carol".to_string()
            }
        );
        assert_eq!(h.ledger.current().get("Fort").unwrap().code(), Some("X123"));
        assert_eq!(
            names(&h.use_case.visible_instances().await.unwrap()),
            ["Fort", "Lobby"]
        );
    }

    #[tokio::test]
    async fn test_redeem_whitelist_code_records_user_once() {
        let h = harness(
            vec![account("c", "Carol", "Xbox")],
            as_user("c"),
            UnlockLedger::new(),
            CodeTable::grant("ARENA-1", "Arena"),
        );

        h.use_case.redeem_code("ARENA-1").await.unwrap();
        h.use_case.redeem_code("ARENA-1").await.unwrap();

        let ledger = h.ledger.current();
        assert_eq!(ledger.users_for("Arena"), ["Carol".to_string()]);
        assert_eq!(ledger.get("Arena").unwrap().code(), None);
    }

    #[tokio::test]
    async fn test_redeem_outcomes_are_distinct() {
        let mut table = CodeTable::default();
        table
            .verdicts
            .insert("USED".to_string(), UnlockVerdict::AlreadyUnlocked);
        let h = harness(vec![], ClientConfig::default(), UnlockLedger::new(), table);

        assert_eq!(
            h.use_case.redeem_code("USED").await.unwrap(),
            RedeemOutcome::AlreadyUnlocked
        );
        assert!(matches!(
            h.use_case.redeem_code("NOPE").await.unwrap(),
            RedeemOutcome::Invalid { .. }
        ));
        assert!(matches!(
            h.use_case.redeem_code("   ").await,
            Err(Error::EmptyUnlockCode)
        ));
        assert_eq!(h.ledger.save_count(), 0);
        assert_eq!(
            h.validator.calls.lock().unwrap()[0],
            ("USED".to_string(), GUEST_NAME.to_string())
        );
    }

    #[tokio::test]
    async fn test_redeem_selects_first_account_when_none_selected() {
        let h = harness(
            vec![account("a", "Alpha", "Xbox"), account("b", "Bob", "Xbox")],
            ClientConfig::default(),
            UnlockLedger::new(),
            CodeTable::grant("ARENA-1", "Arena"),
        );

        let outcome = h.use_case.redeem_code("ARENA-1").await.unwrap();

        assert_eq!(h.config.current().selected_account, Some(AccountId::new("a")));
        assert!(matches!(outcome, RedeemOutcome::Unlocked { user, .. } if user == "Alpha"));
        assert_eq!(h.accounts.ids(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_redeem_refuses_unreadable_ledger() {
        let mut ledger = UnlockLedger::new();
        ledger.grant("Fort", "Carol", Some("X123"));
        let h = harness(
            vec![account("c", "Carol", "Xbox")],
            as_user("c"),
            ledger.clone(),
            CodeTable::grant("ARENA-1", "Arena"),
        );
        h.ledger.unreadable.store(true, Ordering::SeqCst);

        let result = h.use_case.redeem_code("ARENA-1").await;

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(h.validator.calls.lock().unwrap().is_empty());
        assert_eq!(h.ledger.save_count(), 0);
        assert_eq!(h.ledger.current(), ledger);
    }

    #[tokio::test]
    async fn test_unreadable_ledger_hides_unlocks_without_writing() {
        let h = harness(
            vec![account("c", "Carol", "Xbox")],
            as_user("c"),
            UnlockLedger::new(),
            CodeTable::default(),
        );
        h.ledger.unreadable.store(true, Ordering::SeqCst);

        let visible = h.use_case.visible_instances().await.unwrap();

        assert_eq!(names(&visible), ["Lobby"]);
        assert_eq!(h.ledger.save_count(), 0);
    }
}
