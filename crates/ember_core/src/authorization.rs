//! Which instances an account may see and select.

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::entities::{AccessRule, InstanceDescriptor};
use crate::ledger::UnlockLedger;

/// Result of a filter pass
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub visible: Vec<InstanceDescriptor>,
    /// The ledger lost entries and should be written back
    pub ledger_changed: bool,
}

/// Name appears on the instance's static whitelist
pub fn is_whitelisted(instance: &InstanceDescriptor, name: &str) -> bool {
    instance.whitelist.iter().any(|n| n == name)
}

/// Visibility predicate for a single instance against an already pruned ledger
pub fn is_visible(
    instance: &InstanceDescriptor,
    account_name: Option<&str>,
    ledger: &UnlockLedger,
) -> bool {
    match instance.access() {
        AccessRule::Password(_) => ledger.is_unlocked(&instance.name),
        AccessRule::Whitelist(whitelist) => match account_name {
            Some(name) => {
                whitelist.iter().any(|n| n == name)
                    || ledger.users_for(&instance.name).iter().any(|n| n == name)
            }
            None => false,
        },
        AccessRule::Open => true,
    }
}

/// Keep the instances `account_name` may access, in catalog order
pub fn filter_authorized(
    instances: &[InstanceDescriptor],
    account_name: Option<&str>,
    ledger: &UnlockLedger,
) -> Vec<InstanceDescriptor> {
    instances
        .iter()
        .filter(|instance| is_visible(instance, account_name, ledger))
        .cloned()
        .collect()
}

/// Prune stale unlocks, then filter.
///
/// The caller persists the ledger when `ledger_changed` is set.
pub fn prune_and_filter(
    instances: &[InstanceDescriptor],
    account_name: Option<&str>,
    ledger: &mut UnlockLedger,
) -> FilterOutcome {
    let ledger_changed = ledger.prune(instances);
    let visible = filter_authorized(instances, account_name, ledger);

    debug!(
        total = instances.len(),
        visible = visible.len(),
        ledger_changed,
        "filtered instances"
    );

    FilterOutcome {
        visible,
        ledger_changed,
    }
}

/// Move the instance selection off a whitelist instance `account_name` is not on.
///
/// Returns the fallback instance when the selection changed. With no open
/// fallback in `candidates` the stale selection is left in place.
pub fn reconcile_instance_selection<'a>(
    config: &mut ClientConfig,
    candidates: &'a [InstanceDescriptor],
    account_name: &str,
) -> Option<&'a InstanceDescriptor> {
    let selected = config.selected_instance.as_deref()?;
    let current = candidates.iter().find(|i| i.name == selected)?;

    if !current.whitelist_active || is_whitelisted(current, account_name) {
        return None;
    }

    let fallback = candidates.iter().find(|i| !i.whitelist_active)?;
    info!(
        from = %selected,
        to = %fallback.name,
        account = %account_name,
        "account not whitelisted, switching instance"
    );
    config.selected_instance = Some(fallback.name.clone());
    Some(fallback)
}
