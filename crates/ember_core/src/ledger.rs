use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::InstanceDescriptor;

/// One unlock record for an instance.
///
/// Older launchers wrote a bare `true`; redeemed codes are stored as a grant
/// carrying the code (for password instances) and the names it was redeemed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerEntry {
    Flag(bool),
    Grant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default)]
        users: Vec<String>,
    },
}

impl LedgerEntry {
    /// `true` flags and grant objects both count as an unlock
    pub fn is_unlocked(&self) -> bool {
        matches!(self, LedgerEntry::Flag(true) | LedgerEntry::Grant { .. })
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            LedgerEntry::Grant { code, .. } => code.as_deref(),
            LedgerEntry::Flag(_) => None,
        }
    }

    pub fn users(&self) -> &[String] {
        match self {
            LedgerEntry::Grant { users, .. } => users,
            LedgerEntry::Flag(_) => &[],
        }
    }

    /// Entry records a password unlock rather than a whitelist grant
    fn is_password_unlock(&self) -> bool {
        matches!(self, LedgerEntry::Flag(true)) || self.code().is_some()
    }
}

/// Persisted map of instance name to unlock record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnlockLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

/// Outcome of adding a user to an instance's grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantResult {
    Added,
    AlreadyPresent,
}

impl UnlockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, instance: &str) -> Option<&LedgerEntry> {
        self.entries.get(instance)
    }

    pub fn insert(&mut self, instance: impl Into<String>, entry: LedgerEntry) {
        self.entries.insert(instance.into(), entry);
    }

    pub fn remove(&mut self, instance: &str) -> Option<LedgerEntry> {
        self.entries.remove(instance)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LedgerEntry)> {
        self.entries.iter()
    }

    pub fn is_unlocked(&self, instance: &str) -> bool {
        self.entries
            .get(instance)
            .map(LedgerEntry::is_unlocked)
            .unwrap_or(false)
    }

    /// Instances whose entry counts as unlocked, in key order
    pub fn unlocked_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_unlocked())
            .map(|(name, _)| name.as_str())
    }

    pub fn users_for(&self, instance: &str) -> &[String] {
        self.entries
            .get(instance)
            .map(LedgerEntry::users)
            .unwrap_or(&[])
    }

    /// Drop entries that no longer match the catalog. Returns whether anything was removed.
    ///
    /// For a password instance the entry must store the current password. For an
    /// instance without a password, stale password unlocks go while whitelist
    /// grants stay. Instances missing from the catalog are left untouched.
    pub fn prune(&mut self, instances: &[InstanceDescriptor]) -> bool {
        let before = self.entries.len();

        self.entries.retain(|name, entry| {
            let Some(instance) = instances.iter().find(|i| &i.name == name) else {
                return true;
            };

            let keep = match instance.password() {
                Some(password) => entry.code() == Some(password),
                None => !entry.is_password_unlock(),
            };
            if !keep {
                let reason = match (instance.password(), entry.code()) {
                    (Some(_), None) => "no code stored",
                    (Some(_), Some(_)) => "code mismatch",
                    (None, _) => "password removed",
                };
                debug!(instance = %name, reason, "clearing unlock");
            }
            keep
        });

        self.entries.len() != before
    }

    /// Add `user` to the instance grant, creating it if needed.
    ///
    /// `code` replaces the stored code when given.
    pub fn grant(&mut self, instance: &str, user: &str, code: Option<&str>) -> GrantResult {
        let entry = self
            .entries
            .entry(instance.to_string())
            .or_insert_with(|| LedgerEntry::Grant {
                code: None,
                users: Vec::new(),
            });

        if let LedgerEntry::Flag(_) = entry {
            *entry = LedgerEntry::Grant {
                code: None,
                users: Vec::new(),
            };
        }

        let LedgerEntry::Grant { code: stored, users } = entry else {
            unreachable!("entry was normalized to a grant above");
        };
        if let Some(code) = code {
            *stored = Some(code.to_string());
        }
        if users.iter().any(|u| u == user) {
            GrantResult::AlreadyPresent
        } else {
            users.push(user.to_string());
            GrantResult::Added
        }
    }
}
