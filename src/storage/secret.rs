//! Token-tier secrets and the persistence policy that governs them
//!
//! A `SecretEntry` always holds its value in memory for the life of
//! the process; whether it is also mirrored into the secure store is
//! decided by the `PersistencePolicy` current at the time of the
//! write. Changing the policy can migrate the physical storage of
//! every governed entry to match.

use log::warn;

use super::backends::SecureStore;

/// Durability mode for token-tier secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    /// Mirror secrets into the secure store.
    Always,
    /// Keep secrets in memory only; never touch the secure store.
    Never,
}

impl PolicyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::Always => "always",
            PolicyMode::Never => "never",
        }
    }

    /// Parse a persisted mode string; anything unrecognized falls back
    /// to `Always` so an old or hand-edited preference file cannot
    /// silently disable durability.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "never" => PolicyMode::Never,
            "always" => PolicyMode::Always,
            other => {
                warn!("Unknown persistence policy '{}', defaulting to always", other);
                PolicyMode::Always
            }
        }
    }
}

/// The persistence policy plus the names of the entries it governs.
///
/// The policy never holds the entries themselves: governed entries
/// are recorded by name and resolved through the registry owned by
/// `CredentialStore`, so a name with no matching entry is simply
/// skipped during migration.
#[derive(Debug)]
pub struct PersistencePolicy {
    mode: PolicyMode,
    governed: Vec<&'static str>,
}

impl PersistencePolicy {
    pub fn new(mode: PolicyMode) -> Self {
        Self {
            mode,
            governed: Vec::new(),
        }
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PolicyMode) {
        self.mode = mode;
    }

    /// Register an entry name as governed by this policy. Wired after
    /// the entries exist; the policy and its entries are mutually
    /// referential through the store's registry, not through handles.
    pub fn govern(&mut self, name: &'static str) {
        if !self.governed.contains(&name) {
            self.governed.push(name);
        }
    }

    pub fn governed(&self) -> &[&'static str] {
        &self.governed
    }
}

/// A single named secret with a volatile tier and, policy permitting,
/// a durable tier in the secure store.
#[derive(Debug)]
pub struct SecretEntry {
    name: &'static str,
    volatile: Option<String>,
}

impl SecretEntry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            volatile: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The cached in-memory value if present; otherwise, under the
    /// durable policy, whatever the secure store holds. The durable
    /// value is re-read on each call rather than cached.
    pub fn get(&self, mode: PolicyMode, secure: &dyn SecureStore) -> Option<String> {
        if self.volatile.is_none() && mode == PolicyMode::Always {
            return secure.load(self.name);
        }
        self.volatile.clone()
    }

    /// Store the value in memory and bring the secure store in line
    /// with the current policy: mirror it under `Always`, make sure no
    /// stale copy remains under `Never`.
    pub fn set(&mut self, value: &str, mode: PolicyMode, secure: &dyn SecureStore) {
        self.volatile = Some(value.to_string());
        match mode {
            PolicyMode::Always => {
                if !secure.save(self.name, value) {
                    warn!("Durable write for '{}' failed; value kept in memory", self.name);
                }
            }
            PolicyMode::Never => {
                secure.delete(self.name);
            }
        }
    }

    /// Remove the secure-store entry unconditionally and drop the
    /// in-memory value. Safe to call repeatedly.
    pub fn clear(&mut self, secure: &dyn SecureStore) {
        secure.delete(self.name);
        self.volatile = None;
    }

    /// Migrate physical storage after a policy change: push the
    /// current in-memory value under `Always`, purge the secure-store
    /// copy under `Never`.
    pub fn apply_policy(&self, mode: PolicyMode, secure: &dyn SecureStore) {
        match mode {
            PolicyMode::Always => {
                if let Some(value) = &self.volatile {
                    if !secure.save(self.name, value) {
                        warn!("Policy migration write for '{}' failed", self.name);
                    }
                }
            }
            PolicyMode::Never => {
                secure.delete(self.name);
            }
        }
    }
}
