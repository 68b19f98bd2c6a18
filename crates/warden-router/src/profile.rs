//! Provider profiles and the atomically swapped active set.
//!
//! A profile is read-only configuration during a request. Hot reload
//! replaces the whole [`ProfileSet`] behind one pointer swap; a request
//! that already loaded the set keeps it unchanged for its lifetime.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use warden_core::{ProfileName, SecretRef};

use crate::error::{RouterError, RouterResult};

/// One configured generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: ProfileName,
    /// Wire dialect, resolved through the adapter registry.
    pub dialect: String,
    /// Logical name the secret source resolves to credential material.
    pub credential_ref: SecretRef,
    pub endpoint: String,
    /// Lower numbers are attempted first.
    pub priority: u32,
}

/// A validated, priority-ordered set of profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSet {
    profiles: Vec<ProviderProfile>,
}

impl ProfileSet {
    /// Build a set. Names must be unique; the list may not be empty.
    pub fn new(mut profiles: Vec<ProviderProfile>) -> RouterResult<Self> {
        if profiles.is_empty() {
            return Err(RouterError::NoProfiles);
        }
        profiles.sort_by_key(|p| p.priority);
        let mut names: Vec<&ProfileName> = profiles.iter().map(|p| &p.name).collect();
        names.sort();
        names.dedup();
        if names.len() != profiles.len() {
            return Err(RouterError::InvalidProfile(
                "profile names must be unique".into(),
            ));
        }
        Ok(Self { profiles })
    }

    /// Profiles in attempt order.
    pub fn ordered(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Shared handle to the active profile set.
///
/// `load` hands out the current `Arc`; `swap` replaces it wholesale.
/// Readers never observe a partially updated set.
pub struct SharedProfiles {
    inner: RwLock<Arc<ProfileSet>>,
}

impl SharedProfiles {
    pub fn new(set: ProfileSet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(set)),
        }
    }

    /// Snapshot the active set for the duration of one request.
    pub fn load(&self) -> Arc<ProfileSet> {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Atomically replace the active set.
    pub fn swap(&self, set: ProfileSet) {
        let set = Arc::new(set);
        match self.inner.write() {
            Ok(mut guard) => *guard = set,
            Err(poisoned) => *poisoned.into_inner() = set,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn profile(name: &str, priority: u32) -> ProviderProfile {
        ProviderProfile {
            name: ProfileName::new(name),
            dialect: "openai".into(),
            credential_ref: SecretRef::new(format!("{name}-key")),
            endpoint: format!("https://{name}.example/v1"),
            priority,
        }
    }

    #[test]
    fn test_profiles_sorted_by_priority() {
        let set = ProfileSet::new(vec![
            profile("slow", 20),
            profile("fast", 1),
            profile("medium", 10),
        ])
        .unwrap();
        let names: Vec<&str> = set.ordered().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["fast", "medium", "slow"]);
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(
            ProfileSet::new(vec![]),
            Err(RouterError::NoProfiles)
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ProfileSet::new(vec![profile("a", 1), profile("a", 2)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_swap_is_atomic_for_existing_snapshots() {
        let shared = SharedProfiles::new(ProfileSet::new(vec![profile("old", 1)]).unwrap());
        let snapshot = shared.load();

        shared.swap(ProfileSet::new(vec![profile("new-a", 1), profile("new-b", 2)]).unwrap());

        // The request that loaded before the swap still sees the old set.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.ordered()[0].name.as_str(), "old");
        // New loads see the replacement wholesale.
        let fresh = shared.load();
        assert_eq!(fresh.len(), 2);
    }
}
