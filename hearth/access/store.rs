use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::{
    error::AccessError,
    member::Member,
    policy::{Policy, PolicyKey, RawPolicy},
};

/// Per-member policy snapshots.
///
/// Edits are computed from the current snapshot without touching the store;
/// callers load the persisted member once the backend has accepted it, which
/// swaps in a new `Arc<Policy>`. Readers holding an older snapshot keep
/// seeing a complete, unchanged policy.
#[derive(Debug, Default)]
pub struct PolicyStore {
    entries: RwLock<HashMap<String, Arc<Policy>>>,
}

impl PolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads (or replaces) the policy carried by a member.
    pub fn load(&self, member: &Member) -> Arc<Policy> {
        let policy = Arc::new(member.policies);
        self.entries
            .write()
            .insert(member.id.clone(), Arc::clone(&policy));
        policy
    }

    /// Current snapshot for a member.
    #[must_use]
    pub fn read(&self, member_id: &str) -> Option<Arc<Policy>> {
        self.entries.read().get(member_id).map(Arc::clone)
    }

    /// The snapshot with one gate flipped. The store is unchanged.
    pub fn toggled(&self, member_id: &str, key: PolicyKey) -> Result<Policy, AccessError> {
        Ok(self.require(member_id)?.toggled(key))
    }

    /// The snapshot with every key in `patch` applied. The store is unchanged.
    pub fn merged(&self, member_id: &str, patch: &RawPolicy) -> Result<Policy, AccessError> {
        Ok(self.require(member_id)?.merged(patch))
    }

    /// Drops a member's policy.
    pub fn forget(&self, member_id: &str) -> Option<Arc<Policy>> {
        self.entries.write().remove(member_id)
    }

    /// Number of members held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no member is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn require(&self, member_id: &str) -> Result<Arc<Policy>, AccessError> {
        self.read(member_id)
            .ok_or_else(|| AccessError::UnknownMember(member_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        member::NewMember,
        policy::{Area, Capability, Role, SubCapability},
    };
    use serde_json::json;

    #[test]
    fn edits_leave_the_store_untouched_until_loaded() {
        let store = PolicyStore::new();
        let member = NewMember::new("Ravi", Role::Member, "1234").into_member("m-1");
        let before = store.load(&member);
        let key = PolicyKey::Control(Capability::Doors);

        let next = store.toggled("m-1", key).unwrap();
        assert!(before.controls.doors);
        assert!(!next.controls.doors);
        assert_eq!(*store.read("m-1").unwrap(), *before);

        let after = store.load(&Member {
            policies: next,
            ..member
        });
        assert!(!after.controls.doors);
        assert!(before.controls.doors);
        assert_eq!(store.toggled("m-1", key).unwrap(), *before);
    }

    #[test]
    fn toggling_an_unset_area_key_uses_the_role_default() {
        let store = PolicyStore::new();
        for role in ["admin", "parent", "member", "child"] {
            let member: Member = serde_json::from_value(json!({
                "id": role,
                "name": "Asha",
                "role": role,
                "policies": { "controls": {} }
            }))
            .unwrap();
            store.load(&member);
            let key = PolicyKey::Area(Area::Kitchen, SubCapability::Ac);
            assert!(store.toggled(role, key).unwrap().get(key), "{role}");
        }
    }

    #[test]
    fn unknown_member_is_an_error() {
        let store = PolicyStore::new();
        let err = store
            .toggled("ghost", PolicyKey::Control(Capability::Voice))
            .unwrap_err();
        assert!(matches!(err, AccessError::UnknownMember(id) if id == "ghost"));
    }

    #[test]
    fn merge_applies_partial_patch() {
        let store = PolicyStore::new();
        store.load(&NewMember::new("Meera", Role::Parent, "2468").into_member("p-1"));
        let key = PolicyKey::Area(Area::Main, SubCapability::Door);
        let merged = store.merged("p-1", &RawPolicy::single(key, true)).unwrap();
        assert!(merged.get(key));
        assert!(merged.controls.unlock_doors);
        assert_eq!(store.len(), 1);
        assert!(store.forget("p-1").is_some());
        assert!(store.is_empty());
    }
}
