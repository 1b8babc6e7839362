use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::target::TypeKey;

use super::{MemberDescriptor, TypeDescriptor};

/// Loaded descriptors by key, with supertype traversal.
#[derive(Debug, Default)]
pub struct TypeIndex {
    types: HashMap<TypeKey, Arc<TypeDescriptor>>,
    order: Vec<TypeKey>,
}

impl TypeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a descriptor. Returns false and keeps the first one if the
    /// key is already present.
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> bool {
        if self.types.contains_key(&descriptor.key) {
            return false;
        }
        self.order.push(descriptor.key.clone());
        self.types.insert(descriptor.key.clone(), Arc::new(descriptor));
        true
    }

    #[must_use]
    pub fn get(&self, key: &TypeKey) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(key)
    }

    /// Descriptors in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> {
        self.order.iter().filter_map(|key| self.types.get(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// `key` followed by every reachable supertype, breadth first, each once.
    ///
    /// Supertypes that were never loaded still appear so virtual contracts
    /// without members of their own keep working as lookup keys.
    #[must_use]
    pub fn ancestry(&self, key: &TypeKey) -> Vec<TypeKey> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([key.clone()]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(desc) = self.types.get(&next) {
                queue.extend(desc.supertypes.iter().cloned());
            }
            out.push(next);
        }
        out
    }

    /// Finds a member by name on `key` or its supertypes, nearest first.
    #[must_use]
    pub fn find_member(&self, key: &TypeKey, name: &str) -> Option<(&TypeDescriptor, &MemberDescriptor)> {
        self.ancestry(key).iter().find_map(|k| {
            let desc = self.types.get(k)?;
            desc.member(name).map(|m| (desc.as_ref(), m))
        })
    }
}
