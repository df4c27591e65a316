//! Local favorites set
//!
//! Purely client-side and never persisted. The controller keeps it a subset
//! of the ids in the contact list by calling `retain_present` after every
//! list mutation.

use std::collections::BTreeSet;

use rolodex_api::ContactId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorites {
    ids: BTreeSet<ContactId>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`; returns whether it is a favorite afterwards.
    pub fn toggle(&mut self, id: &ContactId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn contains(&self, id: &ContactId) -> bool {
        self.ids.contains(id)
    }

    pub fn replace(&mut self, ids: BTreeSet<ContactId>) {
        self.ids = ids;
    }

    /// Drop every id not yielded by `present`. Returns how many were removed.
    pub fn retain_present<'a, I>(&mut self, present: I) -> usize
    where
        I: IntoIterator<Item = &'a ContactId>,
    {
        let present: BTreeSet<&ContactId> = present.into_iter().collect();
        let before = self.ids.len();
        self.ids.retain(|id| present.contains(id));
        before - self.ids.len()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_set(&self) -> BTreeSet<ContactId> {
        self.ids.clone()
    }
}
