use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Contact, ContactId, SyncError};

/// Where the sync controller is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No identity event has been observed yet
    Initializing,
    /// Signed out; contact list is empty
    NoSession,
    /// Signed in, a fetch is in flight
    Loading,
    /// Signed in, list loaded (possibly stale after a failed fetch)
    Ready,
}

/// Why an operation left local state untouched without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Called while signed out
    NoIdentity,
    /// The identity changed while the remote call was in flight; the
    /// result was discarded
    StaleIdentity,
}

/// Result of a controller operation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome<T> {
    Applied(T),
    Skipped(SkipReason),
}

impl<T> SyncOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            SyncOutcome::Applied(value) => Some(value),
            SyncOutcome::Skipped(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SyncOutcome<U> {
        match self {
            SyncOutcome::Applied(value) => SyncOutcome::Applied(f(value)),
            SyncOutcome::Skipped(reason) => SyncOutcome::Skipped(reason),
        }
    }
}

/// Immutable view of the synchronized state, rendered by the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactsSnapshot {
    pub phase: SessionPhase,
    /// uid of the signed-in user
    pub user: Option<String>,
    pub contacts: Vec<Contact>,
    pub is_loading: bool,
    pub favorites: BTreeSet<ContactId>,
    /// Most recent failure, cleared by the next successful remote call
    pub last_error: Option<SyncError>,
}

impl ContactsSnapshot {
    pub fn initial() -> Self {
        Self {
            phase: SessionPhase::Initializing,
            user: None,
            contacts: Vec::new(),
            is_loading: true,
            favorites: BTreeSet::new(),
            last_error: None,
        }
    }

    pub fn favorite_contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts
            .iter()
            .filter(|contact| self.favorites.contains(&contact.id))
    }
}
