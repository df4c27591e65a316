//! Remote store adapter
//!
//! A `RemoteStore` is the authoritative, per-user contact collection. All
//! operations are scoped to the identity they are called with; the store
//! assigns ids on creation and callers never invent them.

pub mod memory;
pub mod retry;

use async_trait::async_trait;
use rolodex_api::{Contact, ContactFields, ContactId, Identity, Result};

pub use memory::MemoryContactStore;
pub use retry::RetryPolicy;

/// Collection name used under each user document.
pub const DEFAULT_COLLECTION: &str = "contacts";

/// Per-user contact collection in a remote document database.
///
/// Failures surface as `SyncError::RemoteUnavailable` for transport and
/// permission problems. `list` is all-or-nothing.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Name used in log lines (e.g. "firestore", "memory")
    fn store_name(&self) -> &str;

    /// Every contact of the user, in store order.
    async fn list(&self, identity: &Identity) -> Result<Vec<Contact>>;

    /// Persist a new contact; the returned contact carries the store id.
    async fn create(&self, identity: &Identity, fields: ContactFields) -> Result<Contact>;

    /// Replace all fields of an existing contact.
    ///
    /// Fails with `ContactNotFound` if the id does not exist.
    async fn update(
        &self,
        identity: &Identity,
        id: &ContactId,
        fields: ContactFields,
    ) -> Result<Contact>;

    /// Delete a contact. Deleting an unknown id succeeds.
    async fn delete(&self, identity: &Identity, id: &ContactId) -> Result<()>;
}
