//! In-memory remote store
//!
//! Behaves like the document database: per-user collections kept in creation
//! order, store-generated 20 character ids, idempotent deletes. Failures can
//! be injected to exercise the controller's error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rolodex_api::{Contact, ContactFields, ContactId, Identity, Result, SyncError};
use tracing::debug;

use super::RemoteStore;
use crate::auth::lock;

const AUTO_ID_LEN: usize = 20;

/// Generate a document id the way the remote database does.
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Which store operation a counter or injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct CallCounters {
    list: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

impl CallCounters {
    fn counter(&self, op: StoreOp) -> &AtomicUsize {
        match op {
            StoreOp::List => &self.list,
            StoreOp::Create => &self.create,
            StoreOp::Update => &self.update,
            StoreOp::Delete => &self.delete,
        }
    }
}

/// In-memory `RemoteStore` keyed by user uid.
pub struct MemoryContactStore {
    collections: Mutex<HashMap<String, Vec<Contact>>>,
    available: AtomicBool,
    /// Number of upcoming calls (any operation) that fail
    fail_next: AtomicU32,
    calls: CallCounters,
}

impl Default for MemoryContactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            fail_next: AtomicU32::new(0),
            calls: CallCounters::default(),
        }
    }

    /// Pre-populate a user's collection, replacing what was there.
    pub fn seed(&self, uid: &str, contacts: Vec<Contact>) {
        lock(&self.collections).insert(uid.to_string(), contacts);
    }

    /// Current remote contents for a user.
    pub fn contacts_for(&self, uid: &str) -> Vec<Contact> {
        lock(&self.collections)
            .get(uid)
            .cloned()
            .unwrap_or_default()
    }

    /// While unavailable every call fails with `RemoteUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail the next `count` calls, then recover.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn call_count(&self, op: StoreOp) -> usize {
        self.calls.counter(op).load(Ordering::SeqCst)
    }

    fn begin(&self, op: StoreOp, identity: &Identity) -> Result<()> {
        self.calls.counter(op).fetch_add(1, Ordering::SeqCst);
        debug!(
            "[MemoryContactStore] {:?} for user '{}'",
            op,
            identity.uid()
        );

        if !self.available.load(Ordering::SeqCst) {
            return Err(SyncError::remote("memory store offline"));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(SyncError::remote(format!("injected failure on {:?}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryContactStore {
    fn store_name(&self) -> &str {
        "memory"
    }

    async fn list(&self, identity: &Identity) -> Result<Vec<Contact>> {
        self.begin(StoreOp::List, identity)?;
        Ok(self.contacts_for(identity.uid()))
    }

    async fn create(&self, identity: &Identity, fields: ContactFields) -> Result<Contact> {
        self.begin(StoreOp::Create, identity)?;
        let contact = Contact::new(auto_id(), fields);
        lock(&self.collections)
            .entry(identity.uid().to_string())
            .or_default()
            .push(contact.clone());
        Ok(contact)
    }

    async fn update(
        &self,
        identity: &Identity,
        id: &ContactId,
        fields: ContactFields,
    ) -> Result<Contact> {
        self.begin(StoreOp::Update, identity)?;
        let mut collections = lock(&self.collections);
        let contact = collections
            .get_mut(identity.uid())
            .and_then(|contacts| contacts.iter_mut().find(|c| &c.id == id))
            .ok_or_else(|| SyncError::ContactNotFound { id: id.to_string() })?;
        contact.fields = fields;
        Ok(contact.clone())
    }

    async fn delete(&self, identity: &Identity, id: &ContactId) -> Result<()> {
        self.begin(StoreOp::Delete, identity)?;
        if let Some(contacts) = lock(&self.collections).get_mut(identity.uid()) {
            contacts.retain(|c| &c.id != id);
        }
        Ok(())
    }
}
