//! Contact sync controller
//!
//! Owns the local contact list and reconciles it with the remote store as
//! the signed-in identity changes. All mutation goes through the methods on
//! [`ContactSyncController`]; views read [`ContactsSnapshot`]s.
//!
//! Every identity change bumps an epoch. Remote calls capture the epoch when
//! they are issued, and their results are dropped if it moved on while the
//! call was in flight.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use rolodex_api::{
    Contact, ContactFields, ContactId, ContactsSnapshot, Identity, Result, SessionPhase,
    SkipReason, SyncError, SyncOutcome,
};
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::favorites::Favorites;
use crate::auth::{lock, AuthSessionMonitor, IdentityEvent, Subscription};
use crate::config::SyncConfig;
use crate::store::{RemoteStore, RetryPolicy};

/// Identity and epoch captured when a remote call is issued.
#[derive(Debug, Clone)]
struct Ticket {
    identity: Identity,
    epoch: u64,
}

struct SyncState {
    identity: Option<Identity>,
    epoch: u64,
    phase: SessionPhase,
    contacts: Vec<Contact>,
    favorites: Favorites,
    /// Fetches issued under the current epoch that have not completed
    pending_fetches: usize,
    last_error: Option<SyncError>,
}

impl SyncState {
    fn new() -> Self {
        Self {
            identity: None,
            epoch: 0,
            phase: SessionPhase::Initializing,
            contacts: Vec::new(),
            favorites: Favorites::new(),
            pending_fetches: 0,
            last_error: None,
        }
    }

    fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Initializing || self.pending_fetches > 0
    }

    fn ticket(&self) -> Option<Ticket> {
        self.identity.as_ref().map(|identity| Ticket {
            identity: identity.clone(),
            epoch: self.epoch,
        })
    }

    /// Start a new epoch with an empty list.
    fn reset(&mut self, identity: Option<Identity>) {
        self.epoch += 1;
        self.phase = if identity.is_some() {
            SessionPhase::Loading
        } else {
            SessionPhase::NoSession
        };
        self.identity = identity;
        self.contacts.clear();
        self.favorites.clear();
        self.pending_fetches = 0;
        self.last_error = None;
    }

    fn prune_favorites(&mut self) {
        let removed = self
            .favorites
            .retain_present(self.contacts.iter().map(|contact| &contact.id));
        if removed > 0 {
            debug!(
                "[ContactSyncController] Pruned {} favorites no longer in the list",
                removed
            );
        }
    }

    fn finish_fetch(&mut self) {
        self.pending_fetches = self.pending_fetches.saturating_sub(1);
        self.phase = if self.pending_fetches > 0 {
            SessionPhase::Loading
        } else {
            SessionPhase::Ready
        };
    }

    fn snapshot(&self) -> ContactsSnapshot {
        ContactsSnapshot {
            phase: self.phase,
            user: self.identity.as_ref().map(|identity| identity.uid().to_string()),
            contacts: self.contacts.clone(),
            is_loading: self.is_loading(),
            favorites: self.favorites.to_set(),
            last_error: self.last_error.clone(),
        }
    }
}

/// An outstanding fetch counted in `pending_fetches`.
///
/// Dropping it before `settle` releases the count, so an abandoned fetch
/// future cannot leave the controller loading.
struct PendingFetch<'a> {
    controller: &'a ContactSyncController,
    epoch: u64,
    settled: bool,
}

impl<'a> PendingFetch<'a> {
    fn new(controller: &'a ContactSyncController, epoch: u64) -> Self {
        Self {
            controller,
            epoch,
            settled: false,
        }
    }

    /// The fetch result is about to be applied through `complete`.
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.controller.state();
        if state.epoch == self.epoch {
            debug!(
                "[ContactSyncController] Fetch in epoch {} abandoned before completing",
                self.epoch
            );
            state.finish_fetch();
            self.controller.publish(&state);
        }
    }
}

struct Inner {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    state: Mutex<SyncState>,
    snapshot_tx: watch::Sender<ContactsSnapshot>,
}

/// Handle to the synchronized contact state.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct ContactSyncController {
    inner: Arc<Inner>,
}

fn require_id(contact: &Contact) -> Result<()> {
    if contact.id.is_empty() {
        Err(SyncError::malformed("store returned a contact without an id"))
    } else {
        Ok(())
    }
}

impl ContactSyncController {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_config(store, SyncConfig::default())
    }

    pub fn with_config(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        let state = SyncState::new();
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        info!(
            "[ContactSyncController] Created with store '{}' (max {} attempts)",
            store.store_name(),
            config.retry.max_attempts
        );
        Self {
            inner: Arc::new(Inner {
                store,
                retry: config.retry,
                state: Mutex::new(state),
                snapshot_tx,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        lock(&self.inner.state)
    }

    fn publish(&self, state: &SyncState) {
        self.inner.snapshot_tx.send_replace(state.snapshot());
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state().epoch == epoch
    }

    /// Apply the result of a remote call issued under `epoch`.
    ///
    /// Stale results are dropped as `StaleIdentity`. Errors are recorded as
    /// `last_error` before being returned.
    fn complete<T>(
        &self,
        op_name: &str,
        epoch: u64,
        apply: impl FnOnce(&mut SyncState) -> Result<T>,
    ) -> Result<SyncOutcome<T>> {
        let mut state = self.state();
        if state.epoch != epoch {
            debug!(
                "[ContactSyncController] Discarding {} result from epoch {} (now {})",
                op_name, epoch, state.epoch
            );
            return Ok(SyncOutcome::Skipped(SkipReason::StaleIdentity));
        }

        let result = apply(&mut state);
        match &result {
            Ok(_) => state.last_error = None,
            Err(err) => {
                warn!("[ContactSyncController] {} failed: {}", op_name, err);
                state.last_error = Some(err.clone());
            }
        }
        self.publish(&state);
        result.map(SyncOutcome::Applied)
    }

    /// Record an identity transition and return the fetch it requires.
    fn apply_identity(&self, event: IdentityEvent) -> Option<Ticket> {
        let mut state = self.state();
        match event {
            None => {
                info!("[ContactSyncController] Signed out, clearing contacts");
                state.reset(None);
                self.publish(&state);
                None
            }
            Some(identity) => {
                let same_user = state
                    .identity
                    .as_ref()
                    .map(|current| current.same_user(&identity))
                    .unwrap_or(false);
                if same_user {
                    debug!(
                        "[ContactSyncController] Credential refreshed for '{}'",
                        identity.uid()
                    );
                    state.identity = Some(identity);
                    return None;
                }

                info!(
                    "[ContactSyncController] Signed in as '{}', loading contacts",
                    identity.uid()
                );
                state.reset(Some(identity));
                state.pending_fetches = 1;
                self.publish(&state);
                state.ticket()
            }
        }
    }

    /// React to a sign-in or sign-out.
    ///
    /// Returns the number of contacts in the list afterwards. A new user
    /// triggers a full fetch; the same user with a fresh credential keeps the
    /// current list.
    pub async fn on_identity_changed(&self, event: IdentityEvent) -> Result<SyncOutcome<usize>> {
        match self.apply_identity(event) {
            Some(ticket) => self.load(ticket).await,
            None => Ok(SyncOutcome::Applied(self.state().contacts.len())),
        }
    }

    /// Drive this controller from `monitor` until the subscription is
    /// cancelled.
    ///
    /// Transitions are applied in order as they arrive. Fetches run on their
    /// own tasks so a sign-out is never queued behind a slow `list`.
    pub fn attach(&self, monitor: &AuthSessionMonitor) -> Subscription {
        let mut stream = monitor.subscribe();
        let stream_id = stream.id();
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if let Some(ticket) = controller.apply_identity(event) {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        // Failures are already logged and recorded in the snapshot
                        let _ = controller.load(ticket).await;
                    });
                }
            }
        });
        monitor.subscription_for(stream_id, handle)
    }

    #[tracing::instrument(
        name = "contacts.load",
        skip(self, ticket),
        fields(uid = %ticket.identity.uid(), epoch = ticket.epoch, op_id = %uuid::Uuid::new_v4())
    )]
    async fn load(&self, ticket: Ticket) -> Result<SyncOutcome<usize>> {
        let pending = PendingFetch::new(self, ticket.epoch);
        let store = &self.inner.store;
        let identity = &ticket.identity;
        let fetched = self
            .inner
            .retry
            .run(
                "list",
                || store.list(identity),
                || self.is_current(ticket.epoch),
            )
            .await;

        pending.settle();
        self.complete("list", ticket.epoch, |state| {
            state.finish_fetch();
            let contacts = fetched?;
            contacts.iter().try_for_each(require_id)?;
            info!(
                "[ContactSyncController] Loaded {} contacts for '{}'",
                contacts.len(),
                ticket.identity.uid()
            );
            state.contacts = contacts;
            state.prune_favorites();
            Ok(state.contacts.len())
        })
    }

    /// Re-fetch the full list and replace the local one.
    pub async fn refresh(&self) -> Result<SyncOutcome<usize>> {
        let ticket = {
            let mut state = self.state();
            let Some(ticket) = state.ticket() else {
                debug!("[ContactSyncController] refresh skipped: no identity");
                return Ok(SyncOutcome::Skipped(SkipReason::NoIdentity));
            };
            state.pending_fetches += 1;
            state.phase = SessionPhase::Loading;
            self.publish(&state);
            ticket
        };
        self.load(ticket).await
    }

    /// Create a contact remotely and append it locally.
    ///
    /// Never retried: a create that timed out may still have been applied.
    #[tracing::instrument(name = "contacts.add", skip(self, fields), fields(op_id = %uuid::Uuid::new_v4()))]
    pub async fn add(&self, fields: ContactFields) -> Result<SyncOutcome<Contact>> {
        let Some(ticket) = self.state().ticket() else {
            debug!("[ContactSyncController] add skipped: no identity");
            return Ok(SyncOutcome::Skipped(SkipReason::NoIdentity));
        };

        let created = self.inner.store.create(&ticket.identity, fields).await;

        self.complete("create", ticket.epoch, |state| {
            let contact = created?;
            require_id(&contact)?;
            info!("[ContactSyncController] Added contact '{}'", contact.id);
            state.contacts.push(contact.clone());
            Ok(contact)
        })
    }

    /// Replace the fields of a contact remotely and in place locally.
    #[tracing::instrument(name = "contacts.update", skip(self, id, fields), fields(id = %id, op_id = %uuid::Uuid::new_v4()))]
    pub async fn update(
        &self,
        id: &ContactId,
        fields: ContactFields,
    ) -> Result<SyncOutcome<Contact>> {
        let Some(ticket) = self.state().ticket() else {
            debug!("[ContactSyncController] update skipped: no identity");
            return Ok(SyncOutcome::Skipped(SkipReason::NoIdentity));
        };

        let store = &self.inner.store;
        let identity = &ticket.identity;
        let updated = self
            .inner
            .retry
            .run(
                "update",
                || store.update(identity, id, fields.clone()),
                || self.is_current(ticket.epoch),
            )
            .await;

        self.complete("update", ticket.epoch, |state| {
            let contact = updated?;
            require_id(&contact)?;
            for entry in state.contacts.iter_mut().filter(|entry| &entry.id == id) {
                entry.fields = contact.fields.clone();
            }
            info!("[ContactSyncController] Updated contact '{}'", id);
            Ok(contact)
        })
    }

    /// Delete a contact remotely, then drop every local entry with its id.
    ///
    /// Returns how many local entries were removed.
    #[tracing::instrument(name = "contacts.remove", skip(self, id), fields(id = %id, op_id = %uuid::Uuid::new_v4()))]
    pub async fn remove(&self, id: &ContactId) -> Result<SyncOutcome<usize>> {
        let Some(ticket) = self.state().ticket() else {
            debug!("[ContactSyncController] remove skipped: no identity");
            return Ok(SyncOutcome::Skipped(SkipReason::NoIdentity));
        };

        let store = &self.inner.store;
        let identity = &ticket.identity;
        let deleted = self
            .inner
            .retry
            .run(
                "delete",
                || store.delete(identity, id),
                || self.is_current(ticket.epoch),
            )
            .await;

        self.complete("delete", ticket.epoch, |state| {
            deleted?;
            let before = state.contacts.len();
            state.contacts.retain(|contact| &contact.id != id);
            state.prune_favorites();
            let removed = before - state.contacts.len();
            info!(
                "[ContactSyncController] Removed contact '{}' ({} local entries)",
                id, removed
            );
            Ok(removed)
        })
    }

    /// Flip the favorite mark of a listed contact.
    ///
    /// Returns whether it is a favorite afterwards. Ids not in the list are
    /// ignored and report `false`.
    pub fn toggle_favorite(&self, id: &ContactId) -> bool {
        let mut state = self.state();
        if !state.contacts.iter().any(|contact| &contact.id == id) {
            debug!(
                "[ContactSyncController] Ignoring favorite toggle for unknown contact '{}'",
                id
            );
            return false;
        }
        let favorite = state.favorites.toggle(id);
        self.publish(&state);
        favorite
    }

    pub fn is_favorite(&self, id: &ContactId) -> bool {
        self.state().favorites.contains(id)
    }

    /// Replace the favorites set, keeping only ids present in the list.
    pub fn set_favorites(&self, ids: BTreeSet<ContactId>) {
        let mut state = self.state();
        state.favorites.replace(ids);
        state.prune_favorites();
        self.publish(&state);
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.state().contacts.clone()
    }

    pub fn contact(&self, id: &ContactId) -> Option<Contact> {
        self.state()
            .contacts
            .iter()
            .find(|contact| &contact.id == id)
            .cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn favorites(&self) -> BTreeSet<ContactId> {
        self.state().favorites.to_set()
    }

    /// Favorite contacts in list order.
    pub fn favorite_contacts(&self) -> Vec<Contact> {
        let state = self.state();
        state
            .contacts
            .iter()
            .filter(|contact| state.favorites.contains(&contact.id))
            .cloned()
            .collect()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state().identity.clone()
    }

    pub fn last_error(&self) -> Option<SyncError> {
        self.state().last_error.clone()
    }

    pub fn snapshot(&self) -> ContactsSnapshot {
        self.state().snapshot()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ContactsSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::StoreOp;
    use crate::store::MemoryContactStore;

    fn contact(id: &str, name: &str) -> Contact {
        Contact::new(id, ContactFields::new().with("name", name))
    }

    fn setup() -> (Arc<MemoryContactStore>, ContactSyncController) {
        let store = Arc::new(MemoryContactStore::new());
        let config = SyncConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                multiplier: 2.0,
            },
        };
        let controller = ContactSyncController::with_config(store.clone(), config);
        (store, controller)
    }

    #[test]
    fn starts_initializing_and_loading() {
        let (_, controller) = setup();
        assert_eq!(controller.phase(), SessionPhase::Initializing);
        assert!(controller.is_loading());
        assert!(controller.contacts().is_empty());
    }

    #[tokio::test]
    async fn sign_out_settles_empty_and_not_loading() {
        let (_, controller) = setup();
        let outcome = controller.on_identity_changed(None).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Applied(0));
        assert_eq!(controller.phase(), SessionPhase::NoSession);
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn operations_without_identity_are_skipped() {
        let (store, controller) = setup();
        controller.on_identity_changed(None).await.unwrap();

        let fields = ContactFields::new().with("name", "Bob");
        assert_eq!(
            controller.add(fields.clone()).await.unwrap(),
            SyncOutcome::Skipped(SkipReason::NoIdentity)
        );
        assert_eq!(
            controller.refresh().await.unwrap(),
            SyncOutcome::Skipped(SkipReason::NoIdentity)
        );
        assert_eq!(
            controller.remove(&ContactId::from("a")).await.unwrap(),
            SyncOutcome::Skipped(SkipReason::NoIdentity)
        );
        assert_eq!(
            controller
                .update(&ContactId::from("a"), fields)
                .await
                .unwrap(),
            SyncOutcome::Skipped(SkipReason::NoIdentity)
        );
        assert_eq!(store.call_count(StoreOp::Create), 0);
        assert_eq!(store.call_count(StoreOp::List), 0);
    }

    #[tokio::test]
    async fn credential_refresh_keeps_list_without_refetch() {
        let (store, controller) = setup();
        store.seed("alice", vec![contact("a", "Alice")]);
        controller
            .on_identity_changed(Some(Identity::with_token("alice", "t1")))
            .await
            .unwrap();

        controller
            .on_identity_changed(Some(Identity::with_token("alice", "t2")))
            .await
            .unwrap();

        assert_eq!(store.call_count(StoreOp::List), 1);
        assert_eq!(controller.contacts(), vec![contact("a", "Alice")]);
        assert_eq!(
            controller.identity().and_then(|i| i.id_token().map(String::from)),
            Some("t2".to_string())
        );
    }

    #[tokio::test]
    async fn failed_initial_fetch_is_ready_and_empty_with_error() {
        let (store, controller) = setup();
        store.set_available(false);

        let err = controller
            .on_identity_changed(Some(Identity::new("alice")))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(store.call_count(StoreOp::List), 3);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Ready);
        assert!(!snapshot.is_loading);
        assert!(snapshot.contacts.is_empty());
        assert_eq!(snapshot.last_error, Some(err));
    }

    #[tokio::test]
    async fn empty_store_id_is_rejected() {
        let (store, controller) = setup();
        store.seed("alice", vec![contact("", "Ghost")]);

        let err = controller
            .on_identity_changed(Some(Identity::new("alice")))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MalformedResponse { .. }));
        assert!(controller.contacts().is_empty());
    }

    #[tokio::test]
    async fn failed_add_leaves_list_unchanged() {
        let (store, controller) = setup();
        store.seed("alice", vec![contact("a", "Alice")]);
        controller
            .on_identity_changed(Some(Identity::new("alice")))
            .await
            .unwrap();

        store.fail_next(1);
        let result = controller
            .add(ContactFields::new().with("name", "Bob"))
            .await;

        assert!(result.is_err());
        assert_eq!(store.call_count(StoreOp::Create), 1);
        assert_eq!(controller.contacts(), vec![contact("a", "Alice")]);
        assert!(controller.last_error().is_some());
    }

    #[tokio::test]
    async fn toggle_favorite_ignores_unlisted_ids() {
        let (store, controller) = setup();
        store.seed("alice", vec![contact("a", "Alice")]);
        controller
            .on_identity_changed(Some(Identity::new("alice")))
            .await
            .unwrap();

        assert!(!controller.toggle_favorite(&ContactId::from("zzz")));
        assert!(controller.favorites().is_empty());

        assert!(controller.toggle_favorite(&ContactId::from("a")));
        assert!(controller.is_favorite(&ContactId::from("a")));
        assert_eq!(controller.favorite_contacts(), vec![contact("a", "Alice")]);
    }

    #[tokio::test]
    async fn set_favorites_filters_to_listed_ids() {
        let (store, controller) = setup();
        store.seed("alice", vec![contact("a", "Alice"), contact("b", "Bob")]);
        controller
            .on_identity_changed(Some(Identity::new("alice")))
            .await
            .unwrap();

        controller.set_favorites(["b", "x"].into_iter().map(ContactId::from).collect());

        let expected: BTreeSet<ContactId> = [ContactId::from("b")].into_iter().collect();
        assert_eq!(controller.favorites(), expected);
    }

    #[tokio::test]
    async fn switching_users_clears_favorites_and_list() {
        let (store, controller) = setup();
        store.seed("alice", vec![contact("a", "Alice")]);
        store.seed("bob", vec![contact("b", "Bea")]);
        controller
            .on_identity_changed(Some(Identity::new("alice")))
            .await
            .unwrap();
        controller.toggle_favorite(&ContactId::from("a"));

        controller
            .on_identity_changed(Some(Identity::new("bob")))
            .await
            .unwrap();

        assert_eq!(controller.contacts(), vec![contact("b", "Bea")]);
        assert!(controller.favorites().is_empty());
    }

    #[tokio::test]
    async fn watch_receiver_sees_state_changes() {
        let (store, controller) = setup();
        store.seed("alice", vec![contact("a", "Alice")]);
        let mut rx = controller.subscribe();
        assert_eq!(rx.borrow().phase, SessionPhase::Initializing);

        controller
            .on_identity_changed(Some(Identity::new("alice")))
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.phase, SessionPhase::Ready);
        assert_eq!(snapshot.user.as_deref(), Some("alice"));
        assert_eq!(snapshot.contacts.len(), 1);
    }
}
