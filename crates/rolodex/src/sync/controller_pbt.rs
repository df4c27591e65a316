//! Stateful property-based tests for the sync controller
//!
//! Drives `ContactSyncController` over a `MemoryContactStore` with random
//! sequences of sign-in, sign-out and contact operations, and compares the
//! visible state with a plain reference model after every step. Store ids are
//! unknown to the model, so it addresses contacts by list position.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest};
use rolodex_api::{Contact, ContactFields, Identity, SessionPhase, SkipReason, SyncOutcome};

use super::ContactSyncController;
use crate::config::SyncConfig;
use crate::store::{MemoryContactStore, RetryPolicy};

const USERS: [&str; 2] = ["alice", "bob"];

fn named(name: &str) -> ContactFields {
    ContactFields::new().with("name", name)
}

#[derive(Debug, Clone)]
enum ContactTransition {
    SignIn(String),
    SignOut,
    Add(String),
    Remove(usize),
    Update(usize, String),
    ToggleFavorite(usize),
    Refresh,
}

#[derive(Debug, Clone)]
struct ReferenceState {
    signed_in: Option<String>,
    /// Remote contact names per user, in store order
    remote: BTreeMap<String, Vec<String>>,
    /// Local list as (name, favorite)
    local: Vec<(String, bool)>,
}

impl ReferenceState {
    fn initial() -> Self {
        let mut remote = BTreeMap::new();
        remote.insert("alice".to_string(), vec!["Ann".to_string(), "Art".to_string()]);
        Self {
            signed_in: None,
            remote,
            local: Vec::new(),
        }
    }
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{0,6}"
}

impl ReferenceStateMachine for ReferenceState {
    type State = Self;
    type Transition = ContactTransition;

    fn init_state() -> BoxedStrategy<Self::State> {
        Just(ReferenceState::initial()).boxed()
    }

    fn transitions(state: &Self::State) -> BoxedStrategy<Self::Transition> {
        let sign_in = prop::sample::select(USERS.to_vec())
            .prop_map(|uid| ContactTransition::SignIn(uid.to_string()));
        let add = name_strategy().prop_map(ContactTransition::Add);

        if state.local.is_empty() {
            prop_oneof![
                3 => sign_in,
                1 => Just(ContactTransition::SignOut),
                3 => add,
                1 => Just(ContactTransition::Refresh),
            ]
            .boxed()
        } else {
            let len = state.local.len();
            prop_oneof![
                2 => sign_in,
                1 => Just(ContactTransition::SignOut),
                3 => add,
                2 => (0..len).prop_map(ContactTransition::Remove),
                2 => (0..len, name_strategy())
                    .prop_map(|(index, name)| ContactTransition::Update(index, name)),
                2 => (0..len).prop_map(ContactTransition::ToggleFavorite),
                1 => Just(ContactTransition::Refresh),
            ]
            .boxed()
        }
    }

    fn preconditions(state: &Self::State, transition: &Self::Transition) -> bool {
        match transition {
            ContactTransition::Remove(index)
            | ContactTransition::Update(index, _)
            | ContactTransition::ToggleFavorite(index) => *index < state.local.len(),
            _ => true,
        }
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        match transition {
            ContactTransition::SignIn(uid) => {
                if state.signed_in.as_deref() != Some(uid.as_str()) {
                    state.signed_in = Some(uid.clone());
                    state.local = state
                        .remote
                        .get(uid)
                        .map(|names| names.iter().map(|n| (n.clone(), false)).collect())
                        .unwrap_or_default();
                }
            }
            ContactTransition::SignOut => {
                state.signed_in = None;
                state.local.clear();
            }
            ContactTransition::Add(name) => {
                if let Some(uid) = state.signed_in.clone() {
                    state.remote.entry(uid).or_default().push(name.clone());
                    state.local.push((name.clone(), false));
                }
            }
            ContactTransition::Remove(index) => {
                if let Some(uid) = state.signed_in.clone() {
                    state.remote.entry(uid).or_default().remove(*index);
                    state.local.remove(*index);
                }
            }
            ContactTransition::Update(index, name) => {
                if let Some(uid) = state.signed_in.clone() {
                    state.remote.entry(uid).or_default()[*index] = name.clone();
                    state.local[*index].0 = name.clone();
                }
            }
            ContactTransition::ToggleFavorite(index) => {
                let entry = &mut state.local[*index];
                entry.1 = !entry.1;
            }
            ContactTransition::Refresh => {}
        }
        state
    }
}

struct ControllerTest {
    runtime: tokio::runtime::Runtime,
    store: Arc<MemoryContactStore>,
    controller: ContactSyncController,
}

impl StateMachineTest for ControllerTest {
    type SystemUnderTest = Self;
    type Reference = ReferenceState;

    fn init_test(
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = Arc::new(MemoryContactStore::new());
        for (uid, names) in &ref_state.remote {
            let contacts = names
                .iter()
                .map(|name| Contact::new(crate::store::memory::auto_id(), named(name)))
                .collect();
            store.seed(uid, contacts);
        }
        let controller = ContactSyncController::with_config(
            store.clone(),
            SyncConfig {
                retry: RetryPolicy::none(),
            },
        );
        ControllerTest {
            runtime,
            store,
            controller,
        }
    }

    fn apply(
        state: Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        let controller = &state.controller;
        let id_at = |index: usize| controller.contacts()[index].id.clone();

        match transition {
            ContactTransition::SignIn(uid) => {
                state
                    .runtime
                    .block_on(controller.on_identity_changed(Some(Identity::new(uid))))
                    .unwrap();
            }
            ContactTransition::SignOut => {
                state
                    .runtime
                    .block_on(controller.on_identity_changed(None))
                    .unwrap();
            }
            ContactTransition::Add(name) => {
                let outcome = state
                    .runtime
                    .block_on(controller.add(named(&name)))
                    .unwrap();
                match outcome {
                    SyncOutcome::Applied(contact) => {
                        assert!(ref_state.signed_in.is_some());
                        assert_eq!(controller.contacts().last(), Some(&contact));
                        assert_eq!(contact.name(), Some(name.as_str()));
                    }
                    SyncOutcome::Skipped(reason) => {
                        assert!(ref_state.signed_in.is_none());
                        assert_eq!(reason, SkipReason::NoIdentity);
                    }
                }
            }
            ContactTransition::Remove(index) => {
                let id = id_at(index);
                let outcome = state.runtime.block_on(controller.remove(&id)).unwrap();
                assert_eq!(outcome, SyncOutcome::Applied(1));
                assert!(controller.contact(&id).is_none());
            }
            ContactTransition::Update(index, name) => {
                let id = id_at(index);
                state
                    .runtime
                    .block_on(controller.update(&id, named(&name)))
                    .unwrap();
                assert_eq!(controller.contacts()[index].id, id);
            }
            ContactTransition::ToggleFavorite(index) => {
                let id = id_at(index);
                let favorite = controller.toggle_favorite(&id);
                assert_eq!(favorite, ref_state.local[index].1);
            }
            ContactTransition::Refresh => {
                let outcome = state.runtime.block_on(controller.refresh()).unwrap();
                if ref_state.signed_in.is_none() {
                    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NoIdentity));
                }
            }
        }
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        let snapshot = state.controller.snapshot();

        let names: Vec<&str> = snapshot
            .contacts
            .iter()
            .map(|contact| contact.name().unwrap_or_default())
            .collect();
        let expected: Vec<&str> = ref_state.local.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, expected);

        if snapshot.phase == SessionPhase::NoSession {
            assert!(snapshot.contacts.is_empty());
            assert!(!snapshot.is_loading);
        }

        let listed: BTreeSet<_> = snapshot.contacts.iter().map(|c| c.id.clone()).collect();
        assert!(snapshot.favorites.is_subset(&listed));

        let favorite_flags: Vec<bool> = snapshot
            .contacts
            .iter()
            .map(|contact| snapshot.favorites.contains(&contact.id))
            .collect();
        let expected_flags: Vec<bool> = ref_state.local.iter().map(|(_, f)| *f).collect();
        assert_eq!(favorite_flags, expected_flags);

        assert!(snapshot.contacts.iter().all(|contact| !contact.id.is_empty()));

        match &ref_state.signed_in {
            Some(uid) => {
                assert_eq!(snapshot.user.as_deref(), Some(uid.as_str()));
                assert_eq!(snapshot.phase, SessionPhase::Ready);
                assert_eq!(state.store.contacts_for(uid), snapshot.contacts);
            }
            None => assert!(snapshot.user.is_none()),
        }
    }
}

proptest_state_machine::prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn contact_sync_controller_matches_reference(sequential 1..30 => ControllerTest);
}
