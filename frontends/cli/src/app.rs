use anyhow::{bail, Result};
use rolodex::{
    AuthSessionMonitor, ContactSyncController, MemoryContactStore, RemoteStore, Subscription,
};
use rolodex_api::{Contact, ContactsSnapshot, Identity, SessionPhase, SkipReason, SyncOutcome};
use rolodex_firebase::{FirebaseAuthClient, FirebaseAuthenticator, FirestoreContactStore};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::commands::{Command, HELP};
use crate::config::AppConfig;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the command loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

enum Auth {
    /// Any email signs in as itself; passwords are ignored
    Local(AuthSessionMonitor),
    Firebase(FirebaseAuthenticator),
}

pub struct App {
    controller: ContactSyncController,
    auth: Auth,
    _subscription: Subscription,
}

impl App {
    /// Build the app from configuration. Without a Firebase section (or with
    /// `force_memory`) contacts live in memory for the session.
    pub fn from_config(config: AppConfig, force_memory: bool) -> Result<Self> {
        let monitor = AuthSessionMonitor::new();
        match config.firebase {
            Some(firebase) if !force_memory => {
                let store = FirestoreContactStore::new(firebase.clone())?;
                let client = FirebaseAuthClient::new(firebase)?;
                let authenticator = FirebaseAuthenticator::new(client, monitor);
                info!("[App] Using Firestore project");
                Ok(Self::build(
                    Arc::new(store),
                    config.sync,
                    Auth::Firebase(authenticator),
                ))
            }
            _ => {
                info!("[App] Using in-memory store");
                Ok(Self::build(
                    Arc::new(MemoryContactStore::new()),
                    config.sync,
                    Auth::Local(monitor),
                ))
            }
        }
    }

    fn build(store: Arc<dyn RemoteStore>, sync: rolodex::SyncConfig, auth: Auth) -> Self {
        let controller = ContactSyncController::with_config(store, sync);
        let monitor = match &auth {
            Auth::Local(monitor) => monitor,
            Auth::Firebase(authenticator) => authenticator.monitor(),
        };
        let subscription = controller.attach(monitor);
        // Nobody is signed in at start-up
        match &auth {
            Auth::Local(monitor) if !monitor.has_state() => monitor.publish(None),
            Auth::Local(_) => {}
            Auth::Firebase(authenticator) => authenticator.publish_initial_state(),
        }
        Self {
            controller,
            auth,
            _subscription: subscription,
        }
    }

    pub fn controller(&self) -> &ContactSyncController {
        &self.controller
    }

    /// Run one command, writing its output to `out`.
    pub async fn execute(&self, command: Command, out: &mut impl Write) -> Result<Flow> {
        match command {
            Command::List => {
                let snapshot = self.settle(|_| true).await;
                render_list(&snapshot, &snapshot.contacts, out)?;
            }
            Command::Favs => {
                let snapshot = self.settle(|_| true).await;
                let favorites: Vec<Contact> = snapshot.favorite_contacts().cloned().collect();
                render_list(&snapshot, &favorites, out)?;
            }
            Command::Show(id) => match self.controller.contact(&id) {
                Some(contact) => render_contact(&contact, self.controller.is_favorite(&id), out)?,
                None => writeln!(out, "No contact '{}'", id)?,
            },
            Command::Add(fields) => {
                let outcome = self.controller.add(fields).await?;
                report(outcome, out, |contact, out| {
                    writeln!(out, "Added {}", contact.id)
                })?;
            }
            Command::Edit(id, fields) => {
                let outcome = self.controller.update(&id, fields).await?;
                report(outcome, out, |contact, out| {
                    writeln!(out, "Updated {}", contact.id)
                })?;
            }
            Command::Delete(id) => {
                let outcome = self.controller.remove(&id).await?;
                report(outcome, out, |removed, out| match removed {
                    0 => writeln!(out, "Deleted {} (it was not listed)", id),
                    _ => writeln!(out, "Deleted {}", id),
                })?;
            }
            Command::Fav(id) => {
                if self.controller.contact(&id).is_none() {
                    writeln!(out, "No contact '{}'", id)?;
                } else if self.controller.toggle_favorite(&id) {
                    writeln!(out, "{} is now a favorite", id)?;
                } else {
                    writeln!(out, "{} is no longer a favorite", id)?;
                }
            }
            Command::Refresh => {
                let outcome = self.controller.refresh().await?;
                report(outcome, out, |count, out| {
                    writeln!(out, "Loaded {} contacts", count)
                })?;
            }
            Command::Login { email, password } => {
                let uid = self.sign_in(&email, &password, false).await?;
                let snapshot = self
                    .settle(|s| s.user.as_deref() == Some(uid.as_str()))
                    .await;
                writeln!(
                    out,
                    "Signed in as {} ({} contacts)",
                    email,
                    snapshot.contacts.len()
                )?;
            }
            Command::Signup { email, password } => {
                let uid = self.sign_in(&email, &password, true).await?;
                self.settle(|s| s.user.as_deref() == Some(uid.as_str()))
                    .await;
                writeln!(out, "Account created, signed in as {}", email)?;
            }
            Command::Logout => {
                match &self.auth {
                    Auth::Local(monitor) => monitor.publish(None),
                    Auth::Firebase(authenticator) => authenticator.sign_out(),
                }
                self.settle(|s| s.phase == SessionPhase::NoSession).await;
                writeln!(out, "Signed out")?;
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Sign in (or register) and return the uid.
    async fn sign_in(&self, email: &str, password: &str, register: bool) -> Result<String> {
        let identity = match &self.auth {
            Auth::Local(monitor) => {
                if email.is_empty() {
                    bail!("email must not be empty");
                }
                let identity = Identity::new(email);
                monitor.publish(Some(identity.clone()));
                identity
            }
            Auth::Firebase(authenticator) if register => {
                authenticator.sign_up(email, password).await?.identity
            }
            Auth::Firebase(authenticator) => authenticator.sign_in(email, password).await?.identity,
        };
        Ok(identity.uid().to_string())
    }

    /// Wait until the attached controller has applied pending transitions
    /// and fetches, and `ready` holds.
    async fn settle(&self, ready: impl Fn(&ContactsSnapshot) -> bool) -> ContactsSnapshot {
        let mut rx = self.controller.subscribe();
        let settled = tokio::time::timeout(
            SETTLE_TIMEOUT,
            rx.wait_for(|snapshot| !snapshot.is_loading && ready(snapshot)),
        )
        .await;
        match settled {
            Ok(Ok(snapshot)) => snapshot.clone(),
            _ => self.controller.snapshot(),
        }
    }
}

fn report<T>(
    outcome: SyncOutcome<T>,
    out: &mut dyn Write,
    applied: impl FnOnce(T, &mut dyn Write) -> std::io::Result<()>,
) -> Result<()> {
    match outcome {
        SyncOutcome::Applied(value) => applied(value, out)?,
        SyncOutcome::Skipped(SkipReason::NoIdentity) => writeln!(out, "Not signed in")?,
        SyncOutcome::Skipped(SkipReason::StaleIdentity) => {
            writeln!(out, "Signed-in user changed; result discarded")?
        }
    }
    Ok(())
}

fn render_list(
    snapshot: &ContactsSnapshot,
    contacts: &[Contact],
    out: &mut impl Write,
) -> Result<()> {
    match snapshot.phase {
        SessionPhase::NoSession | SessionPhase::Initializing => {
            writeln!(out, "Not signed in")?;
            return Ok(());
        }
        SessionPhase::Loading => writeln!(out, "(still loading)")?,
        SessionPhase::Ready => {}
    }
    if let Some(err) = &snapshot.last_error {
        writeln!(out, "! {}", err)?;
    }
    if contacts.is_empty() {
        writeln!(out, "No contacts")?;
    }
    for contact in contacts {
        let star = if snapshot.favorites.contains(&contact.id) {
            "*"
        } else {
            " "
        };
        writeln!(out, "{} {:<22} {}", star, contact.id, contact.display_name())?;
    }
    Ok(())
}

fn render_contact(contact: &Contact, favorite: bool, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "{}{}",
        contact.display_name(),
        if favorite { " (favorite)" } else { "" }
    )?;
    writeln!(out, "  id: {}", contact.id)?;
    for (key, value) in contact.fields.iter() {
        writeln!(out, "  {}: {}", key, value)?;
    }
    Ok(())
}
