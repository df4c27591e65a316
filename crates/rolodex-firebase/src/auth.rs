//! Email/password authentication against the Firebase identity toolkit
//!
//! [`FirebaseAuthClient`] speaks the REST API. [`FirebaseAuthenticator`]
//! wraps it and publishes every sign-in and sign-out to an
//! [`AuthSessionMonitor`], which is what the sync controller listens to.

use chrono::{DateTime, Duration, Utc};
use rolodex::AuthSessionMonitor;
use rolodex_api::{Identity, SyncError};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::client::{handle_response, http_client, transport_error};
use crate::config::FirebaseConfig;
use crate::error::FirebaseError;
use crate::models::{GoogleErrorResponse, PasswordAuthRequest, PasswordAuthResponse};

/// A signed-in session returned by the identity toolkit.
#[derive(Clone)]
pub struct AuthSession {
    pub identity: Identity,
    pub email: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn from_response(
        response: PasswordAuthResponse,
        now: DateTime<Utc>,
    ) -> Result<Self, FirebaseError> {
        let lifetime: i64 = response.expires_in.trim().parse().map_err(|_| {
            FirebaseError::Decode(format!("invalid expiresIn '{}'", response.expires_in))
        })?;
        let expires_at = Duration::try_seconds(lifetime)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                FirebaseError::Decode(format!("expiresIn '{}' out of range", response.expires_in))
            })?;
        Ok(Self {
            identity: Identity::with_token(response.local_id, response.id_token),
            email: response.email,
            refresh_token: response.refresh_token,
            expires_at,
        })
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("identity", &self.identity)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// REST client for `accounts:signInWithPassword` and `accounts:signUp`.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    client: reqwest::Client,
    config: FirebaseConfig,
}

impl FirebaseAuthClient {
    pub fn new(config: FirebaseConfig) -> Result<Self, FirebaseError> {
        if config.api_key.is_empty() {
            return Err(FirebaseError::Config("api_key is required".to_string()));
        }
        let client = http_client(&config)?;
        Ok(Self { client, config })
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, FirebaseError> {
        self.password_request("accounts:signInWithPassword", email, password)
            .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, FirebaseError> {
        self.password_request("accounts:signUp", email, password).await
    }

    async fn password_request(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, FirebaseError> {
        let url = format!("{}/{}", self.config.auth_url.trim_end_matches('/'), method);
        let body = PasswordAuthRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, &url, method))?;

        // Provider rejections come back as 400 with an error envelope
        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorResponse>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            warn!("[FirebaseAuthClient] {} rejected: {}", method, message);
            return Err(FirebaseError::Provider { message });
        }

        let text = handle_response(response, &url).await?;
        let parsed: PasswordAuthResponse = serde_json::from_str(&text)
            .map_err(|e| FirebaseError::Decode(format!("{} response: {}", method, e)))?;
        AuthSession::from_response(parsed, Utc::now())
    }
}

/// Signs users in and out, keeping an [`AuthSessionMonitor`] up to date.
pub struct FirebaseAuthenticator {
    client: FirebaseAuthClient,
    monitor: AuthSessionMonitor,
    session: Mutex<Option<AuthSession>>,
}

impl FirebaseAuthenticator {
    pub fn new(client: FirebaseAuthClient, monitor: AuthSessionMonitor) -> Self {
        Self {
            client,
            monitor,
            session: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> &AuthSessionMonitor {
        &self.monitor
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, SyncError> {
        let session = self.client.sign_in_with_password(email, password).await?;
        info!("[FirebaseAuthenticator] Signed in '{}'", session.identity.uid());
        self.establish(session.clone());
        Ok(session)
    }

    /// Create an account; the new user is signed in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, SyncError> {
        let session = self.client.sign_up(email, password).await?;
        info!("[FirebaseAuthenticator] Registered '{}'", session.identity.uid());
        self.establish(session.clone());
        Ok(session)
    }

    pub fn sign_out(&self) {
        *self.lock_session() = None;
        self.monitor.publish(None);
    }

    /// Publish "no identity" when nobody has signed in yet, so listeners
    /// leave their start-up state.
    pub fn publish_initial_state(&self) {
        if !self.monitor.has_state() {
            self.monitor.publish(None);
        }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.lock_session().clone()
    }

    fn establish(&self, session: AuthSession) {
        let identity = session.identity.clone();
        *self.lock_session() = Some(session);
        self.monitor.publish(Some(identity));
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<AuthSession>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
