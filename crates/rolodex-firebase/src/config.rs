use reqwest::Url;
use rolodex::store::DEFAULT_COLLECTION;
use rolodex_api::SyncError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FirebaseError;

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const IDENTITY_TOOLKIT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

fn default_database() -> String {
    "(default)".to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_firestore_url() -> String {
    FIRESTORE_BASE_URL.to_string()
}

fn default_auth_url() -> String {
    IDENTITY_TOOLKIT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    300
}

/// Connection settings for a Firebase project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Web API key, sent as `?key=` to the identity toolkit
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection under `users/{uid}/`
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Documents requested per list page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            database: default_database(),
            collection: default_collection(),
            firestore_url: default_firestore_url(),
            auth_url: default_auth_url(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl FirebaseConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Point both APIs at a single base URL (emulators, HTTP mocks).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        self.firestore_url = format!("{}/v1", base_url);
        self.auth_url = format!("{}/v1", base_url);
        self
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let missing: Vec<&str> = [
            ("api_key", self.api_key.is_empty()),
            ("project_id", self.project_id.is_empty()),
            ("collection", self.collection.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::InvalidConfig {
                message: format!("missing firebase settings: {}", missing.join(", ")),
            })
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `.../projects/{project}/databases/{database}/documents`
    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.firestore_url.trim_end_matches('/'),
            self.project_id,
            self.database
        )
    }

    /// Collection URL scoped to one user.
    ///
    /// The uid is appended as a single percent-encoded path segment.
    pub fn collection_url(&self, uid: &str) -> Result<Url, FirebaseError> {
        if !is_plain_segment(uid) {
            return Err(FirebaseError::Provider {
                message: format!("invalid user id '{}'", uid),
            });
        }
        let mut url = Url::parse(&self.documents_url())
            .map_err(|e| FirebaseError::Config(format!("invalid firestore_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FirebaseError::Config("firestore_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["users", uid, self.collection.as_str()]);
        Ok(url)
    }

    /// URL of one document in the user's collection.
    ///
    /// Ids that cannot name a document in that collection are `NotFound`
    /// without leaving it.
    pub fn document_url(&self, uid: &str, document_id: &str) -> Result<Url, FirebaseError> {
        let mut url = self.collection_url(uid)?;
        if !is_plain_segment(document_id) {
            return Err(FirebaseError::NotFound {
                path: format!("{}/{}", url, document_id),
            });
        }
        url.path_segments_mut()
            .map_err(|_| FirebaseError::Config("firestore_url cannot be a base".to_string()))?
            .push(document_id);
        Ok(url)
    }
}

/// Path segments are pushed encoded, but `.` and `..` would still be dropped
/// or resolved.
fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}
