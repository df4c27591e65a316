use reqwest::StatusCode;
use rolodex_api::SyncError;

/// Errors raised by the Firebase REST adapters.
#[derive(Debug, thiserror::Error)]
pub enum FirebaseError {
    /// Network failure before an HTTP status was received
    #[error("{0}")]
    Transport(String),

    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Document not found: {path}")]
    NotFound { path: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The identity provider rejected the request (e.g. `EMAIL_NOT_FOUND`)
    #[error("Identity provider error: {message}")]
    Provider { message: String },

    #[error("Identity has no id token")]
    MissingCredential,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FirebaseError {
    pub fn http(status: StatusCode, url: &str, message: impl Into<String>) -> Self {
        FirebaseError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            message: message.into(),
        }
    }
}

impl From<FirebaseError> for SyncError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::NotFound { path } => SyncError::ContactNotFound {
                id: path.rsplit('/').next().unwrap_or_default().to_string(),
            },
            FirebaseError::Decode(message) => SyncError::MalformedResponse { message },
            FirebaseError::Provider { message } => SyncError::AuthFailed { message },
            FirebaseError::MissingCredential => SyncError::AuthFailed {
                message: "identity has no id token".to_string(),
            },
            FirebaseError::Config(message) => SyncError::InvalidConfig { message },
            other @ (FirebaseError::Transport(_) | FirebaseError::Http { .. }) => {
                SyncError::RemoteUnavailable {
                    message: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_contact_id() {
        let err = FirebaseError::NotFound {
            path: "projects/p/databases/(default)/documents/users/u/contacts/abc".into(),
        };
        assert_eq!(
            SyncError::from(err),
            SyncError::ContactNotFound { id: "abc".into() }
        );
    }

    #[test]
    fn http_and_transport_failures_are_transient() {
        let http = FirebaseError::http(StatusCode::FORBIDDEN, "https://x", "denied");
        assert!(SyncError::from(http).is_transient());
        assert!(SyncError::from(FirebaseError::Transport("timeout".into())).is_transient());
    }

    #[test]
    fn provider_errors_are_auth_failures() {
        let err = FirebaseError::Provider {
            message: "INVALID_PASSWORD".into(),
        };
        assert_eq!(
            SyncError::from(err),
            SyncError::AuthFailed {
                message: "INVALID_PASSWORD".into()
            }
        );
    }
}
