use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated user handle.
///
/// `uid` is the stable user key that scopes the remote collection. The
/// optional `id_token` is the bearer credential remote adapters attach to
/// requests; it changes on refresh while `uid` stays the same.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            id_token: None,
        }
    }

    pub fn with_token(uid: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            id_token: Some(id_token.into()),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// Same user, regardless of credential.
    pub fn same_user(&self, other: &Identity) -> bool {
        self.uid == other.uid
    }
}

// Keep bearer tokens out of logs.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("uid", &self.uid)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let identity = Identity::with_token("alice", "secret-token");
        let printed = format!("{:?}", identity);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("secret-token"));
    }

    #[test]
    fn same_user_ignores_credential() {
        let a = Identity::with_token("alice", "t1");
        let b = Identity::with_token("alice", "t2");
        assert!(a.same_user(&b));
        assert_ne!(a, b);
        assert!(!a.same_user(&Identity::new("bob")));
    }
}
