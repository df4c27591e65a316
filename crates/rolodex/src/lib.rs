pub mod auth;
pub mod config;
pub mod store;
pub mod sync;

pub use auth::{AuthSessionMonitor, IdentityEvent, IdentityStream, Subscription};
pub use config::SyncConfig;
pub use store::{MemoryContactStore, RemoteStore, RetryPolicy};
pub use sync::{ContactSyncController, Favorites};

pub use rolodex_api::{
    Contact, ContactFields, ContactId, ContactsSnapshot, Identity, SessionPhase, SkipReason,
    SyncError, SyncOutcome,
};
