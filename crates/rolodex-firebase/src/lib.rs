//! Firebase adapters for rolodex
//!
//! - `client` - FirestoreClient (REST v1 HTTP client)
//! - `firestore_store` - FirestoreContactStore, the `RemoteStore` over Firestore
//! - `auth` - identity toolkit sign-in/sign-up and the authenticator that
//!   feeds the `AuthSessionMonitor`
//! - `models` - wire types for both APIs
//! - `config` - FirebaseConfig

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod firestore_store;
pub mod models;

pub use auth::{AuthSession, FirebaseAuthClient, FirebaseAuthenticator};
pub use client::FirestoreClient;
pub use config::FirebaseConfig;
pub use error::FirebaseError;
pub use firestore_store::FirestoreContactStore;
