use async_trait::async_trait;
use rolodex::RemoteStore;
use rolodex_api::{Contact, ContactFields, ContactId, Identity, Result, SyncError};
use tracing::debug;

use crate::client::FirestoreClient;
use crate::config::FirebaseConfig;
use crate::error::FirebaseError;
use crate::models::FirestoreDocument;

/// `RemoteStore` backed by `users/{uid}/{collection}` in Firestore.
///
/// Requests authenticate with the identity's id token.
pub struct FirestoreContactStore {
    client: FirestoreClient,
}

impl FirestoreContactStore {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: FirestoreClient::new(config)?,
        })
    }

    fn token(identity: &Identity) -> Result<&str> {
        identity
            .id_token()
            .ok_or_else(|| FirebaseError::MissingCredential.into())
    }
}

#[async_trait]
impl RemoteStore for FirestoreContactStore {
    fn store_name(&self) -> &str {
        "firestore"
    }

    async fn list(&self, identity: &Identity) -> Result<Vec<Contact>> {
        let token = Self::token(identity)?;
        let documents = self.client.list_documents(token, identity.uid()).await?;
        documents
            .into_iter()
            .map(|document| document.into_contact().map_err(SyncError::from))
            .collect()
    }

    async fn create(&self, identity: &Identity, fields: ContactFields) -> Result<Contact> {
        let token = Self::token(identity)?;
        let body = FirestoreDocument::from_fields(&fields);
        let created = self
            .client
            .create_document(token, identity.uid(), &body)
            .await?;
        Ok(created.into_contact()?)
    }

    async fn update(
        &self,
        identity: &Identity,
        id: &ContactId,
        fields: ContactFields,
    ) -> Result<Contact> {
        let token = Self::token(identity)?;
        let body = FirestoreDocument::from_fields(&fields);
        let updated = self
            .client
            .patch_document(token, identity.uid(), id.as_str(), &body)
            .await
            .map_err(|e| match e {
                FirebaseError::NotFound { .. } => SyncError::ContactNotFound { id: id.to_string() },
                other => other.into(),
            })?;
        Ok(updated.into_contact()?)
    }

    async fn delete(&self, identity: &Identity, id: &ContactId) -> Result<()> {
        let token = Self::token(identity)?;
        self.client
            .delete_document(token, identity.uid(), id.as_str())
            .await?;
        debug!("[FirestoreContactStore] Deleted '{}'", id);
        Ok(())
    }
}
