use reqwest::StatusCode;
use tracing::{debug, error, info};

use crate::config::FirebaseConfig;
use crate::error::FirebaseError;
use crate::models::{FirestoreDocument, GoogleErrorResponse, ListDocumentsResponse};

type Result<T> = std::result::Result<T, FirebaseError>;

/// Firestore REST v1 client for the per-user contact collection.
#[derive(Clone)]
pub struct FirestoreClient {
    client: reqwest::Client,
    config: FirebaseConfig,
}

impl FirestoreClient {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        let client = http_client(&config)?;
        Ok(Self { client, config })
    }

    /// Fetch every document of the user's collection, following page tokens.
    pub async fn list_documents(
        &self,
        id_token: &str,
        uid: &str,
    ) -> Result<Vec<FirestoreDocument>> {
        let url = self.config.collection_url(uid)?;
        let page_size = self.config.page_size.to_string();
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut query = vec![("pageSize", page_size.clone())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(url.clone())
                .bearer_auth(id_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| transport_error(e, url.as_str(), "list documents"))?;
            let body = handle_response(response, url.as_str()).await?;
            let page: ListDocumentsResponse = serde_json::from_str(&body).map_err(|e| {
                FirebaseError::Decode(format!("list response from {}: {}", url, e))
            })?;

            pages += 1;
            documents.extend(page.documents);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            "[FirestoreClient] Listed {} documents for '{}' in {} pages",
            documents.len(),
            uid,
            pages
        );
        Ok(documents)
    }

    /// Create a document with a server-generated id.
    pub async fn create_document(
        &self,
        id_token: &str,
        uid: &str,
        document: &FirestoreDocument,
    ) -> Result<FirestoreDocument> {
        let url = self.config.collection_url(uid)?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(id_token)
            .json(document)
            .send()
            .await
            .map_err(|e| transport_error(e, url.as_str(), "create document"))?;
        let created = decode_document(
            handle_response(response, url.as_str()).await?,
            url.as_str(),
        )?;

        info!("[FirestoreClient] Created document {:?}", created.document_id());
        Ok(created)
    }

    /// Replace the fields of an existing document.
    ///
    /// The `currentDocument.exists` precondition makes a missing document
    /// fail with `NotFound` instead of being created.
    pub async fn patch_document(
        &self,
        id_token: &str,
        uid: &str,
        document_id: &str,
        document: &FirestoreDocument,
    ) -> Result<FirestoreDocument> {
        let url = self.config.document_url(uid, document_id)?;
        let response = self
            .client
            .patch(url.clone())
            .bearer_auth(id_token)
            .query(&[("currentDocument.exists", "true")])
            .json(document)
            .send()
            .await
            .map_err(|e| transport_error(e, url.as_str(), "update document"))?;
        decode_document(handle_response(response, url.as_str()).await?, url.as_str())
    }

    /// Delete a document. Missing documents count as deleted.
    pub async fn delete_document(
        &self,
        id_token: &str,
        uid: &str,
        document_id: &str,
    ) -> Result<()> {
        let deleted = match self.config.document_url(uid, document_id) {
            Ok(url) => {
                let response = self
                    .client
                    .delete(url.clone())
                    .bearer_auth(id_token)
                    .send()
                    .await
                    .map_err(|e| transport_error(e, url.as_str(), "delete document"))?;
                handle_response(response, url.as_str()).await
            }
            Err(e) => Err(e),
        };

        match deleted {
            Ok(_) => Ok(()),
            Err(FirebaseError::NotFound { path }) => {
                debug!("[FirestoreClient] {} already gone", path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn http_client(config: &FirebaseConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| FirebaseError::Config(format!("failed to create HTTP client: {}", e)))
}

/// Describe a reqwest failure with a hint about its cause.
pub(crate) fn transport_error(e: reqwest::Error, url: &str, operation: &str) -> FirebaseError {
    let message = if e.is_timeout() {
        format!(
            "Failed to {} for {}: timeout - request took too long (check network or increase timeout_secs)",
            operation, url
        )
    } else if e.is_connect() {
        format!(
            "Failed to {} for {}: connection error - check network connectivity and DNS. Error: {}",
            operation, url, e
        )
    } else if e.is_decode() {
        format!(
            "Failed to {} for {}: decode error - unexpected response format from server. Error: {}",
            operation, url, e
        )
    } else {
        format!("Failed to {} for {}: {}", operation, url, e)
    };
    error!("[FirestoreClient] {}", message);
    FirebaseError::Transport(message)
}

/// Read the body, turning non-success statuses into errors.
pub(crate) async fn handle_response(response: reqwest::Response, url: &str) -> Result<String> {
    let status = response.status();
    let response_text = response.text().await.map_err(|e| {
        FirebaseError::Transport(format!(
            "Failed to read response body from {}: {}",
            url, e
        ))
    })?;

    if status.is_success() {
        return Ok(response_text);
    }

    let message = serde_json::from_str::<GoogleErrorResponse>(&response_text)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| truncate(&response_text, 500));

    if status == StatusCode::NOT_FOUND {
        return Err(FirebaseError::NotFound {
            path: url.to_string(),
        });
    }
    Err(FirebaseError::http(status, url, message))
}

fn decode_document(body: String, url: &str) -> Result<FirestoreDocument> {
    serde_json::from_str(&body)
        .map_err(|e| FirebaseError::Decode(format!("document from {}: {}", url, e)))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}... (truncated)", cut)
    } else {
        text.to_string()
    }
}
