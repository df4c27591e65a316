use rolodex_api::{Contact, ContactFields};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::FirebaseError;

/// A typed Firestore value, e.g. `{"stringValue": "Alice"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirestoreValue {
    StringValue(String),
    /// int64 travels as a JSON string
    IntegerValue(serde_json::Value),
    DoubleValue(f64),
    BooleanValue(bool),
    NullValue(serde_json::Value),
    TimestampValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    ArrayValue(serde_json::Value),
    MapValue(serde_json::Value),
}

impl FirestoreValue {
    /// Render as a contact field; `None` for kinds a contact cannot hold.
    pub fn to_field_string(&self) -> Option<String> {
        match self {
            FirestoreValue::StringValue(s) => Some(s.clone()),
            FirestoreValue::IntegerValue(serde_json::Value::String(s)) => Some(s.clone()),
            FirestoreValue::IntegerValue(n) => Some(n.to_string()),
            FirestoreValue::DoubleValue(d) => Some(d.to_string()),
            FirestoreValue::BooleanValue(b) => Some(b.to_string()),
            FirestoreValue::NullValue(_) => Some(String::new()),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FirestoreValue::StringValue(_) => "stringValue",
            FirestoreValue::IntegerValue(_) => "integerValue",
            FirestoreValue::DoubleValue(_) => "doubleValue",
            FirestoreValue::BooleanValue(_) => "booleanValue",
            FirestoreValue::NullValue(_) => "nullValue",
            FirestoreValue::TimestampValue(_) => "timestampValue",
            FirestoreValue::BytesValue(_) => "bytesValue",
            FirestoreValue::ReferenceValue(_) => "referenceValue",
            FirestoreValue::GeoPointValue(_) => "geoPointValue",
            FirestoreValue::ArrayValue(_) => "arrayValue",
            FirestoreValue::MapValue(_) => "mapValue",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    /// Full resource name; the last path segment is the document id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FirestoreValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl FirestoreDocument {
    /// Request body for a write: string values only, no name.
    pub fn from_fields(fields: &ContactFields) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(key, value)| {
                    (
                        key.to_string(),
                        FirestoreValue::StringValue(value.to_string()),
                    )
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .filter(|id| !id.is_empty())
    }

    pub fn into_contact(self) -> Result<Contact, FirebaseError> {
        let id = self
            .document_id()
            .ok_or_else(|| FirebaseError::Decode("document without a name".to_string()))?
            .to_string();

        let mut fields = ContactFields::new();
        for (key, value) in self.fields {
            match value.to_field_string() {
                Some(text) => {
                    fields.insert(key, text);
                }
                None => warn!(
                    "[FirestoreDocument] Skipping field '{}' of '{}': unsupported {}",
                    key,
                    id,
                    value.kind()
                ),
            }
        }
        Ok(Contact::new(id, fields))
    }
}

/// Response of `GET .../{collection}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    /// Absent when the collection is empty
    #[serde(default)]
    pub documents: Vec<FirestoreDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error envelope: `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// `accounts:signInWithPassword` / `accounts:signUp` request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordAuthRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

/// `accounts:signInWithPassword` / `accounts:signUp` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordAuthResponse {
    pub local_id: String,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Token lifetime in seconds, as a decimal string
    pub expires_in: String,
}
