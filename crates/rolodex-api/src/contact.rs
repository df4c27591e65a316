use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field key the view layer uses as the display name.
pub const NAME_FIELD: &str = "name";

/// Identifier assigned by the remote store when a contact is created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ContactId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Schemaless attribute set of a contact.
///
/// Any string key is accepted and every value is kept verbatim; the store
/// never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactFields(BTreeMap<String, String>);

impl ContactFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_FIELD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `key=value` pairs as typed on a command line.
    ///
    /// Returns the offending token if it has no `=` or an empty key.
    pub fn parse_pairs<'a, I>(pairs: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fields = Self::new();
        for pair in pairs {
            match pair.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    fields.insert(key.trim(), value);
                }
                _ => return Err(pair.to_string()),
            }
        }
        Ok(fields)
    }
}

/// A contact as held in the local list: store-assigned id plus its fields.
///
/// Serialized flat, e.g. `{"id":"a","name":"Alice"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(flatten)]
    pub fields: ContactFields,
}

impl Contact {
    pub fn new(id: impl Into<ContactId>, fields: ContactFields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.name()
    }

    /// Display name with a fallback to the id for unnamed contacts.
    pub fn display_name(&self) -> &str {
        self.fields.name().unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_serializes_flat() {
        let contact = Contact::new(
            "a",
            ContactFields::new()
                .with("name", "Alice")
                .with("phone", "+2348123456789"),
        );

        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "a", "name": "Alice", "phone": "+2348123456789"})
        );

        let parsed: Contact = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, contact);
    }

    #[test]
    fn parse_pairs_keeps_values_verbatim() {
        let fields =
            ContactFields::parse_pairs(["name=Bob Smith", "note=a=b", "email="]).unwrap();
        assert_eq!(fields.name(), Some("Bob Smith"));
        assert_eq!(fields.get("note"), Some("a=b"));
        assert_eq!(fields.get("email"), Some(""));
    }

    #[test]
    fn parse_pairs_rejects_tokens_without_key() {
        assert_eq!(
            ContactFields::parse_pairs(["name=Bob", "oops"]),
            Err("oops".to_string())
        );
        assert_eq!(
            ContactFields::parse_pairs(["=value"]),
            Err("=value".to_string())
        );
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let contact = Contact::new("x1", ContactFields::new().with("phone", "0812"));
        assert_eq!(contact.display_name(), "x1");
    }
}
