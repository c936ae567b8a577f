use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::DocumentFields;

pub const NAME_FIELD: &str = "name";
pub const PHONE_FIELD: &str = "phone";
pub const EMAIL_FIELD: &str = "email";

/// Store-assigned document identifier. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The three string fields every customer document carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl CustomerFields {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
        }
    }

    /// Missing or non-string values read as empty strings.
    pub fn from_document_fields(fields: &DocumentFields) -> Self {
        let read = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            name: read(NAME_FIELD),
            phone: read(PHONE_FIELD),
            email: read(EMAIL_FIELD),
        }
    }

    pub fn into_document_fields(self) -> DocumentFields {
        let mut fields = DocumentFields::new();
        fields.insert(NAME_FIELD.to_string(), Value::String(self.name));
        fields.insert(PHONE_FIELD.to_string(), Value::String(self.phone));
        fields.insert(EMAIL_FIELD.to_string(), Value::String(self.email));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl Record {
    pub fn new(id: RecordId, fields: CustomerFields) -> Self {
        Self {
            id,
            name: fields.name,
            phone: fields.phone,
            email: fields.email,
        }
    }

    pub fn fields(&self) -> CustomerFields {
        CustomerFields {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }
}
