//! # Documents
//!
//! A [`Document`] is the opaque unit the engine moves around: a collection name, a stable
//! [`DocumentId`] and a JSON object of named fields. The engine never reaches into storage
//! internals; it only reads and writes documents through the [`Storage`](crate::store::Storage)
//! collaborator.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt::{self, Display};

/// Field map of a document (everything except its id).
pub type Fields = serde_json::Map<String, Value>;

/// Name of the per-member flag maintained by the primary invariant.
pub const PRIMARY_FIELD: &str = "primary";

/// Name of the exported id field.
pub const ID_FIELD: &str = "id";

/// Stable identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generates a fresh random id (32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads an id out of a JSON value; only strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(Self::from)
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A stored document as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub collection: String,
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn new(collection: impl Into<String>, id: DocumentId, fields: Fields) -> Self {
        Self {
            collection: collection.into(),
            id,
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Whether the document carries `primary: true`.
    pub fn is_primary(&self) -> bool {
        self.fields
            .get(PRIMARY_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Reads an ordered list of child ids stored in `field`.
    ///
    /// A missing field, a non-array value and non-string entries all read as absent.
    pub fn id_list(&self, field: &str) -> Vec<DocumentId> {
        match self.fields.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(DocumentId::from_value).collect(),
            _ => Vec::new(),
        }
    }

    /// Removes the listed fields from the document.
    pub fn strip(&mut self, fields: &[String]) {
        for field in fields {
            self.fields.remove(field);
        }
    }

    /// Exported JSON form: `id` followed by every field.
    pub fn export(&self) -> Value {
        let mut object = Fields::new();
        object.insert(ID_FIELD.to_string(), self.id.to_value());
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Sort order between JSON values of possibly different types.
///
/// null < numbers < strings < objects < arrays < booleans, matching the ordering
/// document stores conventionally apply to mixed-type columns.
pub fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Object(_) => 3,
            Value::Array(_) => 4,
            Value::Bool(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
