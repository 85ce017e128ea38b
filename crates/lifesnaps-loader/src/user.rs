use bson::{oid::ObjectId, Bson};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of a data subject.
///
/// Keeps the value exactly as stored (object id, string or number) so
/// filters match the stored representation. Display uses its string form;
/// equality and ordering use the string form and then the stored type, so
/// `"7"` and `7` are two identifiers.
#[derive(Debug, Clone)]
pub struct UserId {
    raw: Bson,
    key: String,
}

impl UserId {
    pub fn new(raw: Bson) -> Self {
        let key = match &raw {
            Bson::String(s) => s.clone(),
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::Int32(v) => v.to_string(),
            Bson::Int64(v) => v.to_string(),
            other => other.clone().into_relaxed_extjson().to_string(),
        };
        Self { raw, key }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Same string form, whatever the stored type
    pub fn same_key(&self, other: &UserId) -> bool {
        self.key == other.key
    }

    fn element_type(&self) -> u8 {
        self.raw.element_type() as u8
    }

    /// Value as stored in the database
    pub fn raw(&self) -> &Bson {
        &self.raw
    }
}

impl PartialEq for UserId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.element_type() == other.element_type()
    }
}

impl Eq for UserId {}

impl Hash for UserId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.element_type().hash(state);
    }
}

impl PartialOrd for UserId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UserId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.element_type().cmp(&other.element_type()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key)
    }
}

impl From<Bson> for UserId {
    fn from(raw: Bson) -> Self {
        Self::new(raw)
    }
}

impl From<ObjectId> for UserId {
    fn from(oid: ObjectId) -> Self {
        Self::new(Bson::ObjectId(oid))
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(Bson::String(s.to_string()))
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self::new(Bson::String(s))
    }
}

impl From<&UserId> for UserId {
    fn from(user: &UserId) -> Self {
        user.clone()
    }
}
