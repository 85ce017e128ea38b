//! Store-agnostic filter expressions.
//!
//! A [`Filter`] is a conjunction of field/operator/value triples. Backends
//! either translate it (`to_document` for MongoDB) or evaluate it directly
//! (`matches`, used by the in-memory store).

use crate::types::{bson_to_f64, parse_timestamp};
use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators supported in filter conditions
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field presence; the condition value is a boolean
    Exists,
}

impl Operator {
    /// MongoDB query operator
    pub fn as_mongo(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Exists => "$exists",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_mongo())
    }
}

/// A single `field <op> value` triple; `field` may be a dotted path
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: Bson,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Ne, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Lt, value)
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, Operator::Exists, true)
    }

    pub fn to_document(&self) -> Document {
        let mut inner = Document::new();
        inner.insert(self.op.as_mongo(), self.value.clone());
        let mut outer = Document::new();
        outer.insert(self.field.clone(), inner);
        outer
    }

    /// Evaluate the condition against a document with MongoDB semantics
    pub fn matches(&self, doc: &Document) -> bool {
        let actual = lookup_path(doc, &self.field);
        match self.op {
            Operator::Exists => actual.is_some() == self.value.as_bool().unwrap_or(true),
            Operator::Eq => actual.map_or(self.value == Bson::Null, |v| bson_eq(v, &self.value)),
            Operator::Ne => !actual.map_or(self.value == Bson::Null, |v| bson_eq(v, &self.value)),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let Some(ordering) = actual.and_then(|v| compare_bson(v, &self.value)) else {
                    return false;
                };
                match self.op {
                    Operator::Gt => ordering == Ordering::Greater,
                    Operator::Gte => ordering != Ordering::Less,
                    Operator::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            }
        }
    }
}

/// Conjunction of conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// MongoDB query document; the empty filter matches everything
    pub fn to_document(&self) -> Document {
        match self.conditions.as_slice() {
            [] => Document::new(),
            [single] => single.to_document(),
            many => {
                let clauses: Vec<Bson> = many
                    .iter()
                    .map(|c| Bson::Document(c.to_document()))
                    .collect();
                doc! { "$and": clauses }
            }
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }

    /// Split into conditions that satisfy `pred` and those that don't
    pub fn partition(&self, pred: impl Fn(&Condition) -> bool) -> (Filter, Filter) {
        let (yes, no): (Vec<_>, Vec<_>) = self.conditions.iter().cloned().partition(|c| pred(c));
        (Filter { conditions: yes }, Filter { conditions: no })
    }
}

/// Read request against one collection.
///
/// `date_fields` lists the paths that hold stored timestamps; backends
/// convert them to date-times before the filter is applied, and a value
/// that cannot be converted becomes null.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub filter: Filter,
    pub date_fields: Vec<String>,
}

impl DocumentQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::new(),
            date_fields: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_date_field(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.date_fields.contains(&path) {
            self.date_fields.push(path);
        }
        self
    }

    pub fn is_date_field(&self, path: &str) -> bool {
        self.date_fields.iter().any(|f| f == path)
    }
}

/// Resolve a dotted path inside a document
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Replace the value at a dotted path; parents must already exist
pub fn set_path(doc: &mut Document, path: &str, value: Bson) -> bool {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            true
        }
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(inner)) => set_path(inner, rest, value),
            _ => false,
        },
    }
}

/// Order two BSON values of comparable kinds
pub fn compare_bson(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::DateTime(_), Bson::String(_)) | (Bson::String(_), Bson::DateTime(_)) => None,
        _ => {
            let is_number =
                |v: &Bson| matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_));
            if is_number(a) && is_number(b) {
                bson_to_f64(a)?.partial_cmp(&bson_to_f64(b)?)
            } else {
                None
            }
        }
    }
}

/// Equality with numeric types compared by value
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
    a == b || compare_bson(a, b) == Some(Ordering::Equal)
}

/// Convert every date field of a copy of `doc` to a BSON date-time.
///
/// Unparseable values become null; absent fields stay absent.
pub fn convert_date_fields(doc: &Document, date_fields: &[String]) -> Document {
    let mut converted = doc.clone();
    for path in date_fields {
        let Some(current) = lookup_path(doc, path) else {
            continue;
        };
        let value = match parse_timestamp(current) {
            Some(ts) => crate::types::to_bson_datetime(ts),
            None => Bson::Null,
        };
        set_path(&mut converted, path, value);
    }
    converted
}
