use crate::error::{DataError, Result};
use bson::Bson;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Column data types of a normalized table
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Boolean true/false
    Boolean,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point
    Float64,
    /// UTF-8 string
    String,
    /// Calendar date
    Date,
    /// Naive (UTC) date and time
    Timestamp,
    /// Nested document kept verbatim
    Json,
    /// List of floating point values
    FloatList,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Int64 => write!(f, "int64"),
            FieldType::Float64 => write!(f, "float64"),
            FieldType::String => write!(f, "string"),
            FieldType::Date => write!(f, "date"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Json => write!(f, "json"),
            FieldType::FloatList => write!(f, "float-list"),
        }
    }
}

/// A single typed cell of a normalized table.
///
/// `Missing` is the marker for fields absent from a record; it serializes
/// as JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    FloatList(Vec<f64>),
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Timestamp view of the cell; dates are taken at midnight
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Timestamp(ts) => Some(*ts),
            CellValue::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }

    /// Coerce a BSON value into a cell of the declared type.
    ///
    /// Null values and empty strings become `Missing`. The error string
    /// describes the mismatch and is wrapped by the caller with the metric
    /// and column names.
    pub fn from_bson(value: &Bson, field_type: FieldType) -> std::result::Result<Self, String> {
        match value {
            Bson::Null | Bson::Undefined => return Ok(CellValue::Missing),
            Bson::String(s) if s.trim().is_empty() => return Ok(CellValue::Missing),
            _ => {}
        }

        match field_type {
            FieldType::Boolean => match value {
                Bson::Boolean(b) => Ok(CellValue::Bool(*b)),
                Bson::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(CellValue::Bool(true)),
                    "false" => Ok(CellValue::Bool(false)),
                    _ => Err(format!("expected boolean, found '{}'", s)),
                },
                other => Err(mismatch(field_type, other)),
            },
            FieldType::Int64 => match value {
                Bson::Int32(v) => Ok(CellValue::Int(i64::from(*v))),
                Bson::Int64(v) => Ok(CellValue::Int(*v)),
                Bson::Double(v) if v.is_finite() && v.fract() == 0.0 => {
                    Ok(CellValue::Int(*v as i64))
                }
                Bson::String(s) => parse_int(s)
                    .map(CellValue::Int)
                    .ok_or_else(|| format!("expected integer, found '{}'", s)),
                other => Err(mismatch(field_type, other)),
            },
            FieldType::Float64 => bson_to_f64(value)
                .map(CellValue::Float)
                .ok_or_else(|| mismatch(field_type, value)),
            FieldType::String => match value {
                Bson::String(s) => Ok(CellValue::Text(s.clone())),
                Bson::Int32(v) => Ok(CellValue::Text(v.to_string())),
                Bson::Int64(v) => Ok(CellValue::Text(v.to_string())),
                Bson::Double(v) => Ok(CellValue::Text(v.to_string())),
                Bson::Boolean(b) => Ok(CellValue::Text(b.to_string())),
                Bson::ObjectId(oid) => Ok(CellValue::Text(oid.to_hex())),
                Bson::DateTime(_) => parse_timestamp(value)
                    .map(|ts| CellValue::Text(format_timestamp(&ts)))
                    .ok_or_else(|| mismatch(field_type, value)),
                other => Err(mismatch(field_type, other)),
            },
            FieldType::Date => parse_timestamp(value)
                .map(|ts| CellValue::Date(ts.date()))
                .ok_or_else(|| mismatch(field_type, value)),
            FieldType::Timestamp => parse_timestamp(value)
                .map(CellValue::Timestamp)
                .ok_or_else(|| mismatch(field_type, value)),
            FieldType::Json => Ok(CellValue::Json(bson_to_json(value))),
            FieldType::FloatList => match value {
                Bson::Array(items) => items
                    .iter()
                    .map(bson_to_f64)
                    .collect::<Option<Vec<f64>>>()
                    .map(CellValue::FloatList)
                    .ok_or_else(|| "array contains non-numeric values".to_string()),
                Bson::String(s) => parse_float_list(s)
                    .map(CellValue::FloatList)
                    .ok_or_else(|| format!("expected list of numbers, found '{}'", s)),
                other => Err(mismatch(field_type, other)),
            },
        }
    }

    /// JSON representation used when serializing tables
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Missing => serde_json::Value::Null,
            CellValue::Bool(b) => serde_json::json!(b),
            CellValue::Int(v) => serde_json::json!(v),
            CellValue::Float(v) => serde_json::json!(v),
            CellValue::Text(s) => serde_json::json!(s),
            CellValue::Date(d) => serde_json::json!(d.format("%Y-%m-%d").to_string()),
            CellValue::Timestamp(ts) => serde_json::json!(format_timestamp(ts)),
            CellValue::Json(v) => v.clone(),
            CellValue::FloatList(v) => serde_json::json!(v),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => write!(f, ""),
            CellValue::Text(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// JSON view of a nested value. Date-times are rendered like timestamp
/// cells; everything else follows relaxed extended JSON.
pub fn bson_to_json(value: &Bson) -> serde_json::Value {
    match value {
        Bson::DateTime(_) => match parse_timestamp(value) {
            Some(ts) => serde_json::Value::String(format_timestamp(&ts)),
            None => value.clone().into_relaxed_extjson(),
        },
        Bson::Document(doc) => serde_json::Value::Object(
            doc.iter()
                .map(|(key, inner)| (key.clone(), bson_to_json(inner)))
                .collect(),
        ),
        Bson::Array(items) => serde_json::Value::Array(items.iter().map(bson_to_json).collect()),
        other => other.clone().into_relaxed_extjson(),
    }
}

fn mismatch(expected: FieldType, found: &Bson) -> String {
    format!("expected {}, found {:?}", expected, found.element_type())
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// Numeric view of a BSON value, accepting numeric strings
pub fn bson_to_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        Bson::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse a list of floats stored as text.
///
/// Accepts both `[1.0, 2.5]` and whitespace separated `1.0  2.5`.
pub fn parse_float_list(s: &str) -> Option<Vec<f64>> {
    let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%y", "%m/%d/%Y"];

/// Parse a timestamp stored as a BSON date-time or as a string.
///
/// Offsets are folded into UTC; naive values are taken as UTC.
pub fn parse_timestamp(value: &Bson) -> Option<NaiveDateTime> {
    match value {
        Bson::DateTime(dt) => {
            DateTime::from_timestamp_millis(dt.timestamp_millis()).map(|d| d.naive_utc())
        }
        Bson::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// String form of [`parse_timestamp`]
pub fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Render a timestamp as ISO-8601 with millisecond precision
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Convert a naive (UTC) timestamp into a BSON date-time
pub fn to_bson_datetime(ts: NaiveDateTime) -> Bson {
    Bson::DateTime(bson::DateTime::from_millis(ts.and_utc().timestamp_millis()))
}

/// Definition of a single column in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
}

impl Column {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Flat, row-oriented table with typed columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row; its width must match the column count
    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DataError::schema(
                "table",
                "*",
                format!(
                    "row has {} cells but table has {} columns",
                    row.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell at `row` in the named column
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All cells of the named column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, cell)| (col.name.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }
}
