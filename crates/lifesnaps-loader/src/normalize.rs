//! Record flattening.
//!
//! Documents are turned into rows through the metric's schema map, keyed by
//! the timestamp they are range-checked and ordered by, then collected into
//! a [`Table`].

use crate::metric::{
    ColumnSpec, Metric, MetricSpec, Shape, DEFAULT_ECG_SAMPLE_RATE, ECG_SAMPLE_RATE, ECG_WAVEFORM,
    HRV_HISTOGRAM_BUCKETS, RESTING_HEART_RATE_DATE,
};
use crate::query::DateRange;
use crate::sleep;
use bson::{Bson, Document};
use chrono::{Duration, NaiveDateTime};
use lifesnaps_query::filter::lookup_path;
use lifesnaps_query::types::parse_timestamp;
use lifesnaps_query::{CellValue, Column, DataError, FieldType, Result, Table};
use tracing::debug;

pub const TIMEZONE_OFFSET_COL: &str = "timezoneOffsetInMs";
pub const UNIX_TIMESTAMP_COL: &str = "unixTimestampInMs";
pub const ISO_DATE_COL: &str = "isoDate";

pub const STEPS_COL: &str = "steps";
pub const TOTAL_STEPS_COL: &str = "totalSteps";
pub const BUCKET_VALUE_COL: &str = "bucketValue";
pub const BUCKET_WIDTH_COL: &str = "bucketWidth";
pub const CALENDAR_DATE_COL: &str = "calendarDate";
pub const SAMPLE_VALUE_COL: &str = "sampleValue";

const BUCKET_WIDTH_START: f64 = 0.3;
const BUCKET_WIDTH_STEP: f64 = 0.05;

/// Options that change how records are reshaped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Merge short wake episodes into sleep stages
    pub include_short_sleep_data: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            include_short_sleep_data: true,
        }
    }
}

/// A row and the timestamp it is ordered and range-checked by
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRow {
    pub key: Option<NaiveDateTime>,
    pub cells: Vec<CellValue>,
}

/// Leading columns of every timed table
pub fn datetime_columns() -> Vec<Column> {
    vec![
        Column::new(TIMEZONE_OFFSET_COL, FieldType::Int64),
        Column::new(UNIX_TIMESTAMP_COL, FieldType::Int64),
        Column::new(ISO_DATE_COL, FieldType::Timestamp),
    ]
}

/// Cells of the leading datetime columns; timestamps are UTC so the offset
/// is always zero
pub fn datetime_cells(ts: NaiveDateTime) -> Vec<CellValue> {
    vec![
        CellValue::Int(0),
        CellValue::Int(ts.and_utc().timestamp_millis()),
        CellValue::Timestamp(ts),
    ]
}

pub fn spec_columns(specs: &[ColumnSpec]) -> Vec<Column> {
    specs
        .iter()
        .map(|spec| Column::new(spec.name, spec.field_type))
        .collect()
}

/// Typed cell for one schema entry; absent fields are `Missing`
pub fn extract(metric: Metric, doc: &Document, spec: &ColumnSpec) -> Result<CellValue> {
    match lookup_path(doc, spec.path) {
        None => Ok(CellValue::Missing),
        Some(value) => CellValue::from_bson(value, spec.field_type)
            .map_err(|reason| DataError::schema(metric.name(), spec.name, reason)),
    }
}

pub fn extract_all(metric: Metric, doc: &Document, specs: &[ColumnSpec]) -> Result<Vec<CellValue>> {
    specs.iter().map(|spec| extract(metric, doc, spec)).collect()
}

/// Timestamp a record cannot do without
pub fn required_timestamp(metric: Metric, doc: &Document, path: &str) -> Result<NaiveDateTime> {
    let value = lookup_path(doc, path)
        .filter(|value| !matches!(value, Bson::Null))
        .ok_or_else(|| DataError::schema(metric.name(), path, "timestamp is missing"))?;

    parse_timestamp(value).ok_or_else(|| {
        DataError::schema(
            metric.name(),
            path,
            format!("unparseable timestamp {}", value),
        )
    })
}

/// Drop rows outside the range, then order by key. The sort is stable so
/// ties keep store order.
pub fn sort_rows(mut rows: Vec<KeyedRow>, range: &DateRange) -> Vec<KeyedRow> {
    let before = rows.len();
    rows.retain(|row| row.key.map_or(true, |key| range.contains(key)));
    if rows.len() != before {
        debug!("Dropped {} rows outside {}", before - rows.len(), range);
    }
    rows.sort_by_key(|row| row.key);
    rows
}

pub fn into_table(columns: Vec<Column>, rows: Vec<KeyedRow>) -> Result<Table> {
    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.cells)?;
    }
    Ok(table)
}

/// Normalize the documents returned for a metric into a table
pub fn normalize(
    spec: &MetricSpec,
    documents: &[Document],
    range: &DateRange,
    options: &LoadOptions,
) -> Result<Table> {
    match spec.shape {
        Shape::Records => records(spec, documents, range),
        Shape::RestingHeartRate => {
            let dated: Vec<Document> = documents
                .iter()
                .filter(|doc| has_value(doc, RESTING_HEART_RATE_DATE))
                .cloned()
                .collect();
            if dated.len() != documents.len() {
                debug!(
                    "Skipped {} resting heart rate records without an estimate date",
                    documents.len() - dated.len()
                );
            }
            records(spec, &dated, range)
        }
        Shape::Steps => steps(spec, documents, range),
        Shape::HrvHistogram => hrv_histogram(spec, documents, range),
        Shape::Ecg => ecg(spec, documents, range),
        Shape::SleepSummary => sleep::summary_table(spec, documents, range),
        Shape::SleepStages => {
            sleep::stage_table(spec, documents, range, options.include_short_sleep_data)
        }
    }
}

fn has_value(doc: &Document, path: &str) -> bool {
    match lookup_path(doc, path) {
        None | Some(Bson::Null) => false,
        Some(Bson::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn record_key(spec: &MetricSpec, doc: &Document) -> Result<Option<NaiveDateTime>> {
    spec.time
        .start()
        .map(|path| required_timestamp(spec.metric, doc, path))
        .transpose()
}

fn records(spec: &MetricSpec, documents: &[Document], range: &DateRange) -> Result<Table> {
    let mut columns = if spec.time.is_timed() {
        datetime_columns()
    } else {
        Vec::new()
    };
    columns.extend(spec_columns(spec.columns));

    let rows = documents
        .iter()
        .map(|doc| {
            let key = record_key(spec, doc)?;
            let mut cells = key.map(datetime_cells).unwrap_or_default();
            cells.extend(extract_all(spec.metric, doc, spec.columns)?);
            Ok(KeyedRow { key, cells })
        })
        .collect::<Result<Vec<_>>>()?;

    into_table(columns, sort_rows(rows, range))
}

/// Step counts with a running total per calendar day
fn steps(spec: &MetricSpec, documents: &[Document], range: &DateRange) -> Result<Table> {
    let mut columns = datetime_columns();
    columns.extend(spec_columns(spec.columns));
    columns.push(Column::new(TOTAL_STEPS_COL, FieldType::Int64));

    let rows = documents
        .iter()
        .map(|doc| {
            let key = record_key(spec, doc)?;
            let mut cells = key.map(datetime_cells).unwrap_or_default();
            cells.extend(extract_all(spec.metric, doc, spec.columns)?);
            Ok(KeyedRow { key, cells })
        })
        .collect::<Result<Vec<_>>>()?;

    let steps_idx = columns.len() - 2;
    let mut current_day = None;
    let mut total = 0i64;
    let rows = sort_rows(rows, range)
        .into_iter()
        .map(|mut row| {
            let day = row.key.map(|ts| ts.date());
            if day != current_day {
                current_day = day;
                total = 0;
            }
            total += row.cells[steps_idx].as_i64().unwrap_or(0);
            row.cells.push(CellValue::Int(total));
            row
        })
        .collect();

    into_table(columns, rows)
}

/// One row per histogram bucket
fn hrv_histogram(spec: &MetricSpec, documents: &[Document], range: &DateRange) -> Result<Table> {
    let mut columns = datetime_columns();
    columns.extend([
        Column::new(BUCKET_VALUE_COL, FieldType::Float64),
        Column::new(BUCKET_WIDTH_COL, FieldType::Float64),
        Column::new(CALENDAR_DATE_COL, FieldType::Date),
    ]);
    columns.extend(spec_columns(spec.columns));

    let mut rows = Vec::new();
    for doc in documents {
        let Some(ts) = record_key(spec, doc)? else {
            continue;
        };
        let buckets = float_list(spec.metric, doc, HRV_HISTOGRAM_BUCKETS, "bucket_values")?;
        let extra = extract_all(spec.metric, doc, spec.columns)?;

        for (idx, value) in buckets.into_iter().enumerate() {
            let mut cells = datetime_cells(ts);
            cells.push(CellValue::Float(value));
            cells.push(CellValue::Float(
                BUCKET_WIDTH_START + BUCKET_WIDTH_STEP * idx as f64,
            ));
            cells.push(CellValue::Date(ts.date()));
            cells.extend(extra.iter().cloned());
            rows.push(KeyedRow {
                key: Some(ts),
                cells,
            });
        }
    }

    into_table(columns, sort_rows(rows, range))
}

/// One row per waveform sample, each stamped with its own offset from the
/// reading time
fn ecg(spec: &MetricSpec, documents: &[Document], range: &DateRange) -> Result<Table> {
    let mut columns = datetime_columns();
    columns.push(Column::new(SAMPLE_VALUE_COL, FieldType::Float64));
    columns.extend(spec_columns(spec.columns));

    let rate_spec = spec
        .columns
        .iter()
        .find(|c| c.path == ECG_SAMPLE_RATE)
        .copied();

    let mut rows = Vec::new();
    for doc in documents {
        let Some(reading_time) = record_key(spec, doc)? else {
            continue;
        };
        let samples = float_list(spec.metric, doc, ECG_WAVEFORM, "waveform_samples")?;
        let extra = extract_all(spec.metric, doc, spec.columns)?;

        let sample_rate = match rate_spec {
            Some(rate_spec) => extract(spec.metric, doc, &rate_spec)?
                .as_i64()
                .filter(|rate| *rate > 0)
                .unwrap_or(DEFAULT_ECG_SAMPLE_RATE),
            None => DEFAULT_ECG_SAMPLE_RATE,
        };

        for (idx, sample) in samples.into_iter().enumerate() {
            let offset = Duration::microseconds(idx as i64 * 1_000_000 / sample_rate);
            let ts = reading_time + offset;
            let mut cells = datetime_cells(ts);
            cells.push(CellValue::Float(sample));
            cells.extend(extra.iter().cloned());
            rows.push(KeyedRow { key: Some(ts), cells });
        }
    }

    into_table(columns, sort_rows(rows, range))
}

/// Numeric list stored either as an array or as text; absent lists are empty
fn float_list(metric: Metric, doc: &Document, path: &str, column: &str) -> Result<Vec<f64>> {
    let Some(value) = lookup_path(doc, path) else {
        return Ok(Vec::new());
    };
    match CellValue::from_bson(value, FieldType::FloatList) {
        Ok(CellValue::FloatList(values)) => Ok(values),
        Ok(_) => Ok(Vec::new()),
        Err(reason) => Err(DataError::schema(metric.name(), column, reason)),
    }
}
