//! Sleep sessions.
//!
//! A sleep record stores its stage timeline in `levels.data` and, for
//! stage-classified sessions, short wake episodes in `levels.shortData`.
//! Merging lays both on a 30 second grid where short episodes override the
//! stage they fall into.

use crate::metric::{ColumnSpec, MetricSpec};
use crate::normalize::{
    datetime_cells, datetime_columns, extract, extract_all, into_table, required_timestamp,
    sort_rows, spec_columns, KeyedRow,
};
use crate::query::DateRange;
use bson::{Bson, Document};
use chrono::{Duration, NaiveDateTime};
use lifesnaps_query::filter::lookup_path;
use lifesnaps_query::types::parse_timestamp;
use lifesnaps_query::{CellValue, Column, DataError, FieldType, Result, Table};
use std::collections::HashMap;

pub const LEVELS_DATA: &str = "data.levels.data";
pub const LEVELS_SHORT_DATA: &str = "data.levels.shortData";
pub const START_TIME: &str = "data.startTime";

pub const LEVEL_COL: &str = "level";
pub const SECONDS_COL: &str = "seconds";

pub const WAKE: &str = "wake";
pub const DEEP: &str = "deep";
pub const LIGHT: &str = "light";
pub const REM: &str = "rem";

/// Stage duration columns, in milliseconds
pub const STAGE_DURATION_COLUMNS: [(&str, &str); 4] = [
    (DEEP, "deepSleepDurationInMs"),
    (LIGHT, "lightSleepDurationInMs"),
    (REM, "remSleepInMs"),
    (WAKE, "awakeDurationInMs"),
];

const SLOT_SECONDS: i64 = 30;

/// Longest stage segment accepted from a record
pub const MAX_SEGMENT_SECONDS: i64 = 86_400;
/// Longest span, first stage start to last stage end, of one session
pub const MAX_SESSION_SECONDS: i64 = 2 * 86_400;

/// Number of leading summary columns placed before the datetime columns
const SUMMARY_LEAD_COLUMNS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepSegment {
    pub start: NaiveDateTime,
    pub level: String,
    pub seconds: i64,
}

impl SleepSegment {
    pub fn new(start: NaiveDateTime, level: impl Into<String>, seconds: i64) -> Self {
        Self {
            start,
            level: level.into(),
            seconds,
        }
    }

    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::seconds(self.seconds)
    }
}

/// Segments stored at `path`; `None` when the record has no such list
pub fn parse_segments(
    metric_name: &str,
    doc: &Document,
    path: &str,
) -> Result<Option<Vec<SleepSegment>>> {
    let items = match lookup_path(doc, path) {
        None | Some(Bson::Null) => return Ok(None),
        Some(Bson::Array(items)) => items,
        Some(other) => {
            return Err(DataError::schema(
                metric_name,
                path,
                format!("expected a list of segments, found {:?}", other.element_type()),
            ))
        }
    };

    let field_error = |field: &str| {
        DataError::schema(metric_name, format!("{}.{}", path, field), "missing or invalid")
    };

    items
        .iter()
        .map(|item| {
            let Bson::Document(segment) = item else {
                return Err(DataError::schema(metric_name, path, "segment is not a document"));
            };
            let start = segment
                .get("dateTime")
                .and_then(parse_timestamp)
                .ok_or_else(|| field_error("dateTime"))?;
            let level = segment
                .get_str("level")
                .map_err(|_| field_error("level"))?;
            let seconds = match CellValue::from_bson(
                segment.get("seconds").unwrap_or(&Bson::Null),
                FieldType::Int64,
            ) {
                Ok(CellValue::Int(seconds)) if (0..=MAX_SEGMENT_SECONDS).contains(&seconds) => {
                    seconds
                }
                _ => return Err(field_error("seconds")),
            };
            if start.checked_add_signed(Duration::seconds(seconds)).is_none() {
                return Err(field_error("dateTime"));
            }
            Ok(SleepSegment::new(start, level, seconds))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Merge short wake episodes into the stage timeline.
///
/// The session is split into 30 second slots from the earliest to the latest
/// covered instant. A slot takes the level of the latest stage segment
/// starting at or before it; a short episode turns `max(1, seconds / 30)`
/// slots starting at its own slot into `wake`. Runs of equal slots are then
/// collapsed back into segments.
pub fn merge_short_data(data: &[SleepSegment], short: &[SleepSegment]) -> Vec<SleepSegment> {
    if short.is_empty() || data.is_empty() {
        return data.to_vec();
    }

    let mut data: Vec<&SleepSegment> = data.iter().collect();
    data.sort_by_key(|segment| segment.start);

    let short_slots = |segment: &SleepSegment| (segment.seconds / SLOT_SECONDS).max(1);
    let short_end = |segment: &SleepSegment| {
        segment.start + Duration::seconds(short_slots(segment) * SLOT_SECONDS)
    };

    let first = data
        .iter()
        .map(|s| s.start)
        .chain(short.iter().map(|s| s.start))
        .min()
        .unwrap_or(data[0].start);
    let last = data
        .iter()
        .map(|s| s.end())
        .chain(short.iter().map(short_end))
        .max()
        .unwrap_or(first);

    let slot_count = ((last - first).num_seconds() / SLOT_SECONDS).max(0) as usize;
    let slot_start = |idx: usize| first + Duration::seconds(idx as i64 * SLOT_SECONDS);

    let mut levels: Vec<&str> = Vec::with_capacity(slot_count);
    let mut next = 0;
    let mut current = WAKE;
    for idx in 0..slot_count {
        let at = slot_start(idx);
        while next < data.len() && data[next].start <= at {
            current = data[next].level.as_str();
            next += 1;
        }
        levels.push(current);
    }

    for segment in short {
        let offset = ((segment.start - first).num_seconds() / SLOT_SECONDS) as usize;
        let count = short_slots(segment) as usize;
        for slot in levels.iter_mut().skip(offset).take(count) {
            *slot = WAKE;
        }
    }

    let mut merged: Vec<SleepSegment> = Vec::new();
    for (idx, level) in levels.into_iter().enumerate() {
        match merged.last_mut() {
            Some(segment) if segment.level == level => segment.seconds += SLOT_SECONDS,
            _ => merged.push(SleepSegment::new(slot_start(idx), level, SLOT_SECONDS)),
        }
    }
    merged
}

/// Stage timeline of one sleep record, merged with short data when asked
fn record_stages(
    metric_name: &str,
    doc: &Document,
    include_short_data: bool,
) -> Result<Option<Vec<SleepSegment>>> {
    let Some(data) = parse_segments(metric_name, doc, LEVELS_DATA)? else {
        return Ok(None);
    };
    if !include_short_data {
        return Ok(Some(data));
    }
    let short = parse_segments(metric_name, doc, LEVELS_SHORT_DATA)?.unwrap_or_default();
    check_session_span(metric_name, &data, &short)?;
    Ok(Some(merge_short_data(&data, &short)))
}

/// Merging allocates one slot per 30 seconds of the session, so a session
/// is bounded to [`MAX_SESSION_SECONDS`]
fn check_session_span(
    metric_name: &str,
    data: &[SleepSegment],
    short: &[SleepSegment],
) -> Result<()> {
    let segments = data.iter().chain(short);
    let first = segments.clone().map(|s| s.start).min();
    let last = segments.map(SleepSegment::end).max();

    if let (Some(first), Some(last)) = (first, last) {
        let span = (last - first).num_seconds();
        if span > MAX_SESSION_SECONDS {
            return Err(DataError::schema(
                metric_name,
                LEVELS_DATA,
                format!(
                    "session spans {} seconds, more than {}",
                    span, MAX_SESSION_SECONDS
                ),
            ));
        }
    }
    Ok(())
}

/// Milliseconds spent in each tracked stage; stages that never occur are 0
pub fn stage_durations_ms(stages: &[SleepSegment]) -> HashMap<&'static str, i64> {
    let mut durations: HashMap<&'static str, i64> =
        STAGE_DURATION_COLUMNS.iter().map(|(level, _)| (*level, 0)).collect();
    for segment in stages {
        if let Some(total) = durations.get_mut(segment.level.as_str()) {
            *total += segment.seconds * 1000;
        }
    }
    durations
}

fn summary_columns(specs: &[ColumnSpec]) -> Vec<Column> {
    let (lead, rest) = specs.split_at(SUMMARY_LEAD_COLUMNS.min(specs.len()));
    let mut columns = spec_columns(lead);
    columns.extend(datetime_columns());
    columns.extend(spec_columns(rest));
    columns.extend(
        STAGE_DURATION_COLUMNS
            .iter()
            .map(|(_, name)| Column::new(*name, FieldType::Int64)),
    );
    columns
}

/// One row per sleep record, keyed by its date of sleep
pub fn summary_table(
    spec: &MetricSpec,
    documents: &[Document],
    range: &DateRange,
) -> Result<Table> {
    let metric_name = spec.metric.name();
    let key_path = spec.time.start().unwrap_or("data.dateOfSleep");
    let (lead, rest) = spec
        .columns
        .split_at(SUMMARY_LEAD_COLUMNS.min(spec.columns.len()));

    let rows = documents
        .iter()
        .map(|doc| {
            let key = required_timestamp(spec.metric, doc, key_path)?;
            let start = required_timestamp(spec.metric, doc, START_TIME)?;

            let mut cells = extract_all(spec.metric, doc, lead)?;
            cells.extend(datetime_cells(start));
            cells.extend(extract_all(spec.metric, doc, rest)?);

            match record_stages(metric_name, doc, true)? {
                Some(stages) if !stages.is_empty() => {
                    let durations = stage_durations_ms(&stages);
                    cells.extend(STAGE_DURATION_COLUMNS.iter().map(|(level, _)| {
                        CellValue::Int(durations.get(level).copied().unwrap_or(0))
                    }));
                }
                _ => cells.extend(STAGE_DURATION_COLUMNS.iter().map(|_| CellValue::Missing)),
            }

            Ok(KeyedRow {
                key: Some(key),
                cells,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    into_table(summary_columns(spec.columns), sort_rows(rows, range))
}

/// One row per stage segment of every matching sleep record
pub fn stage_table(
    spec: &MetricSpec,
    documents: &[Document],
    range: &DateRange,
    include_short_data: bool,
) -> Result<Table> {
    let metric_name = spec.metric.name();

    let mut columns = spec_columns(spec.columns);
    columns.push(Column::new(LEVEL_COL, FieldType::String));
    columns.push(Column::new(SECONDS_COL, FieldType::Int64));
    columns.extend(datetime_columns());

    let mut rows = Vec::new();
    for doc in documents {
        if let Some(path) = spec.time.start() {
            required_timestamp(spec.metric, doc, path)?;
        }
        let lead: Vec<CellValue> = spec
            .columns
            .iter()
            .map(|column| extract(spec.metric, doc, column))
            .collect::<Result<_>>()?;

        for segment in record_stages(metric_name, doc, include_short_data)?.unwrap_or_default() {
            let mut cells = lead.clone();
            cells.push(CellValue::Text(segment.level.clone()));
            cells.push(CellValue::Int(segment.seconds));
            cells.extend(datetime_cells(segment.start));
            rows.push(KeyedRow {
                key: Some(segment.start),
                cells,
            });
        }
    }

    into_table(columns, sort_rows(rows, range))
}
