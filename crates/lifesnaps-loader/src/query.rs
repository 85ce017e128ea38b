//! Date ranges and filter construction.

use crate::metric::{MetricSpec, TYPE_KEY};
use crate::user::UserId;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lifesnaps_query::types::{parse_timestamp_str, to_bson_datetime};
use lifesnaps_query::{Condition, DataError, DocumentQuery, Filter, Result};
use std::fmt;

/// Optional calendar-day bounds, both inclusive.
///
/// At millisecond level the range is `[start 00:00, (end + 1 day) 00:00)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    /// Fails with `InvalidDateRange` when `start` is after `end`
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(DataError::InvalidDateRange { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(Some(start), Some(end))
    }

    /// No bounds
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse loose date inputs such as `2021-05-24`, `2021/05/24` or
    /// `2021-05-24T10:00:00`; the time of day is dropped
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        Self::new(start.map(parse_date).transpose()?, end.map(parse_date).transpose()?)
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Inclusive lower bound
    pub fn lower_bound(&self) -> Option<NaiveDateTime> {
        self.start.map(|d| d.and_time(NaiveTime::MIN))
    }

    /// Exclusive upper bound, midnight after the end date
    pub fn upper_bound(&self) -> Option<NaiveDateTime> {
        self.end
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN))
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.lower_bound().map_or(true, |lower| ts >= lower)
            && self.upper_bound().map_or(true, |upper| ts < upper)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |d: Option<NaiveDate>| d.map_or_else(|| "..".to_string(), |d| d.to_string());
        write!(f, "[{}, {}]", bound(self.start), bound(self.end))
    }
}

/// Parse a single date input
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    parse_timestamp_str(input)
        .map(|ts| ts.date())
        .ok_or_else(|| DataError::InvalidDate(input.to_string()))
}

/// Query selecting one user's records of a metric within a date range
pub fn build_query(spec: &MetricSpec, user: &UserId, range: &DateRange) -> DocumentQuery {
    let mut filter = Filter::new().and(Condition::eq(
        spec.collection.user_key(),
        user.raw().clone(),
    ));

    if let Some(record_type) = spec.record_type {
        filter = filter.and(Condition::eq(TYPE_KEY, record_type));
    }

    if let (Some(key), Some(lower)) = (spec.time.start(), range.lower_bound()) {
        filter = filter.and(Condition::gte(key, to_bson_datetime(lower)));
    }

    if let (Some(key), Some(upper)) = (spec.time.end(), range.upper_bound()) {
        filter = filter.and(Condition::lt(key, to_bson_datetime(upper)));
    }

    spec.time
        .paths()
        .into_iter()
        .fold(
            DocumentQuery::new(spec.collection.name()).with_filter(filter),
            |query, path| query.with_date_field(path),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Metric;
    use bson::Bson;
    use lifesnaps_query::Operator;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_date_range_validation() {
        assert!(DateRange::between(date("2021-05-22"), date("2021-05-22")).is_ok());

        let err = DateRange::between(date("2021-05-22"), date("2021-05-21")).unwrap_err();
        assert!(matches!(err, DataError::InvalidDateRange { .. }));

        assert!(DateRange::new(None, Some(date("2021-05-21"))).is_ok());
    }

    #[test]
    fn test_date_range_bounds_are_day_inclusive() {
        let range = DateRange::between(date("2021-05-22"), date("2021-06-06")).unwrap();

        assert!(range.contains(date("2021-05-22").and_hms_opt(0, 0, 0).unwrap()));
        assert!(range.contains(date("2021-06-06").and_hms_milli_opt(23, 59, 59, 999).unwrap()));
        assert!(!range.contains(date("2021-06-07").and_hms_opt(0, 0, 0).unwrap()));
        assert!(!range.contains(date("2021-05-21").and_hms_opt(23, 59, 59).unwrap()));
        assert!(DateRange::all().contains(date("1990-01-01").and_hms_opt(0, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_loose_dates() {
        let range = DateRange::parse(Some("2021/05/22"), Some("2021-06-06T13:00:00")).unwrap();
        assert_eq!(range.start(), Some(date("2021-05-22")));
        assert_eq!(range.end(), Some(date("2021-06-06")));

        let err = DateRange::parse(Some("yesterday"), None).unwrap_err();
        assert!(matches!(err, DataError::InvalidDate(input) if input == "yesterday"));
    }

    #[test]
    fn test_build_query_for_point_metric() {
        let range = DateRange::between(date("2021-05-22"), date("2021-06-06")).unwrap();
        let query = build_query(&Metric::Steps.spec(), &UserId::from("U1"), &range);

        assert_eq!(query.collection, "fitbit");
        assert_eq!(query.date_fields, vec!["data.dateTime".to_string()]);

        let conditions = &query.filter.conditions;
        assert_eq!(conditions.len(), 4);
        assert_eq!(conditions[0], Condition::eq("id", "U1"));
        assert_eq!(conditions[1], Condition::eq("type", "steps"));
        assert_eq!(conditions[2].op, Operator::Gte);
        assert_eq!(
            conditions[2].value,
            to_bson_datetime(date("2021-05-22").and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(conditions[3].op, Operator::Lt);
        assert_eq!(
            conditions[3].value,
            to_bson_datetime(date("2021-06-07").and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_build_query_for_range_metric() {
        let range = DateRange::between(date("2021-05-22"), date("2021-05-23")).unwrap();
        let query = build_query(
            &Metric::ComputedTemperature.spec(),
            &UserId::from("U1"),
            &range,
        );

        let fields: Vec<&str> = query.filter.conditions.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["id", "type", "data.sleep_start", "data.sleep_end"]);
        assert!(query.is_date_field("data.sleep_start"));
        assert!(query.is_date_field("data.sleep_end"));
    }

    #[test]
    fn test_build_query_for_sema_and_surveys() {
        let user = UserId::new(Bson::Int32(3));
        let query = build_query(&Metric::StepGoal.spec(), &user, &DateRange::all());
        assert_eq!(query.collection, "sema");
        assert_eq!(query.filter.conditions[0], Condition::eq("user_id", 3));
        assert_eq!(query.filter.conditions.len(), 2);

        let query = build_query(&Metric::SurveyResponses.spec(), &user, &DateRange::all());
        assert_eq!(query.collection, "surveys");
        assert_eq!(query.filter.conditions.len(), 1);
    }

    #[test]
    fn test_build_query_for_untimed_metric() {
        let query = build_query(&Metric::Profile.spec(), &UserId::from("U1"), &DateRange::all());
        assert!(query.date_fields.is_empty());
        assert_eq!(query.filter.conditions.len(), 2);
    }
}
