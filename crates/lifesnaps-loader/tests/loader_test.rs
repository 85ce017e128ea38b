//! Loader behavior against an in-memory store

mod common;

use bson::{doc, oid::ObjectId, Bson};
use common::{date, dataset, fitbit, init_tracing, loader};
use lifesnaps_loader::normalize::{ISO_DATE_COL, TOTAL_STEPS_COL, UNIX_TIMESTAMP_COL};
use lifesnaps_loader::{DateRange, LifeSnapsLoader, LoadOptions, Metric, UserId};
use lifesnaps_query::{CellValue, DataError, MemoryStore};

fn range(start: &str, end: &str) -> DateRange {
    DateRange::between(date(start), date(end)).unwrap()
}

#[tokio::test]
async fn test_user_ids_of_empty_store() {
    init_tracing();
    let loader = LifeSnapsLoader::with_store(MemoryStore::new());
    assert!(loader.get_user_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_ids_are_distinct_and_skip_missing_keys() {
    let loader = loader();
    let users: Vec<String> = loader
        .get_user_ids()
        .await
        .unwrap()
        .iter()
        .map(|u| u.to_string())
        .collect();
    assert_eq!(users, vec!["U1".to_string(), "U2".to_string()]);
}

#[tokio::test]
async fn test_sleep_summary_within_range() {
    let loader = loader();

    let table = loader
        .load_metric("U1", "sleep_summary", Some(date("2021-05-22")), Some(date("2021-06-06")))
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "logId"), Some(&CellValue::Int(26_548_100_000)));
    assert_eq!(
        table.get(0, "dateOfSleep"),
        Some(&CellValue::Date(date("2021-05-22")))
    );
    assert_eq!(
        table.get(0, ISO_DATE_COL),
        Some(&CellValue::Timestamp(
            date("2021-05-21").and_hms_opt(23, 0, 0).unwrap()
        ))
    );
    assert_eq!(table.get(0, "mainSleep"), Some(&CellValue::Bool(true)));

    // light 120 + 120 s around a 60 s short wake, then 600 s deep
    assert_eq!(
        table.get(0, "lightSleepDurationInMs"),
        Some(&CellValue::Int(240_000))
    );
    assert_eq!(table.get(0, "deepSleepDurationInMs"), Some(&CellValue::Int(600_000)));
    assert_eq!(table.get(0, "remSleepInMs"), Some(&CellValue::Int(0)));
    assert_eq!(table.get(0, "awakeDurationInMs"), Some(&CellValue::Int(60_000)));
}

#[tokio::test]
async fn test_sleep_summary_outside_range_is_empty() {
    let loader = loader();
    let table = loader
        .load_sleep_summary("U1", range("2021-05-23", "2021-06-06"))
        .await
        .unwrap();
    assert!(table.is_empty());
    assert!(table.has_column("logId"));
    assert!(table.has_column("awakeDurationInMs"));
}

#[tokio::test]
async fn test_end_before_start_is_rejected() {
    let loader = loader();
    let err = loader
        .load_metric("U1", "sleep_summary", Some(date("2021-05-22")), Some(date("2021-05-21")))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidDateRange { .. }));
}

#[tokio::test]
async fn test_unknown_user() {
    let loader = loader();
    let err = loader
        .load_metric("U9", "steps", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::UnknownUser(user) if user == "U9"));
}

#[tokio::test]
async fn test_validation_order() {
    let loader = loader();
    let bad_range = (Some(date("2021-05-22")), Some(date("2021-05-21")));

    let err = loader
        .load_metric("U9", "blood_pressure", bad_range.0, bad_range.1)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::UnknownMetric(name) if name == "blood_pressure"));

    let err = loader
        .load_metric("U9", "steps", bad_range.0, bad_range.1)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidDateRange { .. }));
}

#[tokio::test]
async fn test_every_metric_loads_for_every_known_user() {
    let loader = loader();
    for user in loader.get_user_ids().await.unwrap() {
        for metric in Metric::ALL {
            let result = loader.load(&user, metric, DateRange::all()).await;
            assert!(
                result.is_ok(),
                "{} for {} failed: {:?}",
                metric,
                user,
                result.err()
            );
        }
    }
}

#[tokio::test]
async fn test_steps_rows_are_in_range_and_sorted() {
    let loader = loader();
    let range = range("2021-05-22", "2021-06-06");
    let table = loader.load_steps("U1", range).await.unwrap();

    // 2021-05-21T23:59 and 2021-06-07T00:00 fall outside the range
    assert_eq!(table.len(), 3);

    let stamps: Vec<_> = table
        .column(ISO_DATE_COL)
        .unwrap()
        .into_iter()
        .map(|cell| cell.as_timestamp().unwrap())
        .collect();
    assert!(stamps.iter().all(|ts| range.contains(*ts)));
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));

    let totals: Vec<_> = table
        .column(TOTAL_STEPS_COL)
        .unwrap()
        .into_iter()
        .map(|cell| cell.as_i64().unwrap())
        .collect();
    assert_eq!(totals, vec![30, 150, 40]);

    let unix: Vec<_> = table
        .column(UNIX_TIMESTAMP_COL)
        .unwrap()
        .into_iter()
        .map(|cell| cell.as_i64().unwrap())
        .collect();
    assert_eq!(
        unix[0],
        date("2021-05-22")
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    );
}

#[tokio::test]
async fn test_loading_is_idempotent() {
    let loader = loader();
    let range = range("2021-05-01", "2021-06-30");
    let first = loader.load_steps("U1", range).await.unwrap();
    let second = loader.load_steps("U1", range).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_heart_rate_with_short_us_dates() {
    let loader = loader();
    let table = loader
        .load_heart_rate("U1", range("2021-05-22", "2021-05-22"))
        .await
        .unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "bpm"), Some(&CellValue::Int(61)));
    assert_eq!(table.get(0, "confidence"), Some(&CellValue::Int(3)));
}

#[tokio::test]
async fn test_profile_ignores_date_range() {
    let loader = loader();
    let table = loader
        .load(
            "U1",
            Metric::Profile,
            range("1999-01-01", "1999-01-02"),
        )
        .await
        .unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "gender"), Some(&CellValue::Text("FEMALE".into())));
    assert_eq!(table.get(0, "bmi"), Some(&CellValue::Text("<19".into())));
    assert!(!table.has_column(ISO_DATE_COL));

    assert_eq!(loader.load_profile("U1").await.unwrap(), table);
}

#[tokio::test]
async fn test_sleep_stages_with_and_without_short_data() {
    let loader = loader();
    let range = range("2021-05-21", "2021-05-22");

    let merged = loader.load_sleep_stages("U1", range, true).await.unwrap();
    let levels: Vec<_> = merged
        .column("level")
        .unwrap()
        .into_iter()
        .map(|cell| cell.as_str().unwrap().to_string())
        .collect();
    assert_eq!(levels, vec!["light", "wake", "light", "deep"]);
    let seconds: Vec<_> = merged
        .column("seconds")
        .unwrap()
        .into_iter()
        .map(|cell| cell.as_i64().unwrap())
        .collect();
    assert_eq!(seconds, vec![120, 60, 120, 600]);

    let plain = loader.load_sleep_stages("U1", range, false).await.unwrap();
    let levels: Vec<_> = plain
        .column("level")
        .unwrap()
        .into_iter()
        .map(|cell| cell.as_str().unwrap().to_string())
        .collect();
    assert_eq!(levels, vec!["light", "deep"]);

    let default = loader
        .load_with("U1", Metric::SleepStage, range, LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(default, merged);
}

#[tokio::test]
async fn test_sleep_without_stages_has_missing_durations() {
    init_tracing();
    let store = MemoryStore::new().with_collection(
        "fitbit",
        vec![fitbit(
            "U1",
            "sleep",
            doc! {
                "logId": 7_i64,
                "dateOfSleep": "2021-05-30",
                "startTime": "2021-05-30T01:00:00.000",
                "endTime": "2021-05-30T02:00:00.000",
                "duration": 3_600_000_i64,
                "mainSleep": false,
                "type": "classic",
            },
        )],
    );
    let loader = LifeSnapsLoader::with_store(store);

    let table = loader.load_sleep_summary("U1", DateRange::all()).await.unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "deepSleepDurationInMs"), Some(&CellValue::Missing));
    assert_eq!(table.get(0, "efficiency"), Some(&CellValue::Missing));

    let stages = loader
        .load_sleep_stages("U1", DateRange::all(), true)
        .await
        .unwrap();
    assert!(stages.is_empty());
}

#[tokio::test]
async fn test_missing_required_timestamp_is_a_schema_error() {
    init_tracing();
    let store = MemoryStore::new().with_collection(
        "fitbit",
        vec![fitbit("U1", "sleep", doc! { "logId": 1_i64, "dateOfSleep": "2021-05-30" })],
    );
    let loader = LifeSnapsLoader::with_store(store);

    let err = loader
        .load_sleep_summary("U1", DateRange::all())
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::SchemaError { field, .. } if field == "data.startTime"));
}

#[tokio::test]
async fn test_object_id_users_resolve_from_hex() {
    init_tracing();
    let oid = ObjectId::parse_str("621e2e8e67b776a24055b564").unwrap();
    let store = MemoryStore::new().with_collection(
        "fitbit",
        vec![doc! {
            "id": oid,
            "type": "steps",
            "data": { "dateTime": "2021-05-24T10:00:00", "value": "12" },
        }],
    );
    let loader = LifeSnapsLoader::with_store(store);

    let users = loader.get_user_ids().await.unwrap();
    assert!(users.contains(&UserId::from(oid)));

    let table = loader
        .load_steps("621e2e8e67b776a24055b564", DateRange::all())
        .await
        .unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "steps"), Some(&CellValue::Int(12)));
}

#[tokio::test]
async fn test_sema_metrics_are_split_by_type() {
    let loader = loader();

    let mood = loader
        .load("U1", Metric::ContextAndMood, DateRange::all())
        .await
        .unwrap();
    assert_eq!(mood.len(), 1);
    assert_eq!(mood.get(0, "MOOD"), Some(&CellValue::Text("HAPPY".into())));
    assert_eq!(
        mood.get(0, "COMPLETED_TS"),
        Some(&CellValue::Timestamp(
            date("2021-05-24").and_hms_opt(9, 16, 10).unwrap()
        ))
    );

    let goal = loader
        .load_metric("U1", "step-goal", Some(date("2021-05-24")), None)
        .await
        .unwrap();
    assert_eq!(goal.len(), 1);
    assert_eq!(
        goal.get(0, "STEPS_GOAL"),
        Some(&CellValue::Text("7000-8000".into()))
    );
    assert_eq!(goal.get(0, "TIMEZONE"), Some(&CellValue::Missing));
}

#[tokio::test]
async fn test_survey_responses_keep_raw_answers() {
    let loader = loader();
    let table = loader
        .load("U1", Metric::SurveyResponses, range("2021-05-25", "2021-05-25"))
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "surveyName"), Some(&CellValue::Text("breq".into())));
    match table.get(0, "responses") {
        Some(CellValue::Json(value)) => {
            assert_eq!(value["breq_2"], "4");
            assert_eq!(value["submitdate"], "2021-05-25T12:00:00.000");
        }
        other => panic!("expected json responses, got {:?}", other),
    }
}

#[tokio::test]
async fn test_user_without_records_gets_empty_tables() {
    let loader = loader();
    let table = loader
        .load("U2", Metric::HeartRate, DateRange::all())
        .await
        .unwrap();
    assert!(table.is_empty());
    assert_eq!(
        table.column_names(),
        vec!["timezoneOffsetInMs", "unixTimestampInMs", "isoDate", "bpm", "confidence"]
    );
}

#[tokio::test]
async fn test_store_accessor_and_close() {
    let loader = LifeSnapsLoader::with_store(dataset());
    assert_eq!(loader.store().count("sema"), 2);
    loader.close().await.unwrap();
}

#[tokio::test]
async fn test_string_and_numeric_ids_are_separate_users() {
    init_tracing();
    let store = MemoryStore::new().with_collection(
        "fitbit",
        vec![
            doc! {
                "id": "7",
                "type": "steps",
                "data": { "dateTime": "2021-05-24T10:00:00", "value": "100" },
            },
            doc! {
                "id": 7,
                "type": "steps",
                "data": { "dateTime": "2021-05-24T11:00:00", "value": "200" },
            },
        ],
    );
    let loader = LifeSnapsLoader::with_store(store);

    let users = loader.get_user_ids().await.unwrap();
    assert_eq!(users.len(), 2);

    let text = loader.load_steps("7", DateRange::all()).await.unwrap();
    assert_eq!(text.len(), 1);
    assert_eq!(text.get(0, "steps"), Some(&CellValue::Int(100)));

    let number = loader
        .load_steps(UserId::new(Bson::Int32(7)), DateRange::all())
        .await
        .unwrap();
    assert_eq!(number.len(), 1);
    assert_eq!(number.get(0, "steps"), Some(&CellValue::Int(200)));
}
