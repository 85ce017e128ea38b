//! Shared fixtures for loader integration tests
//!
//! Documents mirror the layout of the restored LifeSnaps dump: a user key,
//! a `type` discriminator and a `data` payload with string timestamps.

#![allow(dead_code)]

use bson::{doc, Document};
use chrono::NaiveDate;
use lifesnaps_loader::LifeSnapsLoader;
use lifesnaps_query::MemoryStore;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("lifesnaps_loader=debug,lifesnaps_query=debug")
        .with_test_writer()
        .try_init();
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

pub fn fitbit(user: &str, record_type: &str, data: Document) -> Document {
    doc! { "id": user, "type": record_type, "data": data }
}

pub fn sema(user: &str, record_type: &str, data: Document) -> Document {
    doc! { "user_id": user, "type": record_type, "data": data }
}

pub fn step(user: &str, at: &str, value: &str) -> Document {
    fitbit(user, "steps", doc! { "dateTime": at, "value": value })
}

/// A stage-classified night for U1 dated 2021-05-22
pub fn night(log_id: i64, date_of_sleep: &str, start: &str) -> Document {
    fitbit(
        "U1",
        "sleep",
        doc! {
            "logId": log_id,
            "dateOfSleep": date_of_sleep,
            "startTime": start,
            "endTime": "2021-05-22T07:00:00.000",
            "duration": 28_800_000_i64,
            "minutesToFallAsleep": 0,
            "minutesAsleep": 420,
            "minutesAwake": 60,
            "minutesAfterWakeup": 0,
            "timeInBed": 480,
            "efficiency": 93,
            "mainSleep": true,
            "type": "stages",
            "infoCode": 0,
            "levels": {
                "data": [
                    { "dateTime": "2021-05-21T23:00:00.000", "level": "light", "seconds": 300 },
                    { "dateTime": "2021-05-21T23:05:00.000", "level": "deep", "seconds": 600 },
                ],
                "shortData": [
                    { "dateTime": "2021-05-21T23:02:00.000", "level": "wake", "seconds": 60 },
                ],
            },
        },
    )
}

/// Two users with steps, heart rate, a profile and one night of sleep
pub fn dataset() -> MemoryStore {
    MemoryStore::new()
        .with_collection(
            "fitbit",
            vec![
                fitbit("U1", "Profile", doc! { "gender": "FEMALE", "bmi": "<19", "age": "<30" }),
                step("U1", "2021-05-22T10:00:00", "120"),
                step("U1", "2021-05-21T23:59:00", "7"),
                step("U1", "2021-05-23T08:00:00", "40"),
                step("U1", "2021-05-22T09:00:00", "30"),
                step("U1", "2021-06-07T00:00:00", "99"),
                step("U2", "2021-05-22T10:00:00", "500"),
                fitbit(
                    "U1",
                    "heart_rate",
                    doc! { "dateTime": "05/22/21 08:00:05", "value": { "bpm": 61, "confidence": 3 } },
                ),
                night(26_548_100_000, "2021-05-22", "2021-05-21T23:00:00.000"),
                doc! { "type": "steps", "data": { "dateTime": "2021-05-22T10:00:00", "value": "1" } },
            ],
        )
        .with_collection(
            "sema",
            vec![
                sema(
                    "U1",
                    "Context and Mood",
                    doc! {
                        "STARTED_TS": "2021-05-24 09:15:00",
                        "COMPLETED_TS": "2021-05-24 09:16:10",
                        "TIMEZONE": "Europe/Athens",
                        "PLACE": "HOME",
                        "MOOD": "HAPPY",
                    },
                ),
                sema(
                    "U1",
                    "Step Goal",
                    doc! { "STARTED_TS": "2021-05-24 09:20:00", "STEPS_GOAL": "7000-8000" },
                ),
            ],
        )
        .with_collection(
            "surveys",
            vec![doc! {
                "user_id": "U1",
                "type": "breq",
                "data": { "submitdate": "2021-05-25 12:00:00", "breq_1": "2", "breq_2": "4" },
            }],
        )
}

pub fn loader() -> LifeSnapsLoader<MemoryStore> {
    init_tracing();
    LifeSnapsLoader::with_store(dataset())
}
