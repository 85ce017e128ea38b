//! Metric catalog.
//!
//! Every supported metric maps to one collection, an optional record type
//! discriminator, its timestamp key(s) and an explicit schema map from
//! document paths to typed table columns.

use lifesnaps_query::{DataError, FieldType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Collections of the LifeSnaps database
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Collection {
    /// Wearable sensor time series
    Fitbit,
    /// Ecological momentary assessments
    Sema,
    /// Survey responses
    Surveys,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Fitbit => "fitbit",
            Collection::Sema => "sema",
            Collection::Surveys => "surveys",
        }
    }

    /// Field holding the user identifier
    pub fn user_key(&self) -> &'static str {
        match self {
            Collection::Fitbit => "id",
            Collection::Sema | Collection::Surveys => "user_id",
        }
    }
}

pub const TYPE_KEY: &str = "type";

/// Where a metric keeps its timestamp
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimeKey {
    /// Untimed records; date ranges are ignored
    None,
    /// A single timestamp path
    At(&'static str),
    /// A timestamp range; the range start is filtered on `start`, the range
    /// end on `end`
    Range {
        start: &'static str,
        end: &'static str,
    },
}

impl TimeKey {
    pub fn start(&self) -> Option<&'static str> {
        match *self {
            TimeKey::None => None,
            TimeKey::At(path) => Some(path),
            TimeKey::Range { start, .. } => Some(start),
        }
    }

    pub fn end(&self) -> Option<&'static str> {
        match *self {
            TimeKey::None => None,
            TimeKey::At(path) => Some(path),
            TimeKey::Range { end, .. } => Some(end),
        }
    }

    /// Paths converted to dates before filtering
    pub fn paths(&self) -> Vec<&'static str> {
        match *self {
            TimeKey::None => Vec::new(),
            TimeKey::At(path) => vec![path],
            TimeKey::Range { start, end } => vec![start, end],
        }
    }

    pub fn is_timed(&self) -> bool {
        !matches!(self, TimeKey::None)
    }
}

/// Mapping of one document path to one table column
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ColumnSpec {
    pub path: &'static str,
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn col(path: &'static str, name: &'static str, field_type: FieldType) -> ColumnSpec {
    ColumnSpec {
        path,
        name,
        field_type,
    }
}

/// Row construction beyond the plain schema map
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Shape {
    /// One row per record
    Records,
    /// One row per sleep session with per-stage durations
    SleepSummary,
    /// One row per (merged) sleep stage segment
    SleepStages,
    /// Records plus a per-day running step total
    Steps,
    /// One row per histogram bucket
    HrvHistogram,
    /// One row per waveform sample
    Ecg,
    /// Records without a `value.date` are dropped
    RestingHeartRate,
}

/// Static description of a metric
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub metric: Metric,
    pub collection: Collection,
    /// Value of the `type` field, `None` when any type matches
    pub record_type: Option<&'static str>,
    pub time: TimeKey,
    pub columns: &'static [ColumnSpec],
    pub shape: Shape,
}

/// Supported metrics
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SleepSummary,
    SleepStage,
    ComputedTemperature,
    DailySpo2,
    DeviceTemperature,
    DailyHrvSummary,
    HrvDetails,
    HrvHistogram,
    Profile,
    RespiratoryRateSummary,
    StressScore,
    WristTemperature,
    Altitude,
    Badge,
    Calories,
    DemographicVo2Max,
    Distance,
    EstimatedOxygenVariation,
    HeartRate,
    JournalEntries,
    LightlyActiveMinutes,
    ModeratelyActiveMinutes,
    SedentaryMinutes,
    VeryActiveMinutes,
    Steps,
    RestingHeartRate,
    TimeInHeartRateZones,
    WaterLogs,
    Ecg,
    ContextAndMood,
    StepGoal,
    SurveyResponses,
}

impl Metric {
    pub const ALL: [Metric; 32] = [
        Metric::SleepSummary,
        Metric::SleepStage,
        Metric::ComputedTemperature,
        Metric::DailySpo2,
        Metric::DeviceTemperature,
        Metric::DailyHrvSummary,
        Metric::HrvDetails,
        Metric::HrvHistogram,
        Metric::Profile,
        Metric::RespiratoryRateSummary,
        Metric::StressScore,
        Metric::WristTemperature,
        Metric::Altitude,
        Metric::Badge,
        Metric::Calories,
        Metric::DemographicVo2Max,
        Metric::Distance,
        Metric::EstimatedOxygenVariation,
        Metric::HeartRate,
        Metric::JournalEntries,
        Metric::LightlyActiveMinutes,
        Metric::ModeratelyActiveMinutes,
        Metric::SedentaryMinutes,
        Metric::VeryActiveMinutes,
        Metric::Steps,
        Metric::RestingHeartRate,
        Metric::TimeInHeartRateZones,
        Metric::WaterLogs,
        Metric::Ecg,
        Metric::ContextAndMood,
        Metric::StepGoal,
        Metric::SurveyResponses,
    ];

    /// Canonical snake_case name
    pub fn name(&self) -> &'static str {
        match self {
            Metric::SleepSummary => "sleep_summary",
            Metric::SleepStage => "sleep_stage",
            Metric::ComputedTemperature => "computed_temperature",
            Metric::DailySpo2 => "daily_spo2",
            Metric::DeviceTemperature => "device_temperature",
            Metric::DailyHrvSummary => "daily_hrv_summary",
            Metric::HrvDetails => "hrv_details",
            Metric::HrvHistogram => "hrv_histogram",
            Metric::Profile => "profile",
            Metric::RespiratoryRateSummary => "respiratory_rate_summary",
            Metric::StressScore => "stress_score",
            Metric::WristTemperature => "wrist_temperature",
            Metric::Altitude => "altitude",
            Metric::Badge => "badge",
            Metric::Calories => "calories",
            Metric::DemographicVo2Max => "demographic_vo2_max",
            Metric::Distance => "distance",
            Metric::EstimatedOxygenVariation => "estimated_oxygen_variation",
            Metric::HeartRate => "heart_rate",
            Metric::JournalEntries => "journal_entries",
            Metric::LightlyActiveMinutes => "lightly_active_minutes",
            Metric::ModeratelyActiveMinutes => "moderately_active_minutes",
            Metric::SedentaryMinutes => "sedentary_minutes",
            Metric::VeryActiveMinutes => "very_active_minutes",
            Metric::Steps => "steps",
            Metric::RestingHeartRate => "resting_heart_rate",
            Metric::TimeInHeartRateZones => "time_in_heart_rate_zones",
            Metric::WaterLogs => "water_logs",
            Metric::Ecg => "ecg",
            Metric::ContextAndMood => "context_and_mood",
            Metric::StepGoal => "step_goal",
            Metric::SurveyResponses => "survey_responses",
        }
    }

    pub fn spec(&self) -> MetricSpec {
        use Collection::*;
        use Shape::*;

        let (collection, record_type, time, columns, shape) = match self {
            Metric::SleepSummary => (
                Fitbit,
                Some("sleep"),
                TimeKey::At("data.dateOfSleep"),
                SLEEP_SUMMARY,
                SleepSummary,
            ),
            Metric::SleepStage => (
                Fitbit,
                Some("sleep"),
                TimeKey::At("data.startTime"),
                SLEEP_STAGE,
                SleepStages,
            ),
            Metric::ComputedTemperature => (
                Fitbit,
                Some("Computed Temperature"),
                TimeKey::Range {
                    start: "data.sleep_start",
                    end: "data.sleep_end",
                },
                COMPUTED_TEMPERATURE,
                Records,
            ),
            Metric::DailySpo2 => (
                Fitbit,
                Some("Daily SpO2"),
                TimeKey::At("data.timestamp"),
                DAILY_SPO2,
                Records,
            ),
            Metric::DeviceTemperature => (
                Fitbit,
                Some("Device Temperature"),
                TimeKey::At("data.recorded_time"),
                DEVICE_TEMPERATURE,
                Records,
            ),
            Metric::DailyHrvSummary => (
                Fitbit,
                Some("Daily Heart Rate Variability Summary"),
                TimeKey::At("data.timestamp"),
                DAILY_HRV_SUMMARY,
                Records,
            ),
            Metric::HrvDetails => (
                Fitbit,
                Some("Heart Rate Variability Details"),
                TimeKey::At("data.timestamp"),
                HRV_DETAILS,
                Records,
            ),
            Metric::HrvHistogram => (
                Fitbit,
                Some("Heart Rate Variability Histogram"),
                TimeKey::At("data.timestamp"),
                NO_COLUMNS,
                HrvHistogram,
            ),
            Metric::Profile => (Fitbit, Some("Profile"), TimeKey::None, PROFILE, Records),
            Metric::RespiratoryRateSummary => (
                Fitbit,
                Some("Respiratory Rate Summary"),
                TimeKey::At("data.timestamp"),
                RESPIRATORY_RATE_SUMMARY,
                Records,
            ),
            Metric::StressScore => (
                Fitbit,
                Some("Stress Score"),
                TimeKey::At("data.DATE"),
                STRESS_SCORE,
                Records,
            ),
            Metric::WristTemperature => (
                Fitbit,
                Some("Wrist Temperature"),
                TimeKey::At("data.recorded_time"),
                WRIST_TEMPERATURE,
                Records,
            ),
            Metric::Altitude => (
                Fitbit,
                Some("altitude"),
                TimeKey::At("data.dateTime"),
                FLOAT_VALUE,
                Records,
            ),
            Metric::Badge => (
                Fitbit,
                Some("badge"),
                TimeKey::At("data.dateTime"),
                BADGE,
                Records,
            ),
            Metric::Calories => (
                Fitbit,
                Some("calories"),
                TimeKey::At("data.dateTime"),
                FLOAT_VALUE,
                Records,
            ),
            Metric::DemographicVo2Max => (
                Fitbit,
                Some("demographic_vo2_max"),
                TimeKey::At("data.dateTime"),
                DEMOGRAPHIC_VO2_MAX,
                Records,
            ),
            Metric::Distance => (
                Fitbit,
                Some("distance"),
                TimeKey::At("data.dateTime"),
                FLOAT_VALUE,
                Records,
            ),
            Metric::EstimatedOxygenVariation => (
                Fitbit,
                Some("estimated_oxygen_variation"),
                TimeKey::At("data.timestamp"),
                ESTIMATED_OXYGEN_VARIATION,
                Records,
            ),
            Metric::HeartRate => (
                Fitbit,
                Some("heart_rate"),
                TimeKey::At("data.dateTime"),
                HEART_RATE,
                Records,
            ),
            Metric::JournalEntries => (
                Fitbit,
                Some("journal_entries"),
                TimeKey::At("data.log_time"),
                JOURNAL_ENTRIES,
                Records,
            ),
            Metric::LightlyActiveMinutes => (
                Fitbit,
                Some("lightly_active_minutes"),
                TimeKey::At("data.dateTime"),
                INT_VALUE,
                Records,
            ),
            Metric::ModeratelyActiveMinutes => (
                Fitbit,
                Some("moderately_active_minutes"),
                TimeKey::At("data.dateTime"),
                INT_VALUE,
                Records,
            ),
            Metric::SedentaryMinutes => (
                Fitbit,
                Some("sedentary_minutes"),
                TimeKey::At("data.dateTime"),
                INT_VALUE,
                Records,
            ),
            Metric::VeryActiveMinutes => (
                Fitbit,
                Some("very_active_minutes"),
                TimeKey::At("data.dateTime"),
                INT_VALUE,
                Records,
            ),
            Metric::Steps => (
                Fitbit,
                Some("steps"),
                TimeKey::At("data.dateTime"),
                STEPS,
                Steps,
            ),
            Metric::RestingHeartRate => (
                Fitbit,
                Some("resting_heart_rate"),
                TimeKey::At("data.dateTime"),
                RESTING_HEART_RATE,
                RestingHeartRate,
            ),
            Metric::TimeInHeartRateZones => (
                Fitbit,
                Some("time_in_heart_rate_zones"),
                TimeKey::At("data.dateTime"),
                TIME_IN_HEART_RATE_ZONES,
                Records,
            ),
            Metric::WaterLogs => (
                Fitbit,
                Some("water_logs"),
                TimeKey::At("data.date"),
                WATER_LOGS,
                Records,
            ),
            Metric::Ecg => (
                Fitbit,
                Some("Afib ECG Readings"),
                TimeKey::At("data.reading_time"),
                ECG,
                Ecg,
            ),
            Metric::ContextAndMood => (
                Sema,
                Some("Context and Mood"),
                TimeKey::At("data.STARTED_TS"),
                CONTEXT_AND_MOOD,
                Records,
            ),
            Metric::StepGoal => (
                Sema,
                Some("Step Goal"),
                TimeKey::At("data.STARTED_TS"),
                STEP_GOAL,
                Records,
            ),
            Metric::SurveyResponses => (
                Surveys,
                None,
                TimeKey::At("data.submitdate"),
                SURVEY_RESPONSES,
                Records,
            ),
        };

        MetricSpec {
            metric: *self,
            collection,
            record_type,
            time,
            columns,
            shape,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Metric {
    type Err = DataError;

    /// Case-insensitive; `-` and `_` are interchangeable. The short names of
    /// the Fitbit export (`stress`, `temperature-wrist`, ...) are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");

        if let Some(metric) = Metric::ALL.iter().find(|m| m.name() == normalized) {
            return Ok(*metric);
        }

        match normalized.as_str() {
            "temperature_computed" | "temprature_computed" => Ok(Metric::ComputedTemperature),
            "temperature_device" => Ok(Metric::DeviceTemperature),
            "temperature_wrist" => Ok(Metric::WristTemperature),
            "stress" => Ok(Metric::StressScore),
            "sleep" => Ok(Metric::SleepSummary),
            "sleep_stages" => Ok(Metric::SleepStage),
            _ => Err(DataError::UnknownMetric(s.to_string())),
        }
    }
}

use FieldType::{Boolean, Date, Float64, Int64, Json, String as Text, Timestamp};

pub const SLEEP_SUMMARY: &[ColumnSpec] = &[
    col("data.logId", "logId", Int64),
    col("data.dateOfSleep", "dateOfSleep", Date),
    col("data.endTime", "endTime", Timestamp),
    col("data.duration", "duration", Int64),
    col("data.minutesToFallAsleep", "minutesToFallAsleep", Int64),
    col("data.minutesAsleep", "minutesAsleep", Int64),
    col("data.minutesAwake", "minutesAwake", Int64),
    col("data.minutesAfterWakeup", "minutesAfterWakeup", Int64),
    col("data.timeInBed", "timeInBed", Int64),
    col("data.efficiency", "efficiency", Int64),
    col("data.mainSleep", "mainSleep", Boolean),
    col("data.type", "type", Text),
    col("data.infoCode", "infoCode", Int64),
];

pub const SLEEP_STAGE: &[ColumnSpec] = &[col("data.logId", "logId", Int64)];

const COMPUTED_TEMPERATURE: &[ColumnSpec] = &[
    col("data.type", "type", Text),
    col("data.sleep_end", "sleepEnd", Timestamp),
    col("data.temperature_samples", "temperature_samples", Int64),
    col("data.nightly_temperature", "nightly_temperature", Float64),
    col(
        "data.baseline_relative_sample_sum",
        "baseline_relative_sample_sum",
        Float64,
    ),
    col(
        "data.baseline_relative_sample_sum_of_squares",
        "baseline_relative_sample_sum_of_squares",
        Float64,
    ),
    col(
        "data.baseline_relative_nightly_standard_deviation",
        "baseline_relative_nightly_standard_deviation",
        Float64,
    ),
    col(
        "data.baseline_relative_sample_standard_deviation",
        "baseline_relative_sample_standard_deviation",
        Float64,
    ),
];

const DAILY_SPO2: &[ColumnSpec] = &[
    col("data.average_value", "average_value", Float64),
    col("data.lower_bound", "lower_bound", Float64),
    col("data.upper_bound", "upper_bound", Float64),
];

const DEVICE_TEMPERATURE: &[ColumnSpec] = &[
    col("data.temperature", "temperature", Float64),
    col("data.sensor_type", "sensor_type", Text),
];

const DAILY_HRV_SUMMARY: &[ColumnSpec] = &[
    col("data.rmssd", "rmssd", Float64),
    col("data.nremhr", "nremhr", Float64),
    col("data.entropy", "entropy", Float64),
];

const HRV_DETAILS: &[ColumnSpec] = &[
    col("data.rmssd", "rmssd", Float64),
    col("data.coverage", "coverage", Float64),
    col("data.low_frequency", "low_frequency", Float64),
    col("data.high_frequency", "high_frequency", Float64),
];

const NO_COLUMNS: &[ColumnSpec] = &[];

/// Stored histogram bucket values
pub const HRV_HISTOGRAM_BUCKETS: &str = "data.bucket_values";

// Profile values are bucketed categories such as "<30" or ">=25"
const PROFILE: &[ColumnSpec] = &[
    col("data.gender", "gender", Text),
    col("data.bmi", "bmi", Text),
    col("data.age", "age", Text),
];

const RESPIRATORY_RATE_SUMMARY: &[ColumnSpec] = &[
    col("data.full_sleep_breathing_rate", "full_sleep_breathing_rate", Float64),
    col("data.full_sleep_standard_deviation", "full_sleep_standard_deviation", Float64),
    col("data.full_sleep_signal_to_noise", "full_sleep_signal_to_noise", Float64),
    col("data.deep_sleep_breathing_rate", "deep_sleep_breathing_rate", Float64),
    col("data.deep_sleep_standard_deviation", "deep_sleep_standard_deviation", Float64),
    col("data.deep_sleep_signal_to_noise", "deep_sleep_signal_to_noise", Float64),
    col("data.light_sleep_breathing_rate", "light_sleep_breathing_rate", Float64),
    col("data.light_sleep_standard_deviation", "light_sleep_standard_deviation", Float64),
    col("data.light_sleep_signal_to_noise", "light_sleep_signal_to_noise", Float64),
    col("data.rem_sleep_breathing_rate", "rem_sleep_breathing_rate", Float64),
    col("data.rem_sleep_standard_deviation", "rem_sleep_standard_deviation", Float64),
    col("data.rem_sleep_signal_to_noise", "rem_sleep_signal_to_noise", Float64),
];

const STRESS_SCORE: &[ColumnSpec] = &[
    col("data.UPDATED_AT", "UPDATED_AT", Timestamp),
    col("data.STRESS_SCORE", "STRESS_SCORE", Int64),
    col("data.SLEEP_POINTS", "SLEEP_POINTS", Int64),
    col("data.MAX_SLEEP_POINTS", "MAX_SLEEP_POINTS", Int64),
    col("data.RESPONSIVENESS_POINTS", "RESPONSIVENESS_POINTS", Int64),
    col("data.MAX_RESPONSIVENESS_POINTS", "MAX_RESPONSIVENESS_POINTS", Int64),
    col("data.EXERTION_POINTS", "EXERTION_POINTS", Int64),
    col("data.MAX_EXERTION_POINTS", "MAX_EXERTION_POINTS", Int64),
    col("data.STATUS", "STATUS", Text),
    col("data.CALCULATION_FAILED", "CALCULATION_FAILED", Boolean),
];

const WRIST_TEMPERATURE: &[ColumnSpec] = &[col("data.temperature", "temperature", Float64)];

const FLOAT_VALUE: &[ColumnSpec] = &[col("data.value", "value", Float64)];

const INT_VALUE: &[ColumnSpec] = &[col("data.value", "value", Int64)];

const BADGE: &[ColumnSpec] = &[
    col("data.badgeType", "badgeType", Text),
    col("data.value", "value", Int64),
    col("data.name", "name", Text),
    col("data.description", "description", Text),
];

const DEMOGRAPHIC_VO2_MAX: &[ColumnSpec] = &[
    col("data.value.demographicVO2Max", "demographicVO2Max", Float64),
    col("data.value.demographicVO2MaxError", "demographicVO2MaxError", Float64),
    col("data.value.filteredDemographicVO2Max", "filteredDemographicVO2Max", Float64),
    col(
        "data.value.filteredDemographicVO2MaxError",
        "filteredDemographicVO2MaxError",
        Float64,
    ),
];

const ESTIMATED_OXYGEN_VARIATION: &[ColumnSpec] = &[col(
    "data.Infrared to Red Signal Ratio",
    "Infrared to Red Signal Ratio",
    Float64,
)];

const HEART_RATE: &[ColumnSpec] = &[
    col("data.value.bpm", "bpm", Int64),
    col("data.value.confidence", "confidence", Int64),
];

const JOURNAL_ENTRIES: &[ColumnSpec] = &[
    col("data.log_type", "log_type", Text),
    col("data.platform", "platform", Text),
    col("data.source", "source", Text),
];

const STEPS: &[ColumnSpec] = &[col("data.value", "steps", Int64)];

/// Date of the resting heart rate estimate; records without one are dropped
pub const RESTING_HEART_RATE_DATE: &str = "data.value.date";

const RESTING_HEART_RATE: &[ColumnSpec] = &[
    col("data.value.value", "value", Float64),
    col("data.value.error", "error", Float64),
];

const TIME_IN_HEART_RATE_ZONES: &[ColumnSpec] = &[
    col(
        "data.value.valuesInZones.BELOW_DEFAULT_ZONE_1",
        "BELOW_DEFAULT_ZONE_1",
        Float64,
    ),
    col(
        "data.value.valuesInZones.IN_DEFAULT_ZONE_1",
        "IN_DEFAULT_ZONE_1",
        Float64,
    ),
    col(
        "data.value.valuesInZones.IN_DEFAULT_ZONE_2",
        "IN_DEFAULT_ZONE_2",
        Float64,
    ),
    col(
        "data.value.valuesInZones.IN_DEFAULT_ZONE_3",
        "IN_DEFAULT_ZONE_3",
        Float64,
    ),
];

const WATER_LOGS: &[ColumnSpec] = &[
    col("data.water_amount", "water_amount", Float64),
    col("data.measurement_unit", "measurement_unit", Text),
];

/// Stored ECG waveform
pub const ECG_WAVEFORM: &str = "data.waveform_samples";
/// Sampling frequency of the waveform
pub const ECG_SAMPLE_RATE: &str = "data.sample_rate";
pub const DEFAULT_ECG_SAMPLE_RATE: i64 = 512;

const ECG: &[ColumnSpec] = &[
    col(ECG_SAMPLE_RATE, "sample_rate", Int64),
    col("data.result_classification", "result_classification", Text),
    col("data.heart_rate", "heart_rate", Int64),
    col("data.device_app_version", "device_app_version", Text),
];

const CONTEXT_AND_MOOD: &[ColumnSpec] = &[
    col("data.COMPLETED_TS", "COMPLETED_TS", Timestamp),
    col("data.TIMEZONE", "TIMEZONE", Text),
    col("data.PLACE", "PLACE", Text),
    col("data.MOOD", "MOOD", Text),
];

const STEP_GOAL: &[ColumnSpec] = &[
    col("data.COMPLETED_TS", "COMPLETED_TS", Timestamp),
    col("data.TIMEZONE", "TIMEZONE", Text),
    col("data.STEPS_GOAL", "STEPS_GOAL", Text),
];

const SURVEY_RESPONSES: &[ColumnSpec] = &[
    col(TYPE_KEY, "surveyName", Text),
    col("data", "responses", Json),
];
