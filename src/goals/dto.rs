use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors};
use crate::goals::repo::{BodyMeasurement, Goal, GoalData, MeasurementData, TrendPoint};
use crate::goals::types::{GoalType, MeasurementUnit, Metric};

// ---------------------------------------------------------------------------
// Goals

#[derive(Debug, Deserialize)]
pub struct GoalPayload {
    pub goal_type: Option<String>,
    pub target_date: Option<Date>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl GoalPayload {
    pub fn validate(self) -> Result<GoalData, ApiError> {
        let mut errors = FieldErrors::new();
        let goal_type = match &self.goal_type {
            None => {
                errors.push("goal_type", "This field is required.");
                None
            }
            Some(raw) => match raw.parse::<GoalType>() {
                Ok(parsed) => Some(parsed),
                Err(()) => {
                    errors.push("goal_type", format!("\"{raw}\" is not a valid choice."));
                    None
                }
            },
        };
        if self.target_date.is_none() {
            errors.push("target_date", "This field is required.");
        }
        errors.into_result()?;

        Ok(GoalData {
            goal_type: goal_type.unwrap_or(GoalType::Maintenance),
            target_date: self.target_date.unwrap_or(Date::MIN),
            notes: self.notes,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct GoalPatch {
    pub goal_type: Option<String>,
    pub target_date: Option<Date>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl GoalPatch {
    pub fn merge_into(self, current: &Goal) -> GoalPayload {
        GoalPayload {
            goal_type: Some(
                self.goal_type
                    .unwrap_or_else(|| current.goal_type.as_str().to_string()),
            ),
            target_date: Some(self.target_date.unwrap_or(current.target_date)),
            notes: self.notes.or_else(|| current.notes.clone()),
            is_active: self.is_active.unwrap_or(current.is_active),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GoalOut {
    pub id: Uuid,
    pub user: Uuid,
    pub goal_type: GoalType,
    pub target_date: Date,
    pub notes: Option<String>,
    pub is_active: bool,
    pub days_remaining: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Goal> for GoalOut {
    fn from(goal: Goal) -> Self {
        let today = OffsetDateTime::now_utc().date();
        let days_remaining = (goal.target_date - today).whole_days();
        Self {
            id: goal.id,
            user: goal.user_id,
            goal_type: goal.goal_type,
            target_date: goal.target_date,
            notes: goal.notes,
            is_active: goal.is_active,
            days_remaining,
            created_at: goal.created_at,
            updated_at: goal.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GoalListQuery {
    pub goal_type: Option<String>,
    pub is_active: Option<bool>,
    pub target_date: Option<Date>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GoalByTypeQuery {
    #[serde(rename = "type")]
    pub goal_type: Option<String>,
}

/// Output of `GET /goals/:id/progress`.
#[derive(Debug, Serialize)]
pub struct GoalProgress {
    pub goal: GoalOut,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_measurement: Option<MeasurementOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_measurement: Option<MeasurementOut>,
    pub measurements_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_start: Option<i64>,
}

// ---------------------------------------------------------------------------
// Body measurements

#[derive(Debug, Deserialize)]
pub struct MeasurementPayload {
    pub metric: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl MeasurementPayload {
    pub fn validate(self) -> Result<MeasurementData, ApiError> {
        let mut errors = FieldErrors::new();
        let metric = match &self.metric {
            None => {
                errors.push("metric", "This field is required.");
                None
            }
            Some(raw) => match raw.parse::<Metric>() {
                Ok(parsed) => Some(parsed),
                Err(()) => {
                    errors.push("metric", format!("\"{raw}\" is not a valid choice."));
                    None
                }
            },
        };
        let value = match self.value {
            None => {
                errors.push("value", "This field is required.");
                0.0
            }
            Some(v) if !v.is_finite() || v < 0.0 => {
                errors.push("value", "Ensure this value is greater than or equal to 0.");
                0.0
            }
            Some(v) => v,
        };
        // The unit defaults to the metric's canonical one; an explicit unit
        // must agree with it.
        let unit = match (&self.unit, metric) {
            (None, Some(metric)) => Some(metric.canonical_unit()),
            (Some(raw), metric) => match raw.parse::<MeasurementUnit>() {
                Ok(parsed) => {
                    if let Some(metric) = metric {
                        if parsed != metric.canonical_unit() {
                            errors.push(
                                "unit",
                                format!(
                                    "Unit must be \"{}\" for metric \"{}\".",
                                    metric.canonical_unit(),
                                    metric
                                ),
                            );
                        }
                    }
                    Some(parsed)
                }
                Err(()) => {
                    errors.push("unit", format!("\"{raw}\" is not a valid choice."));
                    None
                }
            },
            (None, None) => None,
        };
        if self.timestamp.is_none() {
            errors.push("timestamp", "This field is required.");
        }
        errors.into_result()?;

        let metric = metric.unwrap_or(Metric::WeightKg);
        Ok(MeasurementData {
            metric,
            value,
            unit: unit.unwrap_or_else(|| metric.canonical_unit()),
            timestamp: self.timestamp.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MeasurementPatch {
    pub metric: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl MeasurementPatch {
    pub fn merge_into(self, current: &BodyMeasurement) -> MeasurementPayload {
        // When the metric changes and no unit was sent, let the new metric's
        // canonical unit win instead of carrying the stale one over.
        let unit = match (&self.unit, &self.metric) {
            (Some(unit), _) => Some(unit.clone()),
            (None, Some(_)) => None,
            (None, None) => Some(current.unit.as_str().to_string()),
        };
        MeasurementPayload {
            metric: Some(
                self.metric
                    .unwrap_or_else(|| current.metric.as_str().to_string()),
            ),
            value: Some(self.value.unwrap_or(current.value)),
            unit,
            timestamp: Some(self.timestamp.unwrap_or(current.timestamp)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeasurementOut {
    pub id: Uuid,
    pub user: Uuid,
    pub metric: Metric,
    pub value: f64,
    pub unit: MeasurementUnit,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<BodyMeasurement> for MeasurementOut {
    fn from(row: BodyMeasurement) -> Self {
        Self {
            id: row.id,
            user: row.user_id,
            metric: row.metric,
            value: row.value,
            unit: row.unit,
            timestamp: row.timestamp,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MeasurementListQuery {
    pub metric: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// `metrics` is a comma-separated list; defaults to the body-composition set.
#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub metrics: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ByMetricQuery {
    pub metric: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub metric: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrendPointOut {
    pub date: Date,
    pub value: f64,
    pub samples: i64,
}

impl From<TrendPoint> for TrendPointOut {
    fn from(point: TrendPoint) -> Self {
        Self {
            date: point.day,
            value: point.value,
            samples: point.samples,
        }
    }
}

/// Output of `GET /measurements/trends`.
#[derive(Debug, Serialize)]
pub struct TrendsOut {
    pub metric: Metric,
    pub period_days: i64,
    pub start_date: Date,
    pub end_date: Date,
    pub measurements: Vec<TrendPointOut>,
    pub count: usize,
}

/// Per-metric latest reading for the summary endpoint.
#[derive(Debug, Serialize)]
pub struct SummaryEntry {
    pub latest_value: f64,
    pub latest_date: Date,
    pub unit: MeasurementUnit,
}

pub type MeasurementSummary = BTreeMap<String, SummaryEntry>;

#[derive(Debug, Deserialize)]
pub struct BulkCreatePayload {
    pub measurements: Option<Vec<MeasurementPayload>>,
}

impl BulkCreatePayload {
    /// Validate every row; any failure rejects the whole batch with the
    /// offending row's index in the field key.
    pub fn validate(self) -> Result<Vec<MeasurementData>, ApiError> {
        let Some(measurements) = self.measurements else {
            return Err(ApiError::field("measurements", "This field is required."));
        };
        if measurements.is_empty() {
            return Err(ApiError::field("measurements", "This list may not be empty."));
        }
        let mut errors = FieldErrors::new();
        let mut validated = Vec::with_capacity(measurements.len());
        for (index, payload) in measurements.into_iter().enumerate() {
            match payload.validate() {
                Ok(data) => validated.push(data),
                Err(ApiError::Validation(fields)) => {
                    let json = serde_json::to_value(&fields).unwrap_or_default();
                    if let Some(map) = json.as_object() {
                        for (field, messages) in map {
                            if let Some(messages) = messages.as_array() {
                                for message in messages {
                                    if let Some(message) = message.as_str() {
                                        errors.push(
                                            &format!("measurements[{index}].{field}"),
                                            message,
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
                Err(other) => return Err(other),
            }
        }
        errors.into_result()?;
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn measurement(metric: &str, unit: Option<&str>) -> MeasurementPayload {
        MeasurementPayload {
            metric: Some(metric.into()),
            value: Some(75.0),
            unit: unit.map(Into::into),
            timestamp: Some(datetime!(2025-07-01 08:00 UTC)),
        }
    }

    #[test]
    fn unit_defaults_to_canonical() {
        let data = measurement("weight_kg", None).validate().unwrap();
        assert_eq!(data.unit, MeasurementUnit::Kg);
        let data = measurement("body_fat_percentage", None).validate().unwrap();
        assert_eq!(data.unit, MeasurementUnit::Percent);
    }

    #[test]
    fn mismatched_unit_is_rejected() {
        let err = measurement("weight_kg", Some("percent")).validate();
        let Err(ApiError::Validation(errors)) = err else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["unit"][0], "Unit must be \"kg\" for metric \"weight_kg\".");
    }

    #[test]
    fn matching_unit_is_accepted() {
        let data = measurement("waist_cm", Some("cm")).validate().unwrap();
        assert_eq!(data.unit, MeasurementUnit::Cm);
    }

    #[test]
    fn missing_required_fields_all_reported() {
        let payload = MeasurementPayload {
            metric: None,
            value: None,
            unit: None,
            timestamp: None,
        };
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json.get("metric").is_some());
        assert!(json.get("value").is_some());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn bulk_create_rejects_whole_batch_on_one_bad_row() {
        let payload = BulkCreatePayload {
            measurements: Some(vec![
                measurement("weight_kg", None),
                MeasurementPayload {
                    metric: Some("weight_kg".into()),
                    value: Some(-5.0),
                    unit: None,
                    timestamp: Some(datetime!(2025-07-01 08:00 UTC)),
                },
            ]),
        };
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json.get("measurements[1].value").is_some());
    }

    #[test]
    fn bulk_create_requires_rows() {
        assert!(BulkCreatePayload { measurements: None }.validate().is_err());
        assert!(BulkCreatePayload {
            measurements: Some(vec![])
        }
        .validate()
        .is_err());
    }

    #[test]
    fn goal_requires_type_and_target_date() {
        let payload = GoalPayload {
            goal_type: Some("get_swole".into()),
            target_date: None,
            notes: None,
            is_active: false,
        };
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["goal_type"][0], "\"get_swole\" is not a valid choice.");
        assert_eq!(json["target_date"][0], "This field is required.");
    }

    #[test]
    fn goal_patch_keeps_existing_fields() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let current = Goal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            goal_type: GoalType::WeightLoss,
            target_date: date!(2025 - 12 - 31),
            notes: Some("cut to 80kg".into()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let patch = GoalPatch {
            goal_type: None,
            target_date: None,
            notes: None,
            is_active: Some(false),
        };
        let data = patch.merge_into(&current).validate().unwrap();
        assert_eq!(data.goal_type, GoalType::WeightLoss);
        assert_eq!(data.target_date, date!(2025 - 12 - 31));
        assert!(!data.is_active);
    }
}
