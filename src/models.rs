use crate::errors::AppError;
use crate::normalize::{
    lenient_amount, lenient_count, lenient_date, lenient_evaluation, lenient_flag, lenient_id,
    lenient_score, lenient_string, lenient_tags,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};

// ============ Customer Records ============

/// Customer as stored by the external CRM store.
///
/// The service never creates or mutates records; it only derives views from
/// snapshots of them. Deserialization is lenient: missing numbers read as
/// zero and missing or malformed dates read as `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct CustomerRecord {
    /// Opaque identifier (`_id` accepted, including `{"$oid": ...}`).
    #[serde(alias = "_id", default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub whatsapp: String,
    /// Acquisition channel.
    #[serde(default, deserialize_with = "lenient_string")]
    pub origin: String,
    #[serde(default, deserialize_with = "lenient_tags")]
    #[schema(value_type = Vec<String>)]
    pub tags: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_orders: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_visits: u64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub average_ticket: f64,
    /// Accumulated spend, same currency unit as `average_ticket`.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub consumption: f64,
    /// Engagement score, nominally 0-100.
    #[serde(default, deserialize_with = "lenient_score")]
    pub lead_score: f64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub customer_since: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub first_visit_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_visit_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub first_order_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_order_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_evaluation")]
    pub evaluation: Option<Evaluation>,
    /// Active flag kept for display.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub status: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub male: Option<bool>,
}

impl CustomerRecord {
    /// Total visits plus total orders, the loyalty proxy used by the fan segments.
    pub fn interaction_count(&self) -> u64 {
        self.total_visits.saturating_add(self.total_orders)
    }

    /// Builds a record from a stored JSON document, falling back to the
    /// storage key when the document carries no identifier of its own.
    pub fn from_document(key: &str, document: Value) -> Result<Self, serde_json::Error> {
        if !document.is_object() {
            return Err(serde::de::Error::custom(format!(
                "customer document must be an object, got {}",
                json_kind(&document)
            )));
        }
        let mut record: CustomerRecord = serde_json::from_value(document)?;
        if record.id.is_empty() {
            record.id = key.to_string();
        }
        Ok(record)
    }
}

/// Customer satisfaction feedback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Evaluation {
    /// 0 to 5.
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub comment: String,
}

/// Validates a caller-supplied batch of customers.
///
/// A batch must be a JSON array of objects. Anything else is a contract
/// violation and is reported to the caller; individual field problems inside
/// the objects are normalized away instead.
pub fn parse_customer_batch(value: Value) -> Result<Vec<CustomerRecord>, AppError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(AppError::BadRequest(format!(
                "Expected a JSON array of customer records, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            if !item.is_object() {
                return Err(AppError::BadRequest(format!(
                    "Customer at index {} must be an object, got {}",
                    idx,
                    json_kind(&item)
                )));
            }
            serde_json::from_value(item).map_err(|e| {
                AppError::BadRequest(format!("Customer at index {} is invalid: {}", idx, e))
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============ API Query Models ============

/// Optional reference instant for derived views.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AsOfQuery {
    /// RFC 3339 instant; defaults to the current time.
    pub as_of: Option<String>,
}

/// Parameters for the acquisition trend series.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendQuery {
    /// One of `7d`, `30d`, `90d`, `180d`, `365d`. Defaults to `90d`.
    pub range: Option<String>,
    /// RFC 3339 instant; defaults to the current time.
    pub as_of: Option<String>,
}

/// Parses an optional `as_of` query value.
pub fn parse_as_of(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| AppError::BadRequest(format!("Invalid as_of timestamp: {}", s))),
    }
}
