//! Customer acquisition history for the overview chart.

use crate::models::CustomerRecord;
use crate::normalize::days_before;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Selectable look-back windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum TrendRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[default]
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "180d")]
    HalfYear,
    #[serde(rename = "365d")]
    Year,
}

impl TrendRange {
    pub fn days(self) -> i64 {
        match self {
            TrendRange::Week => 7,
            TrendRange::Month => 30,
            TrendRange::Quarter => 90,
            TrendRange::HalfYear => 180,
            TrendRange::Year => 365,
        }
    }
}

impl FromStr for TrendRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7d" => Ok(TrendRange::Week),
            "30d" => Ok(TrendRange::Month),
            "90d" => Ok(TrendRange::Quarter),
            "180d" => Ok(TrendRange::HalfYear),
            "365d" => Ok(TrendRange::Year),
            other => Err(format!(
                "Invalid range '{}': expected one of 7d, 30d, 90d, 180d, 365d",
                other
            )),
        }
    }
}

impl fmt::Display for TrendRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

/// New customers and their mean ticket for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub new_customers: usize,
    pub average_ticket: f64,
}

/// Daily acquisition series over `[now - range, now]`, ascending by date.
///
/// Customers without a `created_at` are skipped; days without sign-ups are
/// not emitted.
pub fn acquisition_trend(
    customers: &[CustomerRecord],
    now: DateTime<Utc>,
    range: TrendRange,
) -> Vec<TrendPoint> {
    let start = days_before(now, range.days());
    let mut days: BTreeMap<NaiveDate, (usize, f64)> = BTreeMap::new();

    for customer in customers {
        let Some(created) = customer.created_at else {
            continue;
        };
        if created < start || created > now {
            continue;
        }
        let entry = days.entry(created.date_naive()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += customer.average_ticket;
    }

    days.into_iter()
        .map(|(date, (count, ticket_sum))| TrendPoint {
            date,
            new_customers: count,
            average_ticket: ticket_sum / count as f64,
        })
        .collect()
}
