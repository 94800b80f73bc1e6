//! Headline KPIs for the overview screen.

use crate::models::CustomerRecord;
use crate::normalize::{days_before, group_thousands};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::ToSchema;

/// Look-back window, in days, for counting newly created customers.
pub const NEW_CUSTOMER_WINDOW_DAYS: i64 = 7;

/// Length of the top-customers ranking.
pub const TOP_CUSTOMERS_LIMIT: usize = 6;

/// Whether the collection held anything to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    Ok,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResult {
    pub status: DataStatus,
    pub total_customers: usize,
    /// Customers created within the last seven days (boundary inclusive).
    pub new_customers_count: usize,
    /// Unrounded sum of `consumption`.
    pub total_consumption: f64,
    /// `total_consumption / total_customers`; `None` without data.
    pub average_ticket: Option<f64>,
    pub average_lead_score: Option<f64>,
    /// Highest lead scores first, ties in input order.
    pub top_customers: Vec<CustomerRecord>,
}

impl MetricsResult {
    /// The designated result for an empty collection.
    pub fn insufficient_data() -> Self {
        Self {
            status: DataStatus::InsufficientData,
            total_customers: 0,
            new_customers_count: 0,
            total_consumption: 0.0,
            average_ticket: None,
            average_lead_score: None,
            top_customers: Vec::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.status == DataStatus::Ok
    }

    /// Card strings for the overview screen. Rounding happens here and only
    /// here; the numeric fields above stay at full precision.
    pub fn display(&self) -> Option<MetricsDisplay> {
        if !self.has_data() {
            return None;
        }
        Some(MetricsDisplay {
            total_customers: group_thousands(self.total_customers as u64),
            new_customers: format!("+{}", self.new_customers_count),
            total_revenue: format!("R$ {:.1}k", self.total_consumption / 1000.0),
            average_lead_score: format!("{:.1}", self.average_lead_score.unwrap_or(0.0)),
            average_ticket: format!("R$ {:.2}", self.average_ticket.unwrap_or(0.0)),
        })
    }
}

/// Display-ready KPI strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDisplay {
    pub total_customers: String,
    pub new_customers: String,
    pub total_revenue: String,
    pub average_lead_score: String,
    pub average_ticket: String,
}

/// Reduces a customer snapshot into the overview KPIs as of `now`.
///
/// Total over any input: missing numbers count as zero, records without a
/// parseable `created_at` are simply not new, and an empty slice yields
/// [`MetricsResult::insufficient_data`] instead of dividing by zero.
pub fn compute_metrics(customers: &[CustomerRecord], now: DateTime<Utc>) -> MetricsResult {
    if customers.is_empty() {
        return MetricsResult::insufficient_data();
    }

    let window_start = days_before(now, NEW_CUSTOMER_WINDOW_DAYS);

    let mut total_consumption = 0.0;
    let mut total_score = 0.0;
    let mut new_customers_count = 0;

    for customer in customers {
        total_consumption += customer.consumption;
        total_score += customer.lead_score;

        if customer
            .created_at
            .is_some_and(|created| created >= window_start)
        {
            new_customers_count += 1;
        }
    }

    MetricsResult {
        status: DataStatus::Ok,
        total_customers: customers.len(),
        new_customers_count,
        // Saturates instead of overflowing to infinity.
        total_consumption: total_consumption.min(f64::MAX),
        average_ticket: Some(mean(customers, total_consumption, |c| c.consumption)),
        average_lead_score: Some(mean(customers, total_score, |c| c.lead_score)),
        top_customers: top_by_lead_score(customers, TOP_CUSTOMERS_LIMIT),
    }
}

/// `sum / n`, or an incremental mean when `sum` overflowed. The incremental
/// form never exceeds the largest input magnitude, so finite inputs always
/// give a finite mean. `customers` must be non-empty.
fn mean<F>(customers: &[CustomerRecord], sum: f64, field: F) -> f64
where
    F: Fn(&CustomerRecord) -> f64,
{
    if sum.is_finite() {
        return sum / customers.len() as f64;
    }
    customers
        .iter()
        .enumerate()
        .fold(0.0, |acc, (i, customer)| {
            let n = (i + 1) as f64;
            acc - acc / n + field(customer) / n
        })
}

/// Stable descending ranking by lead score, truncated to `limit`.
///
/// Scores that compare equal (including `0.0` and `-0.0`) keep input order.
pub fn top_by_lead_score(customers: &[CustomerRecord], limit: usize) -> Vec<CustomerRecord> {
    let mut ranked: Vec<&CustomerRecord> = customers.iter().collect();
    ranked.sort_by(|a, b| {
        b.lead_score
            .partial_cmp(&a.lead_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked.into_iter().take(limit).cloned().collect()
}
