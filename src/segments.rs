//! Fixed customer segments for the lists screen.
//!
//! Six named segments, each a predicate over one customer and a reference
//! instant. Predicates are evaluated independently so a customer may belong
//! to several segments, except that the three interaction-count segments
//! partition customers with at least one interaction.

use crate::models::CustomerRecord;
use crate::normalize::days_before;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

/// Average ticket above which a customer is a top spender.
pub const TOP_SPENDER_TICKET: f64 = 100.0;
/// Sign-up recency window for "Novos Clientes".
pub const NEW_CUSTOMER_DAYS: i64 = 7;
/// Visit inactivity after which a customer is at risk.
pub const AT_RISK_DAYS: i64 = 30;
/// Upper bound (inclusive) of the "Novos Fans" interaction bucket.
pub const NEW_FAN_MAX_INTERACTIONS: u64 = 5;
/// Upper bound (inclusive) of the "Fans 10+" interaction bucket.
pub const LOYAL_FAN_MAX_INTERACTIONS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    TopSpenders,
    NovosClientes,
    EmRisco,
    NovosFans,
    Fans10Plus,
    SuperFans,
}

impl Segment {
    /// Display order.
    pub const ALL: [Segment; 6] = [
        Segment::TopSpenders,
        Segment::NovosClientes,
        Segment::EmRisco,
        Segment::NovosFans,
        Segment::Fans10Plus,
        Segment::SuperFans,
    ];

    pub fn id(self) -> u8 {
        match self {
            Segment::TopSpenders => 1,
            Segment::NovosClientes => 2,
            Segment::EmRisco => 3,
            Segment::NovosFans => 4,
            Segment::Fans10Plus => 5,
            Segment::SuperFans => 6,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Segment::TopSpenders => "top-spenders",
            Segment::NovosClientes => "novos-clientes",
            Segment::EmRisco => "em-risco",
            Segment::NovosFans => "novos-fans",
            Segment::Fans10Plus => "fans-10-plus",
            Segment::SuperFans => "super-fans",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Segment> {
        Segment::ALL.into_iter().find(|s| s.slug() == slug)
    }

    pub fn name(self) -> &'static str {
        match self {
            Segment::TopSpenders => "Top Spenders",
            Segment::NovosClientes => "Novos Clientes",
            Segment::EmRisco => "Em Risco",
            Segment::NovosFans => "Novos Fans",
            Segment::Fans10Plus => "Fans 10+",
            Segment::SuperFans => "Super Fans",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Segment::TopSpenders => "Ticket médio > R$ 100",
            Segment::NovosClientes => "Últimos 7 dias",
            Segment::EmRisco => "Inativos há +30 dias",
            Segment::NovosFans => "Até 5 visitas/pedidos",
            Segment::Fans10Plus => "Entre 6 e 10 visitas/pedidos",
            Segment::SuperFans => "Mais de 10 visitas/pedidos",
        }
    }

    pub fn tag_labels(self) -> &'static [&'static str] {
        match self {
            Segment::TopSpenders => &["lucrativo"],
            Segment::NovosClientes => &["recente"],
            Segment::EmRisco => &["churn"],
            Segment::NovosFans => &["promessa"],
            Segment::Fans10Plus => &["fiel"],
            Segment::SuperFans => &["vip"],
        }
    }

    /// Accent color used by the lists screen.
    pub fn color(self) -> &'static str {
        match self {
            Segment::TopSpenders => "#4caf50",
            Segment::NovosClientes => "#03a9f4",
            Segment::EmRisco => "#ff9800",
            Segment::NovosFans => "#e91e63",
            Segment::Fans10Plus => "#9c27b0",
            Segment::SuperFans => "#f44336",
        }
    }

    /// Membership predicate. Date-bounded segments exclude customers whose
    /// date is absent.
    pub fn matches(self, customer: &CustomerRecord, now: DateTime<Utc>) -> bool {
        let interactions = customer.interaction_count();
        match self {
            Segment::TopSpenders => customer.average_ticket > TOP_SPENDER_TICKET,
            Segment::NovosClientes => customer
                .customer_since
                .is_some_and(|since| since >= days_before(now, NEW_CUSTOMER_DAYS)),
            // Visit recency only; last_order_date is not consulted.
            Segment::EmRisco => customer
                .last_visit_date
                .is_some_and(|visit| visit < days_before(now, AT_RISK_DAYS)),
            Segment::NovosFans => interactions > 0 && interactions <= NEW_FAN_MAX_INTERACTIONS,
            Segment::Fans10Plus => {
                interactions > NEW_FAN_MAX_INTERACTIONS
                    && interactions <= LOYAL_FAN_MAX_INTERACTIONS
            }
            Segment::SuperFans => interactions > LOYAL_FAN_MAX_INTERACTIONS,
        }
    }
}

/// One segment card: identity, copy and member count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResult {
    pub id: u8,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub count: usize,
    #[schema(value_type = Vec<String>)]
    pub tag_labels: BTreeSet<String>,
    pub color: String,
}

impl SegmentResult {
    fn new(segment: Segment, count: usize) -> Self {
        Self {
            id: segment.id(),
            slug: segment.slug().to_string(),
            name: segment.name().to_string(),
            description: segment.description().to_string(),
            count,
            tag_labels: segment.tag_labels().iter().map(|t| t.to_string()).collect(),
            color: segment.color().to_string(),
        }
    }
}

/// Counts every segment over the snapshot, in display order.
///
/// Always returns six entries; an empty snapshot yields six zero counts.
pub fn compute_segments(customers: &[CustomerRecord], now: DateTime<Utc>) -> Vec<SegmentResult> {
    let mut counts = [0usize; Segment::ALL.len()];

    for customer in customers {
        for (slot, segment) in counts.iter_mut().zip(Segment::ALL) {
            if segment.matches(customer, now) {
                *slot += 1;
            }
        }
    }

    Segment::ALL
        .into_iter()
        .zip(counts)
        .map(|(segment, count)| SegmentResult::new(segment, count))
        .collect()
}

/// Segments a single customer belongs to, in display order.
pub fn segments_for(customer: &CustomerRecord, now: DateTime<Utc>) -> Vec<Segment> {
    Segment::ALL
        .into_iter()
        .filter(|segment| segment.matches(customer, now))
        .collect()
}

/// Members of `segment`, in input order.
pub fn segment_members<'a>(
    customers: &'a [CustomerRecord],
    segment: Segment,
    now: DateTime<Utc>,
) -> Vec<&'a CustomerRecord> {
    customers
        .iter()
        .filter(|customer| segment.matches(customer, now))
        .collect()
}
