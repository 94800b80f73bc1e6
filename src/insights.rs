//! Customer insight generation.
//!
//! The generator is a placeholder collaborator: it waits a fixed delay and
//! returns canned text. No model is consulted.

use crate::models::CustomerRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub customer_id: String,
    /// Behavior summary.
    pub summary: String,
    pub opportunities: Vec<String>,
    pub next_action: String,
    pub retention_score: u8,
    pub predicted_next_order: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InsightGenerator {
    delay: Duration,
}

impl InsightGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn generate(&self, customer: &CustomerRecord) -> Insight {
        tracing::info!(
            "Generating insight for customer {} (stub, {}ms delay)",
            customer.id,
            self.delay.as_millis()
        );
        tokio::time::sleep(self.delay).await;

        Insight {
            customer_id: customer.id.clone(),
            summary: "Cliente fiel com preferência por pratos veganos. Costuma pedir nos fins de semana."
                .to_string(),
            opportunities: vec![
                "Oferecer sobremesa vegana".to_string(),
                "Cupom para dias de semana".to_string(),
            ],
            next_action: "Enviar mensagem perguntando sobre o último pedido".to_string(),
            retention_score: 85,
            predicted_next_order: "Sexta-feira".to_string(),
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_generate_waits_then_returns_static_insight() {
        let generator = InsightGenerator::new(Duration::from_secs(2));
        let customer = CustomerRecord {
            id: "c42".into(),
            ..Default::default()
        };

        let started = tokio::time::Instant::now();
        let insight = generator.generate(&customer).await;

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(insight.customer_id, "c42");
        assert_eq!(insight.opportunities.len(), 2);
        assert!(!insight.next_action.is_empty());
    }
}
