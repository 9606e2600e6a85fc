use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::order::OrderStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GoldsmithLoad {
    pub goldsmith_id: String,
    pub orders: u64,
}

/// Order volume per status and per assigned goldsmith.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderReport {
    pub by_status: BTreeMap<&'static str, u64>,
    pub total: u64,
    pub by_goldsmith: Vec<GoldsmithLoad>,
    pub unassigned: u64,
    pub generated_at: DateTime<Utc>,
}

impl OrderReport {
    /// Every status key is present, zero when no order carries it.
    pub fn build(
        status_counts: impl IntoIterator<Item = (OrderStatus, u64)>,
        goldsmith_counts: impl IntoIterator<Item = (Option<String>, u64)>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut by_status: BTreeMap<&'static str, u64> =
            OrderStatus::ALL.iter().map(|status| (status.as_str(), 0)).collect();
        for (status, count) in status_counts {
            *by_status.entry(status.as_str()).or_default() += count;
        }
        let total = by_status.values().sum();

        let mut unassigned = 0;
        let mut by_goldsmith = Vec::new();
        for (goldsmith_id, orders) in goldsmith_counts {
            match goldsmith_id {
                Some(goldsmith_id) => by_goldsmith.push(GoldsmithLoad { goldsmith_id, orders }),
                None => unassigned += orders,
            }
        }
        by_goldsmith.sort_by(|left, right| {
            right.orders.cmp(&left.orders).then_with(|| left.goldsmith_id.cmp(&right.goldsmith_id))
        });

        Self { by_status, total, by_goldsmith, unassigned, generated_at }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::OrderReport;
    use crate::domain::order::OrderStatus;

    #[test]
    fn report_zero_fills_every_status() {
        let report = OrderReport::build(
            vec![(OrderStatus::New, 3), (OrderStatus::Shipped, 1)],
            vec![(None, 3), (Some("GSM-1".to_string()), 1)],
            Utc::now(),
        );

        assert_eq!(report.by_status.len(), OrderStatus::ALL.len());
        assert_eq!(report.by_status["new"], 3);
        assert_eq!(report.by_status["cancelled"], 0);
        assert_eq!(report.total, 4);
        assert_eq!(report.unassigned, 3);
        assert_eq!(report.by_goldsmith.len(), 1);
    }

    #[test]
    fn busiest_goldsmith_is_listed_first() {
        let report = OrderReport::build(
            Vec::new(),
            vec![(Some("GSM-a".to_string()), 1), (Some("GSM-b".to_string()), 5)],
            Utc::now(),
        );

        assert_eq!(report.total, 0);
        assert_eq!(report.by_goldsmith[0].goldsmith_id, "GSM-b");
    }
}
