use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use goldsmith_core::domain::order::{OrderId, OrderRequest, OrderStatus};
use goldsmith_core::domain::partner::{Goldsmith, GoldsmithId, PartnerStatus};
use goldsmith_core::domain::pricing::{MetalPrice, MetalPriceStore, PriceFeedError};
use goldsmith_core::domain::settings::SiteSettings;
use goldsmith_core::flows::{Actor, ChangeKind, StatusChange};

use super::{
    Assignment, GoldsmithRepository, MetalPriceRepository, OrderFilter, OrderRepository,
    RepositoryError, SettingsRepository,
};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, OrderRequest>>,
    history: RwLock<Vec<StatusChange>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &OrderRequest) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<OrderRequest>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderRequest>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut listed: Vec<OrderRequest> =
            orders.values().filter(|order| filter.matches(order)).cloned().collect();
        listed.sort_by(|left, right| {
            right.requested_at.cmp(&left.requested_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(listed)
    }

    async fn record_status_change(
        &self,
        change: &StatusChange,
        assignee: Option<&GoldsmithId>,
    ) -> Result<Option<OrderRequest>, RepositoryError> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&change.order_id.0) else {
            return Ok(None);
        };
        if assignee.is_some_and(|goldsmith_id| !order.is_assigned_to(goldsmith_id)) {
            return Ok(None);
        }

        order.status = change.to;
        order.updated_at = change.changed_at;
        if change.kind != ChangeKind::Unchanged {
            self.history.write().await.push(change.clone());
        }
        Ok(Some(order.clone()))
    }

    async fn assign_goldsmith(
        &self,
        id: &OrderId,
        goldsmith_id: &GoldsmithId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Assignment, RepositoryError> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&id.0) else {
            return Ok(Assignment::Missing);
        };
        if order.status.is_terminal() {
            return Ok(Assignment::Closed(order.status));
        }

        let from = order.status;
        order.goldsmith_id = Some(goldsmith_id.clone());
        order.updated_at = order.change_timestamp(now);
        let change = (from == OrderStatus::New).then(|| {
            order.status = OrderStatus::PendingGoldsmithReview;
            StatusChange {
                order_id: order.id.clone(),
                from,
                to: order.status,
                kind: ChangeKind::classify(from, order.status),
                actor: actor.clone(),
                changed_at: order.updated_at,
            }
        });
        if let Some(change) = &change {
            self.history.write().await.push(change.clone());
        }
        Ok(Assignment::Assigned { order: order.clone(), change })
    }

    async fn list_history(&self, id: &OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        let history = self.history.read().await;
        Ok(history.iter().filter(|change| &change.order_id == id).cloned().collect())
    }

    async fn status_counts(&self) -> Result<Vec<(OrderStatus, u64)>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut counts: HashMap<OrderStatus, u64> = HashMap::new();
        for order in orders.values() {
            *counts.entry(order.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn goldsmith_counts(&self) -> Result<Vec<(Option<String>, u64)>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut counts: HashMap<Option<String>, u64> = HashMap::new();
        for order in orders.values() {
            *counts.entry(order.goldsmith_id.as_ref().map(|id| id.0.clone())).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[derive(Default)]
pub struct InMemoryGoldsmithRepository {
    goldsmiths: RwLock<HashMap<String, Goldsmith>>,
}

#[async_trait::async_trait]
impl GoldsmithRepository for InMemoryGoldsmithRepository {
    async fn save(&self, goldsmith: &Goldsmith) -> Result<(), RepositoryError> {
        let mut goldsmiths = self.goldsmiths.write().await;
        goldsmiths.insert(goldsmith.id.0.clone(), goldsmith.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &GoldsmithId) -> Result<Option<Goldsmith>, RepositoryError> {
        let goldsmiths = self.goldsmiths.read().await;
        Ok(goldsmiths.get(&id.0).cloned())
    }

    async fn list(&self, status: Option<PartnerStatus>) -> Result<Vec<Goldsmith>, RepositoryError> {
        let goldsmiths = self.goldsmiths.read().await;
        let mut listed: Vec<Goldsmith> = goldsmiths
            .values()
            .filter(|goldsmith| status.map_or(true, |status| goldsmith.status == status))
            .cloned()
            .collect();
        listed.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(listed)
    }
}

#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: RwLock<Option<SiteSettings>>,
}

#[async_trait::async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn load(&self) -> Result<Option<SiteSettings>, RepositoryError> {
        Ok(self.settings.read().await.clone())
    }

    async fn save(&self, settings: &SiteSettings) -> Result<(), RepositoryError> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMetalPriceRepository {
    prices: RwLock<HashMap<(String, String), MetalPrice>>,
}

#[async_trait::async_trait]
impl MetalPriceRepository for InMemoryMetalPriceRepository {
    async fn upsert(&self, price: &MetalPrice) -> Result<(), RepositoryError> {
        let mut prices = self.prices.write().await;
        prices.insert((price.metal.clone(), price.currency.clone()), price.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MetalPrice>, RepositoryError> {
        let prices = self.prices.read().await;
        let mut listed: Vec<MetalPrice> = prices.values().cloned().collect();
        listed.sort_by(|left, right| {
            left.metal.cmp(&right.metal).then_with(|| left.currency.cmp(&right.currency))
        });
        Ok(listed)
    }
}

#[async_trait::async_trait]
impl MetalPriceStore for InMemoryMetalPriceRepository {
    async fn upsert_price(&self, price: MetalPrice) -> Result<(), PriceFeedError> {
        self.upsert(&price).await.map_err(|error| PriceFeedError::Store(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use goldsmith_core::domain::order::{NewOrder, OrderId, OrderRequest, OrderStatus};
    use goldsmith_core::domain::partner::{
        CustomerId, Goldsmith, GoldsmithId, PartnerApplication, PartnerStatus,
    };
    use goldsmith_core::domain::pricing::{ingest_prices, PriceFeed, PriceFeedError};
    use goldsmith_core::domain::report::OrderReport;
    use goldsmith_core::flows::{Actor, ActorRole, ChangeKind, StatusChange};

    use crate::repositories::{
        Assignment, GoldsmithRepository, InMemoryGoldsmithRepository,
        InMemoryMetalPriceRepository, InMemoryOrderRepository, InMemorySettingsRepository,
        MetalPriceRepository, OrderFilter, OrderRepository, SettingsRepository,
    };

    fn order(item: &str) -> OrderRequest {
        OrderRequest::place(
            NewOrder {
                customer_id: CustomerId("CUS-1".to_string()),
                item: item.to_string(),
                details: "22k".to_string(),
                reference_image: None,
            },
            Utc::now() - Duration::hours(1),
        )
        .expect("valid order")
    }

    fn goldsmith(name: &str, email: &str) -> Goldsmith {
        Goldsmith::apply(
            PartnerApplication {
                name: name.to_string(),
                email: email.to_string(),
                city: "Thrissur".to_string(),
                specialties: vec!["temple jewellery".to_string()],
            },
            Utc::now(),
        )
        .expect("valid application")
    }

    struct TableFeed(HashMap<&'static str, Decimal>);

    #[async_trait::async_trait]
    impl PriceFeed for TableFeed {
        async fn fetch(&self, metal: &str, _currency: &str) -> Result<Decimal, PriceFeedError> {
            self.0.get(metal).copied().ok_or(PriceFeedError::Status { status: 404 })
        }
    }

    #[tokio::test]
    async fn in_memory_order_repo_updates_and_reports() {
        let repo = InMemoryOrderRepository::default();
        let first = order("Anklet");
        let second = order("Nose pin");
        repo.insert(&first).await.expect("insert");
        repo.insert(&second).await.expect("insert");

        let admin = Actor::new(ActorRole::Admin, "ADM-1");
        let assignment = repo
            .assign_goldsmith(&first.id, &GoldsmithId("GSM-1".to_string()), &admin, Utc::now())
            .await
            .expect("assign");
        let Assignment::Assigned { order: assigned, change: Some(_) } = assignment else {
            panic!("new order should advance on assignment");
        };
        assert_eq!(assigned.status, OrderStatus::PendingGoldsmithReview);

        let missing = StatusChange {
            order_id: OrderId("ORD-none".to_string()),
            from: OrderStatus::New,
            to: OrderStatus::Shipped,
            kind: ChangeKind::Forward,
            actor: admin,
            changed_at: Utc::now(),
        };
        assert!(repo.record_status_change(&missing, None).await.expect("update").is_none());

        let report = OrderReport::build(
            repo.status_counts().await.expect("counts"),
            repo.goldsmith_counts().await.expect("loads"),
            Utc::now(),
        );
        assert_eq!(report.total, 2);
        assert_eq!(report.by_status["new"], 1);
        assert_eq!(report.unassigned, 1);

        assert_eq!(repo.list(&OrderFilter::default()).await.expect("list").len(), 2);
        assert_eq!(repo.list_history(&first.id).await.expect("history").len(), 1);
    }

    #[tokio::test]
    async fn in_memory_settings_repo_initialises_once() {
        let repo = InMemorySettingsRepository::default();
        let first = repo.load_or_init(Utc::now()).await.expect("init");
        let second = repo.load_or_init(Utc::now() + Duration::hours(1)).await.expect("reload");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn in_memory_goldsmith_repo_filters_by_status_in_name_order() {
        let repo = InMemoryGoldsmithRepository::default();
        let mut approved = goldsmith("Swarna Works", "swarna@example.com");
        approved.status = PartnerStatus::Approved;
        let pending = goldsmith("Kanchan Crafts", "kanchan@example.com");
        repo.save(&approved).await.expect("save approved");
        repo.save(&pending).await.expect("save pending");

        let listed = repo.list(Some(PartnerStatus::Approved)).await.expect("list approved");
        assert_eq!(listed, vec![approved.clone()]);

        let names: Vec<_> =
            repo.list(None).await.expect("list all").into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["Kanchan Crafts", "Swarna Works"]);

        let found = repo.find_by_id(&pending.id).await.expect("find").expect("exists");
        assert_eq!(found.status, PartnerStatus::Pending);
    }

    #[tokio::test]
    async fn ingestion_into_memory_store_keeps_latest_price_per_metal() {
        let store = InMemoryMetalPriceRepository::default();
        let metals = vec!["gold".to_string(), "silver".to_string(), "platinum".to_string()];

        let first = TableFeed(HashMap::from([
            ("gold", Decimal::new(7215, 2)),
            ("silver", Decimal::new(92, 2)),
        ]));
        let report = ingest_prices(&first, &store, &metals, "USD", Utc::now()).await;
        assert_eq!(report.updated.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].metal, "platinum");

        let second = TableFeed(HashMap::from([("gold", Decimal::new(7302, 2))]));
        ingest_prices(&second, &store, &metals, "USD", Utc::now()).await;

        let stored = store.list().await.expect("list");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].metal, "gold");
        assert_eq!(stored[0].price_per_gram, Decimal::new(7302, 2));
        assert_eq!(stored[1].price_per_gram, Decimal::new(92, 2));
    }
}
