use goldsmith_core::domain::partner::{
    Customer, CustomerId, Goldsmith, GoldsmithId, PartnerStatus,
};

use super::{
    decode, parse_timestamp, CustomerRepository, GoldsmithRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub struct SqlGoldsmithRepository {
    pool: DbPool,
}

impl SqlGoldsmithRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, RepositoryError> {
    let id: String = decode(row, "id")?;
    let name: String = decode(row, "name")?;
    let email: String = decode(row, "email")?;
    let created_at: String = decode(row, "created_at")?;

    Ok(Customer {
        id: CustomerId(id),
        name,
        email,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn row_to_goldsmith(row: &sqlx::sqlite::SqliteRow) -> Result<Goldsmith, RepositoryError> {
    let id: String = decode(row, "id")?;
    let name: String = decode(row, "name")?;
    let email: String = decode(row, "email")?;
    let city: String = decode(row, "city")?;
    let specialties_json: String = decode(row, "specialties_json")?;
    let status: String = decode(row, "status")?;
    let created_at: String = decode(row, "created_at")?;
    let updated_at: String = decode(row, "updated_at")?;

    let specialties: Vec<String> = serde_json::from_str(&specialties_json)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let status = status
        .parse::<PartnerStatus>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Goldsmith {
        id: GoldsmithId(id),
        name,
        email,
        city,
        specialties,
        status,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn insert(&self, customer: &Customer) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO customer (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(&customer.id.0)
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(customer.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM customer WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_customer).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM customer WHERE email = ?")
            .bind(email.trim().to_ascii_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_customer).transpose()
    }
}

#[async_trait::async_trait]
impl GoldsmithRepository for SqlGoldsmithRepository {
    async fn save(&self, goldsmith: &Goldsmith) -> Result<(), RepositoryError> {
        let specialties_json = serde_json::to_string(&goldsmith.specialties)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO goldsmith (id, name, email, city, specialties_json, status,
                                    created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 city = excluded.city,
                 specialties_json = excluded.specialties_json,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(&goldsmith.id.0)
        .bind(&goldsmith.name)
        .bind(&goldsmith.email)
        .bind(&goldsmith.city)
        .bind(specialties_json)
        .bind(goldsmith.status.as_str())
        .bind(goldsmith.created_at.to_rfc3339())
        .bind(goldsmith.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &GoldsmithId) -> Result<Option<Goldsmith>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, city, specialties_json, status, created_at, updated_at
             FROM goldsmith WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_goldsmith).transpose()
    }

    async fn list(&self, status: Option<PartnerStatus>) -> Result<Vec<Goldsmith>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(
                "SELECT id, name, email, city, specialties_json, status, created_at, updated_at
                 FROM goldsmith WHERE status = ?
                 ORDER BY name ASC",
            )
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, name, email, city, specialties_json, status, created_at, updated_at
                 FROM goldsmith
                 ORDER BY name ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_goldsmith).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use goldsmith_core::domain::partner::{Customer, Goldsmith, PartnerApplication, PartnerStatus};

    use super::{SqlCustomerRepository, SqlGoldsmithRepository};
    use crate::repositories::{CustomerRepository, GoldsmithRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn application(name: &str, email: &str) -> PartnerApplication {
        PartnerApplication {
            name: name.to_string(),
            email: email.to_string(),
            city: "Kochi".to_string(),
            specialties: vec!["temple jewellery".to_string()],
        }
    }

    #[tokio::test]
    async fn customer_lookup_by_email_is_case_insensitive() {
        let repo = SqlCustomerRepository::new(setup().await);
        let customer = Customer::register("Anya", "anya@example.com", Utc::now()).expect("valid");
        repo.insert(&customer).await.expect("insert");

        let found = repo.find_by_email("ANYA@example.com").await.expect("lookup");
        assert_eq!(found.map(|customer| customer.id), Some(customer.id));
    }

    #[tokio::test]
    async fn duplicate_customer_email_is_a_database_error() {
        let repo = SqlCustomerRepository::new(setup().await);
        let first = Customer::register("Anya", "anya@example.com", Utc::now()).expect("valid");
        let second = Customer::register("Anya B", "anya@example.com", Utc::now()).expect("valid");
        repo.insert(&first).await.expect("insert");

        let error = repo.insert(&second).await.expect_err("unique email");
        assert!(matches!(error, RepositoryError::Database(_)));
    }

    #[tokio::test]
    async fn moderation_upsert_changes_status_filter() {
        let repo = SqlGoldsmithRepository::new(setup().await);
        let mut goldsmith =
            Goldsmith::apply(application("Kanak Works", "kanak@example.com"), Utc::now())
                .expect("valid");
        let other =
            Goldsmith::apply(application("Bharat Gold", "bharat@example.com"), Utc::now())
                .expect("valid");
        repo.save(&goldsmith).await.expect("save");
        repo.save(&other).await.expect("save other");

        goldsmith.status = PartnerStatus::Approved;
        goldsmith.updated_at = Utc::now();
        repo.save(&goldsmith).await.expect("upsert");

        let approved = repo.list(Some(PartnerStatus::Approved)).await.expect("list");
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, goldsmith.id);
        assert_eq!(approved[0].specialties, vec!["temple jewellery".to_string()]);

        let everyone = repo.list(None).await.expect("list all");
        assert_eq!(everyone.len(), 2);
    }
}
