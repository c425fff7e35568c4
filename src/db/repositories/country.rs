//! Country repository
//!
//! Countries are reference data maintained by administrators. Each one maps
//! a name and ISO code onto a geographic scope.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::Country;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CountryRepository: Send + Sync {
    async fn create(&self, country: &Country) -> Result<Country>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Country>>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Country>>;

    /// All countries ordered by name
    async fn list(&self) -> Result<Vec<Country>>;

    async fn update(&self, country: &Country) -> Result<Country>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxCountryRepository {
    pool: DynDatabasePool,
}

impl SqlxCountryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CountryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CountryRepository for SqlxCountryRepository {
    async fn create(&self, country: &Country) -> Result<Country> {
        let sql = "INSERT INTO countries (name, code, scope) VALUES (?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&country.name)
                .bind(&country.code)
                .bind(&country.scope)
                .execute(sqlite(self.pool.as_ref())?)
                .await
                .context("Failed to create country")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&country.name)
                .bind(&country.code)
                .bind(&country.scope)
                .execute(mysql(self.pool.as_ref())?)
                .await
                .context("Failed to create country")?
                .last_insert_id() as i64,
        };

        Ok(Country {
            id,
            ..country.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Country>> {
        let sql = "SELECT id, name, code, scope FROM countries WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(sqlite(self.pool.as_ref())?)
                    .await
                    .context("Failed to get country by ID")?;
                Ok(row.as_ref().map(row_to_country_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(mysql(self.pool.as_ref())?)
                    .await
                    .context("Failed to get country by ID")?;
                Ok(row.as_ref().map(row_to_country_mysql))
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Country>> {
        let sql = "SELECT id, name, code, scope FROM countries WHERE code = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(code)
                    .fetch_optional(sqlite(self.pool.as_ref())?)
                    .await
                    .context("Failed to get country by code")?;
                Ok(row.as_ref().map(row_to_country_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(code)
                    .fetch_optional(mysql(self.pool.as_ref())?)
                    .await
                    .context("Failed to get country by code")?;
                Ok(row.as_ref().map(row_to_country_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Country>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_countries_sqlite(sqlite(self.pool.as_ref())?).await,
            DatabaseDriver::Mysql => list_countries_mysql(mysql(self.pool.as_ref())?).await,
        }
    }

    async fn update(&self, country: &Country) -> Result<Country> {
        let sql = "UPDATE countries SET name = ?, code = ?, scope = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&country.name)
                    .bind(&country.code)
                    .bind(&country.scope)
                    .bind(country.id)
                    .execute(sqlite(self.pool.as_ref())?)
                    .await
                    .context("Failed to update country")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&country.name)
                    .bind(&country.code)
                    .bind(&country.scope)
                    .bind(country.id)
                    .execute(mysql(self.pool.as_ref())?)
                    .await
                    .context("Failed to update country")?;
            }
        }
        Ok(country.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM countries WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(sqlite(self.pool.as_ref())?)
                    .await
                    .context("Failed to delete country")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(mysql(self.pool.as_ref())?)
                    .await
                    .context("Failed to delete country")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_countries_sqlite(pool: &SqlitePool) -> Result<Vec<Country>> {
    let rows = sqlx::query("SELECT id, name, code, scope FROM countries ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("Failed to list countries")?;

    Ok(rows.iter().map(row_to_country_sqlite).collect())
}

pub(crate) fn row_to_country_sqlite(row: &sqlx::sqlite::SqliteRow) -> Country {
    Country {
        id: row.get("id"),
        name: row.get("name"),
        code: row.get("code"),
        scope: row.get("scope"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_countries_mysql(pool: &MySqlPool) -> Result<Vec<Country>> {
    let rows = sqlx::query("SELECT id, name, code, scope FROM countries ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("Failed to list countries")?;

    Ok(rows.iter().map(row_to_country_mysql).collect())
}

pub(crate) fn row_to_country_mysql(row: &sqlx::mysql::MySqlRow) -> Country {
    Country {
        id: row.get("id"),
        name: row.get("name"),
        code: row.get("code"),
        scope: row.get("scope"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCountryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCountryRepository::new(pool)
    }

    fn country(name: &str, code: &str, scope: &str) -> Country {
        Country {
            id: 0,
            name: name.to_string(),
            code: code.to_string(),
            scope: scope.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_sorted() {
        let repo = setup_test_repo().await;
        repo.create(&country("Kenya", "KE", "africa")).await.unwrap();
        repo.create(&country("Brazil", "BR", "latam")).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Brazil", "Kenya"]);
    }

    #[tokio::test]
    async fn test_code_is_unique() {
        let repo = setup_test_repo().await;
        repo.create(&country("Kenya", "KE", "africa")).await.unwrap();

        assert!(repo.create(&country("Other", "KE", "africa")).await.is_err());
        assert_eq!(repo.get_by_code("KE").await.unwrap().map(|c| c.name), Some("Kenya".to_string()));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&country("Kenya", "KE", "africa")).await.unwrap();

        created.scope = "east-africa".to_string();
        repo.update(&created).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.scope, "east-africa");

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
