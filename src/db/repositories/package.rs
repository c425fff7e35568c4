//! Package repository
//!
//! Database operations for packages.
//!
//! This module provides:
//! - `PackageRepository` trait defining the interface for package data access
//! - `SqlxPackageRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::Package;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const PACKAGE_COLUMNS: &str =
    "id, name, slug, description, repository_url, creator_id, created_at, updated_at";

/// Package repository trait
#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// Create a new package
    async fn create(&self, package: &Package) -> Result<Package>;

    /// Get package by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Package>>;

    /// Check whether a slug is taken
    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// List packages, newest first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Package>>;

    /// Count all packages
    async fn count(&self) -> Result<i64>;

    /// Update name, description and repository URL
    async fn update(&self, package: &Package) -> Result<Package>;

    /// Delete a package
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based package repository implementation
pub struct SqlxPackageRepository {
    pool: DynDatabasePool,
}

impl SqlxPackageRepository {
    /// Create a new SQLx package repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PackageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PackageRepository for SqlxPackageRepository {
    async fn create(&self, package: &Package) -> Result<Package> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_package_sqlite(sqlite(self.pool.as_ref())?, package).await,
            DatabaseDriver::Mysql => create_package_mysql(mysql(self.pool.as_ref())?, package).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Package>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_package_by_id_sqlite(sqlite(self.pool.as_ref())?, id).await,
            DatabaseDriver::Mysql => get_package_by_id_mysql(mysql(self.pool.as_ref())?, id).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM packages WHERE slug = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .fetch_one(sqlite(self.pool.as_ref())?)
                .await
                .context("Failed to check package slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .fetch_one(mysql(self.pool.as_ref())?)
                .await
                .context("Failed to check package slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Package>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_packages_sqlite(sqlite(self.pool.as_ref())?, offset, limit).await
            }
            DatabaseDriver::Mysql => {
                list_packages_mysql(mysql(self.pool.as_ref())?, offset, limit).await
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM packages";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(sqlite(self.pool.as_ref())?)
                .await
                .context("Failed to count packages")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(mysql(self.pool.as_ref())?)
                .await
                .context("Failed to count packages")?
                .get("count"),
        };
        Ok(count)
    }

    async fn update(&self, package: &Package) -> Result<Package> {
        let now = Utc::now();
        let sql = r#"
            UPDATE packages
            SET name = ?, description = ?, repository_url = ?, updated_at = ?
            WHERE id = ?
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&package.name)
                    .bind(&package.description)
                    .bind(&package.repository_url)
                    .bind(now)
                    .bind(package.id)
                    .execute(sqlite(self.pool.as_ref())?)
                    .await
                    .context("Failed to update package")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&package.name)
                    .bind(&package.description)
                    .bind(&package.repository_url)
                    .bind(now)
                    .bind(package.id)
                    .execute(mysql(self.pool.as_ref())?)
                    .await
                    .context("Failed to update package")?;
            }
        }

        self.get_by_id(package.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Package not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM packages WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(sqlite(self.pool.as_ref())?)
                    .await
                    .context("Failed to delete package")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(mysql(self.pool.as_ref())?)
                    .await
                    .context("Failed to delete package")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_package_sqlite(pool: &SqlitePool, package: &Package) -> Result<Package> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO packages (name, slug, description, repository_url, creator_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&package.name)
    .bind(&package.slug)
    .bind(&package.description)
    .bind(&package.repository_url)
    .bind(package.creator_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create package")?;

    Ok(Package {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..package.clone()
    })
}

async fn get_package_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Package>> {
    let sql = format!("SELECT {} FROM packages WHERE id = ?", PACKAGE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get package by ID")?;

    Ok(row.as_ref().map(row_to_package_sqlite))
}

async fn list_packages_sqlite(pool: &SqlitePool, offset: i64, limit: i64) -> Result<Vec<Package>> {
    let sql = format!(
        "SELECT {} FROM packages ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        PACKAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list packages")?;

    Ok(rows.iter().map(row_to_package_sqlite).collect())
}

fn row_to_package_sqlite(row: &sqlx::sqlite::SqliteRow) -> Package {
    Package {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        repository_url: row.get("repository_url"),
        creator_id: row.get("creator_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_package_mysql(pool: &MySqlPool, package: &Package) -> Result<Package> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO packages (name, slug, description, repository_url, creator_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&package.name)
    .bind(&package.slug)
    .bind(&package.description)
    .bind(&package.repository_url)
    .bind(package.creator_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create package")?;

    Ok(Package {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..package.clone()
    })
}

async fn get_package_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Package>> {
    let sql = format!("SELECT {} FROM packages WHERE id = ?", PACKAGE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get package by ID")?;

    Ok(row.as_ref().map(row_to_package_mysql))
}

async fn list_packages_mysql(pool: &MySqlPool, offset: i64, limit: i64) -> Result<Vec<Package>> {
    let sql = format!(
        "SELECT {} FROM packages ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        PACKAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list packages")?;

    Ok(rows.iter().map(row_to_package_mysql).collect())
}

fn row_to_package_mysql(row: &sqlx::mysql::MySqlRow) -> Package {
    Package {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        repository_url: row.get("repository_url"),
        creator_id: row.get("creator_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxPackageRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "maker".to_string(),
                "maker@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .expect("Failed to create user");
        (SqlxPackageRepository::new(pool), user.id)
    }

    fn package(slug: &str, creator_id: i64) -> Package {
        Package::new(
            slug.to_uppercase(),
            slug.to_string(),
            "A package".to_string(),
            None,
            creator_id,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, user_id) = setup().await;

        let created = repo.create(&package("geo", user_id)).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().expect("Package not found");

        assert_eq!(found.name, "GEO");
        assert_eq!(found.creator_id, user_id);
        assert!(found.repository_url.is_none());
        assert!(repo.exists_by_slug("geo").await.unwrap());
        assert!(!repo.exists_by_slug("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_offset() {
        let (repo, user_id) = setup().await;
        for slug in ["a", "b", "c"] {
            repo.create(&package(slug, user_id)).await.unwrap();
        }

        let first: Vec<String> = repo.list(0, 2).await.unwrap().into_iter().map(|p| p.slug).collect();
        let rest: Vec<String> = repo.list(2, 2).await.unwrap().into_iter().map(|p| p.slug).collect();

        assert_eq!(first, vec!["c", "b"]);
        assert_eq!(rest, vec!["a"]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, user_id) = setup().await;
        let mut created = repo.create(&package("geo", user_id)).await.unwrap();

        created.description = "Updated".to_string();
        created.repository_url = Some("https://example.com/geo".to_string());
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.description, "Updated");
        assert_eq!(updated.repository_url.as_deref(), Some("https://example.com/geo"));

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
