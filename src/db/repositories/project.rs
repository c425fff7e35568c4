//! Project repository
//!
//! Database operations for projects and their many-to-many relations
//! (countries, collaborators, packages, tags).
//!
//! Every listing goes through [`ProjectRepository::find`], which turns a
//! [`ProjectQuery`] into one SQL statement. The statement is composed once
//! and its arguments are bound per driver.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::repositories::country::{row_to_country_mysql, row_to_country_sqlite};
use crate::db::DynDatabasePool;
use crate::models::{Project, ProjectQuery, ProjectRecord, ProjectStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;

const PROJECT_COLUMNS: &str = "p.id, p.name, p.slug, p.creator_id, p.status, p.is_active, \
    p.feature, p.started, p.description, p.challenges, p.audience, p.technologies, \
    p.metrics, p.num_users, p.repository_url, p.created_at, p.updated_at";

/// Project repository trait
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Insert a project and its relations
    async fn create(&self, record: &ProjectRecord) -> Result<Project>;

    /// Get project by ID with relations loaded
    async fn get_by_id(&self, id: i64) -> Result<Option<Project>>;

    /// Get project by slug with relations loaded
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Project>>;

    /// Check whether a slug is taken by any project other than `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Run a project query, most recently updated first
    async fn find(&self, query: &ProjectQuery, limit: Option<i64>) -> Result<Vec<Project>>;

    /// Overwrite a project's columns and replace its relations
    async fn update(&self, id: i64, record: &ProjectRecord) -> Result<Project>;

    /// Delete a project; relation rows cascade
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based project repository implementation
pub struct SqlxProjectRepository {
    pool: DynDatabasePool,
}

impl SqlxProjectRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProjectRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProjectRepository for SqlxProjectRepository {
    async fn create(&self, record: &ProjectRecord) -> Result<Project> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_project_sqlite(sqlite(self.pool.as_ref())?, record).await?,
            DatabaseDriver::Mysql => create_project_mysql(mysql(self.pool.as_ref())?, record).await?,
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Project not found after create"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects p WHERE p.id = ?", PROJECT_COLUMNS);
        let args = [QueryArg::Int(id)];
        let mut found = self.fetch(&sql, &args).await?;
        Ok(found.pop())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects p WHERE p.slug = ?", PROJECT_COLUMNS);
        let args = [QueryArg::Text(slug.to_string())];
        let mut found = self.fetch(&sql, &args).await?;
        Ok(found.pop())
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM projects WHERE slug = ? AND id <> ?";
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(sqlite(self.pool.as_ref())?)
                .await
                .context("Failed to check project slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(mysql(self.pool.as_ref())?)
                .await
                .context("Failed to check project slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn find(&self, query: &ProjectQuery, limit: Option<i64>) -> Result<Vec<Project>> {
        let (sql, args) = build_find_query(query, limit);
        self.fetch(&sql, &args).await
    }

    async fn update(&self, id: i64, record: &ProjectRecord) -> Result<Project> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_project_sqlite(sqlite(self.pool.as_ref())?, id, record).await?
            }
            DatabaseDriver::Mysql => {
                update_project_mysql(mysql(self.pool.as_ref())?, id, record).await?
            }
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Project not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM projects WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(sqlite(self.pool.as_ref())?)
                    .await
                    .context("Failed to delete project")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(mysql(self.pool.as_ref())?)
                    .await
                    .context("Failed to delete project")?;
            }
        }
        Ok(())
    }
}

impl SqlxProjectRepository {
    async fn fetch(&self, sql: &str, args: &[QueryArg]) -> Result<Vec<Project>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_projects_sqlite(sqlite(self.pool.as_ref())?, sql, args).await,
            DatabaseDriver::Mysql => fetch_projects_mysql(mysql(self.pool.as_ref())?, sql, args).await,
        }
    }
}

// ============================================================================
// Query composition
// ============================================================================

/// A bind argument of a composed statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueryArg {
    Int(i64),
    Text(String),
    Bool(bool),
}

/// Compose the statement for a project query.
///
/// Relation criteria are `EXISTS` subqueries, so a project matching through
/// several related rows is still returned once.
pub(crate) fn build_find_query(query: &ProjectQuery, limit: Option<i64>) -> (String, Vec<QueryArg>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut args = Vec::new();

    if let Some(status) = query.status {
        clauses.push("p.status = ?");
        args.push(QueryArg::Text(status.to_string()));
    }
    if let Some(feature) = query.feature {
        clauses.push("p.feature = ?");
        args.push(QueryArg::Bool(feature));
    }
    if let Some(is_active) = query.is_active {
        clauses.push("p.is_active = ?");
        args.push(QueryArg::Bool(is_active));
    }
    if let Some(scope) = &query.scope {
        clauses.push(
            "EXISTS (SELECT 1 FROM project_countries pc \
             JOIN countries c ON c.id = pc.country_id \
             WHERE pc.project_id = p.id AND c.scope = ?)",
        );
        args.push(QueryArg::Text(scope.clone()));
    }
    if let Some(user_id) = query.collaborator {
        clauses.push(
            "EXISTS (SELECT 1 FROM project_collaborators pu \
             WHERE pu.project_id = p.id AND pu.user_id = ?)",
        );
        args.push(QueryArg::Int(user_id));
    }
    if let Some(package_id) = query.package {
        clauses.push(
            "EXISTS (SELECT 1 FROM project_packages pp \
             WHERE pp.project_id = p.id AND pp.package_id = ?)",
        );
        args.push(QueryArg::Int(package_id));
    }
    if let Some(user_id) = query.editable_by {
        clauses.push(
            "(p.creator_id = ? OR EXISTS (SELECT 1 FROM project_collaborators pe \
             WHERE pe.project_id = p.id AND pe.user_id = ?))",
        );
        args.push(QueryArg::Int(user_id));
        args.push(QueryArg::Int(user_id));
    }

    let mut sql = format!("SELECT {} FROM projects p", PROJECT_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY p.updated_at DESC, p.id DESC");
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        args.push(QueryArg::Int(limit));
    }

    (sql, args)
}

fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !seen.iter().any(|t: &String| t == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

// ============================================================================
// SQLite implementations
// ============================================================================

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_sqlite<'q>(mut query: SqliteQuery<'q>, args: &[QueryArg]) -> SqliteQuery<'q> {
    for arg in args {
        query = match arg {
            QueryArg::Int(v) => query.bind(*v),
            QueryArg::Text(v) => query.bind(v.clone()),
            QueryArg::Bool(v) => query.bind(*v),
        };
    }
    query
}

async fn fetch_projects_sqlite(pool: &SqlitePool, sql: &str, args: &[QueryArg]) -> Result<Vec<Project>> {
    let rows = bind_sqlite(sqlx::query(sql), args)
        .fetch_all(pool)
        .await
        .context("Failed to query projects")?;

    let mut projects = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut project = row_to_project_sqlite(row)?;
        load_relations_sqlite(pool, &mut project).await?;
        projects.push(project);
    }
    Ok(projects)
}

fn row_to_project_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Project> {
    let status: String = row.get("status");
    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        creator_id: row.get("creator_id"),
        status: ProjectStatus::from_str(&status)
            .with_context(|| format!("Invalid project status in database: {}", status))?,
        is_active: row.get("is_active"),
        feature: row.get("feature"),
        started: row.get("started"),
        description: row.get("description"),
        challenges: row.get("challenges"),
        audience: row.get("audience"),
        technologies: row.get("technologies"),
        metrics: row.get("metrics"),
        num_users: row.get("num_users"),
        repository_url: row.get("repository_url"),
        countries: Vec::new(),
        collaborators: Vec::new(),
        packages: Vec::new(),
        tags: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn load_relations_sqlite(pool: &SqlitePool, project: &mut Project) -> Result<()> {
    let countries = sqlx::query(
        r#"
        SELECT c.id, c.name, c.code, c.scope
        FROM countries c
        INNER JOIN project_countries pc ON pc.country_id = c.id
        WHERE pc.project_id = ?
        ORDER BY c.name ASC
        "#,
    )
    .bind(project.id)
    .fetch_all(pool)
    .await
    .context("Failed to load project countries")?;
    project.countries = countries.iter().map(row_to_country_sqlite).collect();

    project.collaborators = sqlx::query(
        "SELECT user_id FROM project_collaborators WHERE project_id = ? ORDER BY user_id",
    )
    .bind(project.id)
    .fetch_all(pool)
    .await
    .context("Failed to load project collaborators")?
    .iter()
    .map(|row| row.get("user_id"))
    .collect();

    project.packages = sqlx::query(
        "SELECT package_id FROM project_packages WHERE project_id = ? ORDER BY package_id",
    )
    .bind(project.id)
    .fetch_all(pool)
    .await
    .context("Failed to load project packages")?
    .iter()
    .map(|row| row.get("package_id"))
    .collect();

    project.tags = sqlx::query("SELECT tag FROM project_tags WHERE project_id = ? ORDER BY tag")
        .bind(project.id)
        .fetch_all(pool)
        .await
        .context("Failed to load project tags")?
        .iter()
        .map(|row| row.get("tag"))
        .collect();

    Ok(())
}

async fn create_project_sqlite(pool: &SqlitePool, record: &ProjectRecord) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO projects (name, slug, creator_id, status, is_active, feature, started,
            description, challenges, audience, technologies, metrics, num_users,
            repository_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.name)
    .bind(&record.slug)
    .bind(record.creator_id)
    .bind(record.status.to_string())
    .bind(record.is_active)
    .bind(record.feature)
    .bind(record.started)
    .bind(&record.description)
    .bind(&record.challenges)
    .bind(&record.audience)
    .bind(&record.technologies)
    .bind(&record.metrics)
    .bind(record.num_users)
    .bind(&record.repository_url)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create project")?
    .last_insert_rowid();

    write_relations_sqlite(&mut tx, id, record).await?;
    tx.commit().await.context("Failed to commit project")?;

    Ok(id)
}

async fn update_project_sqlite(pool: &SqlitePool, id: i64, record: &ProjectRecord) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        r#"
        UPDATE projects
        SET name = ?, slug = ?, creator_id = ?, status = ?, is_active = ?, feature = ?,
            started = ?, description = ?, challenges = ?, audience = ?, technologies = ?,
            metrics = ?, num_users = ?, repository_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.name)
    .bind(&record.slug)
    .bind(record.creator_id)
    .bind(record.status.to_string())
    .bind(record.is_active)
    .bind(record.feature)
    .bind(record.started)
    .bind(&record.description)
    .bind(&record.challenges)
    .bind(&record.audience)
    .bind(&record.technologies)
    .bind(&record.metrics)
    .bind(record.num_users)
    .bind(&record.repository_url)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update project")?;

    write_relations_sqlite(&mut tx, id, record).await?;
    tx.commit().await.context("Failed to commit project")?;

    Ok(())
}

async fn write_relations_sqlite(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    record: &ProjectRecord,
) -> Result<()> {
    for table in RELATION_TABLES {
        sqlx::query(&format!("DELETE FROM {} WHERE project_id = ?", table))
            .bind(id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to clear {}", table))?;
    }

    for country_id in &record.countries {
        sqlx::query("INSERT OR IGNORE INTO project_countries (project_id, country_id) VALUES (?, ?)")
            .bind(id)
            .bind(country_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link project country")?;
    }
    for user_id in &record.collaborators {
        sqlx::query("INSERT OR IGNORE INTO project_collaborators (project_id, user_id) VALUES (?, ?)")
            .bind(id)
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link project collaborator")?;
    }
    for package_id in &record.packages {
        sqlx::query("INSERT OR IGNORE INTO project_packages (project_id, package_id) VALUES (?, ?)")
            .bind(id)
            .bind(package_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link project package")?;
    }
    for tag in dedup_tags(&record.tags) {
        sqlx::query("INSERT INTO project_tags (project_id, tag) VALUES (?, ?)")
            .bind(id)
            .bind(tag)
            .execute(&mut **tx)
            .await
            .context("Failed to tag project")?;
    }

    Ok(())
}

const RELATION_TABLES: [&str; 4] = [
    "project_countries",
    "project_collaborators",
    "project_packages",
    "project_tags",
];

// ============================================================================
// MySQL implementations
// ============================================================================

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, sqlx::mysql::MySqlArguments>;

fn bind_mysql<'q>(mut query: MySqlQuery<'q>, args: &[QueryArg]) -> MySqlQuery<'q> {
    for arg in args {
        query = match arg {
            QueryArg::Int(v) => query.bind(*v),
            QueryArg::Text(v) => query.bind(v.clone()),
            QueryArg::Bool(v) => query.bind(*v),
        };
    }
    query
}

async fn fetch_projects_mysql(pool: &MySqlPool, sql: &str, args: &[QueryArg]) -> Result<Vec<Project>> {
    let rows = bind_mysql(sqlx::query(sql), args)
        .fetch_all(pool)
        .await
        .context("Failed to query projects")?;

    let mut projects = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut project = row_to_project_mysql(row)?;
        load_relations_mysql(pool, &mut project).await?;
        projects.push(project);
    }
    Ok(projects)
}

fn row_to_project_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Project> {
    let status: String = row.get("status");
    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        creator_id: row.get("creator_id"),
        status: ProjectStatus::from_str(&status)
            .with_context(|| format!("Invalid project status in database: {}", status))?,
        is_active: row.get("is_active"),
        feature: row.get("feature"),
        started: row.get("started"),
        description: row.get("description"),
        challenges: row.get("challenges"),
        audience: row.get("audience"),
        technologies: row.get("technologies"),
        metrics: row.get("metrics"),
        num_users: row.get("num_users"),
        repository_url: row.get("repository_url"),
        countries: Vec::new(),
        collaborators: Vec::new(),
        packages: Vec::new(),
        tags: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn load_relations_mysql(pool: &MySqlPool, project: &mut Project) -> Result<()> {
    let countries = sqlx::query(
        r#"
        SELECT c.id, c.name, c.code, c.scope
        FROM countries c
        INNER JOIN project_countries pc ON pc.country_id = c.id
        WHERE pc.project_id = ?
        ORDER BY c.name ASC
        "#,
    )
    .bind(project.id)
    .fetch_all(pool)
    .await
    .context("Failed to load project countries")?;
    project.countries = countries.iter().map(row_to_country_mysql).collect();

    project.collaborators = sqlx::query(
        "SELECT user_id FROM project_collaborators WHERE project_id = ? ORDER BY user_id",
    )
    .bind(project.id)
    .fetch_all(pool)
    .await
    .context("Failed to load project collaborators")?
    .iter()
    .map(|row| row.get("user_id"))
    .collect();

    project.packages = sqlx::query(
        "SELECT package_id FROM project_packages WHERE project_id = ? ORDER BY package_id",
    )
    .bind(project.id)
    .fetch_all(pool)
    .await
    .context("Failed to load project packages")?
    .iter()
    .map(|row| row.get("package_id"))
    .collect();

    project.tags = sqlx::query("SELECT tag FROM project_tags WHERE project_id = ? ORDER BY tag")
        .bind(project.id)
        .fetch_all(pool)
        .await
        .context("Failed to load project tags")?
        .iter()
        .map(|row| row.get("tag"))
        .collect();

    Ok(())
}

async fn create_project_mysql(pool: &MySqlPool, record: &ProjectRecord) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO projects (name, slug, creator_id, status, is_active, feature, started,
            description, challenges, audience, technologies, metrics, num_users,
            repository_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.name)
    .bind(&record.slug)
    .bind(record.creator_id)
    .bind(record.status.to_string())
    .bind(record.is_active)
    .bind(record.feature)
    .bind(record.started)
    .bind(&record.description)
    .bind(&record.challenges)
    .bind(&record.audience)
    .bind(&record.technologies)
    .bind(&record.metrics)
    .bind(record.num_users)
    .bind(&record.repository_url)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create project")?
    .last_insert_id() as i64;

    write_relations_mysql(&mut tx, id, record).await?;
    tx.commit().await.context("Failed to commit project")?;

    Ok(id)
}

async fn update_project_mysql(pool: &MySqlPool, id: i64, record: &ProjectRecord) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        r#"
        UPDATE projects
        SET name = ?, slug = ?, creator_id = ?, status = ?, is_active = ?, feature = ?,
            started = ?, description = ?, challenges = ?, audience = ?, technologies = ?,
            metrics = ?, num_users = ?, repository_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.name)
    .bind(&record.slug)
    .bind(record.creator_id)
    .bind(record.status.to_string())
    .bind(record.is_active)
    .bind(record.feature)
    .bind(record.started)
    .bind(&record.description)
    .bind(&record.challenges)
    .bind(&record.audience)
    .bind(&record.technologies)
    .bind(&record.metrics)
    .bind(record.num_users)
    .bind(&record.repository_url)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update project")?;

    write_relations_mysql(&mut tx, id, record).await?;
    tx.commit().await.context("Failed to commit project")?;

    Ok(())
}

async fn write_relations_mysql(
    tx: &mut Transaction<'_, MySql>,
    id: i64,
    record: &ProjectRecord,
) -> Result<()> {
    for table in RELATION_TABLES {
        sqlx::query(&format!("DELETE FROM {} WHERE project_id = ?", table))
            .bind(id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to clear {}", table))?;
    }

    for country_id in &record.countries {
        sqlx::query("INSERT IGNORE INTO project_countries (project_id, country_id) VALUES (?, ?)")
            .bind(id)
            .bind(country_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link project country")?;
    }
    for user_id in &record.collaborators {
        sqlx::query("INSERT IGNORE INTO project_collaborators (project_id, user_id) VALUES (?, ?)")
            .bind(id)
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link project collaborator")?;
    }
    for package_id in &record.packages {
        sqlx::query("INSERT IGNORE INTO project_packages (project_id, package_id) VALUES (?, ?)")
            .bind(id)
            .bind(package_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link project package")?;
    }
    for tag in dedup_tags(&record.tags) {
        sqlx::query("INSERT INTO project_tags (project_id, tag) VALUES (?, ?)")
            .bind(id)
            .bind(tag)
            .execute(&mut **tx)
            .await
            .context("Failed to tag project")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CountryRepository, PackageRepository, SqlxCountryRepository, SqlxPackageRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Country, Package, User, UserRole};

    struct Fixture {
        repo: SqlxProjectRepository,
        alice: i64,
        bob: i64,
        kenya: i64,
        brazil: i64,
        package: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["alice", "bob"] {
            let user = users
                .create(&User::new(
                    name.to_string(),
                    format!("{}@example.com", name),
                    "hash".to_string(),
                    UserRole::Member,
                ))
                .await
                .unwrap();
            ids.push(user.id);
        }

        let countries = SqlxCountryRepository::new(pool.clone());
        let kenya = countries
            .create(&Country {
                id: 0,
                name: "Kenya".to_string(),
                code: "KE".to_string(),
                scope: "africa".to_string(),
            })
            .await
            .unwrap();
        let brazil = countries
            .create(&Country {
                id: 0,
                name: "Brazil".to_string(),
                code: "BR".to_string(),
                scope: "latam".to_string(),
            })
            .await
            .unwrap();

        let package = SqlxPackageRepository::new(pool.clone())
            .create(&Package::new(
                "Geo".to_string(),
                "geo".to_string(),
                "Maps".to_string(),
                None,
                ids[0],
            ))
            .await
            .unwrap();

        Fixture {
            repo: SqlxProjectRepository::new(pool),
            alice: ids[0],
            bob: ids[1],
            kenya: kenya.id,
            brazil: brazil.id,
            package: package.id,
        }
    }

    fn record(slug: &str, creator_id: i64) -> ProjectRecord {
        ProjectRecord {
            name: slug.to_string(),
            slug: slug.to_string(),
            creator_id,
            is_active: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_loads_relations() {
        let fx = setup().await;
        let mut rec = record("water", fx.alice);
        rec.countries = vec![fx.kenya, fx.brazil];
        rec.collaborators = vec![fx.bob];
        rec.packages = vec![fx.package];
        rec.tags = vec!["health".to_string(), "health".to_string(), " ".to_string()];

        let project = fx.repo.create(&rec).await.expect("Failed to create project");

        assert_eq!(project.status, ProjectStatus::Draft);
        let names: Vec<&str> = project.countries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Brazil", "Kenya"]);
        assert_eq!(project.collaborators, vec![fx.bob]);
        assert_eq!(project.packages, vec![fx.package]);
        assert_eq!(project.tags, vec!["health".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_relation_id_rolls_back() {
        let fx = setup().await;
        let mut rec = record("ghost", fx.alice);
        rec.countries = vec![9999];

        assert!(fx.repo.create(&rec).await.is_err());
        assert!(fx.repo.get_by_slug("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scope_filter_is_distinct() {
        let fx = setup().await;
        let mut both = record("both", fx.alice);
        both.countries = vec![fx.kenya, fx.brazil];
        fx.repo.create(&both).await.unwrap();
        let mut latam = record("latam-only", fx.alice);
        latam.countries = vec![fx.brazil];
        fx.repo.create(&latam).await.unwrap();

        let africa = fx.repo.find(&ProjectQuery::new().scope("africa"), None).await.unwrap();
        assert_eq!(africa.len(), 1);
        assert_eq!(africa[0].slug, "both");

        let latam = fx.repo.find(&ProjectQuery::new().scope("latam"), None).await.unwrap();
        assert_eq!(latam.len(), 2);
    }

    #[tokio::test]
    async fn test_find_orders_by_updated_and_limits() {
        let fx = setup().await;
        let first = fx.repo.create(&record("first", fx.alice)).await.unwrap();
        fx.repo.create(&record("second", fx.alice)).await.unwrap();
        fx.repo.update(first.id, &record("first", fx.alice)).await.unwrap();

        let all = fx.repo.find(&ProjectQuery::new(), None).await.unwrap();
        let slugs: Vec<&str> = all.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["first", "second"]);

        let one = fx.repo.find(&ProjectQuery::new(), Some(1)).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_editable_by_matches_creator_or_collaborator() {
        let fx = setup().await;
        fx.repo.create(&record("mine", fx.alice)).await.unwrap();
        let mut shared = record("shared", fx.bob);
        shared.collaborators = vec![fx.alice];
        fx.repo.create(&shared).await.unwrap();
        fx.repo.create(&record("theirs", fx.bob)).await.unwrap();

        let editable = fx
            .repo
            .find(&ProjectQuery::new().drafts().editable_by(fx.alice), None)
            .await
            .unwrap();
        let mut slugs: Vec<&str> = editable.iter().map(|p| p.slug.as_str()).collect();
        slugs.sort();
        assert_eq!(slugs, vec!["mine", "shared"]);
    }

    #[tokio::test]
    async fn test_status_feature_and_package_filters() {
        let fx = setup().await;
        let mut featured = record("featured", fx.alice);
        featured.status = ProjectStatus::Published;
        featured.feature = true;
        featured.packages = vec![fx.package];
        fx.repo.create(&featured).await.unwrap();
        let mut plain = record("plain", fx.alice);
        plain.status = ProjectStatus::Published;
        fx.repo.create(&plain).await.unwrap();

        let query = ProjectQuery::new().published().feature(true);
        let found = fx.repo.find(&query, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "featured");

        let using = fx.repo.find(&ProjectQuery::new().package(fx.package), None).await.unwrap();
        assert_eq!(using.len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_relations_and_slug_check() {
        let fx = setup().await;
        let mut rec = record("water", fx.alice);
        rec.tags = vec!["a".to_string()];
        let project = fx.repo.create(&rec).await.unwrap();

        rec.tags = vec!["b".to_string()];
        rec.is_active = false;
        let updated = fx.repo.update(project.id, &rec).await.unwrap();
        assert_eq!(updated.tags, vec!["b".to_string()]);
        assert!(!updated.is_active);

        assert!(!fx.repo.exists_by_slug("water", Some(project.id)).await.unwrap());
        assert!(fx.repo.exists_by_slug("water", None).await.unwrap());

        fx.repo.delete(project.id).await.unwrap();
        assert!(fx.repo.get_by_id(project.id).await.unwrap().is_none());
    }

    #[test]
    fn test_build_find_query_binds_in_order() {
        let query = ProjectQuery::new().published().scope("africa").editable_by(3);
        let (sql, args) = build_find_query(&query, Some(5));

        assert!(sql.contains("p.status = ?"));
        assert!(sql.ends_with("LIMIT ?"));
        assert_eq!(
            args,
            vec![
                QueryArg::Text("published".to_string()),
                QueryArg::Text("africa".to_string()),
                QueryArg::Int(3),
                QueryArg::Int(3),
                QueryArg::Int(5),
            ]
        );
    }

    #[test]
    fn test_build_find_query_empty() {
        let (sql, args) = build_find_query(&ProjectQuery::new(), None);
        assert!(!sql.contains("WHERE"));
        assert!(args.is_empty());
    }
}
