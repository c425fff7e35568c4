//! Project service
//!
//! The project query layer (scope filtering, random sampling, drafts,
//! related and featured projects) and the administration operations.

use crate::db::is_unique_violation;
use crate::db::repositories::{
    CountryRepository, PackageRepository, ProjectRepository, UserRepository,
};
use crate::models::{
    CreateProjectInput, Project, ProjectQuery, ProjectRecord, ProjectStatus, ProjectSummary,
    RelatedTo, UpdateProjectInput, User,
};
use crate::services::random;
use crate::services::slug::{generate_slug, unique_slug};
use crate::services::url::normalize_repository_url;
use anyhow::Context;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 200;
const MAX_TAG_LEN: usize = 50;
const SLUG_ATTEMPTS: u32 = 3;

/// Error types for project service operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug already exists: {0}")]
    SlugExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    users: Arc<dyn UserRepository>,
    countries: Arc<dyn CountryRepository>,
    packages: Arc<dyn PackageRepository>,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        users: Arc<dyn UserRepository>,
        countries: Arc<dyn CountryRepository>,
        packages: Arc<dyn PackageRepository>,
    ) -> Self {
        Self {
            projects,
            users,
            countries,
            packages,
        }
    }

    /// Run a query, most recently updated first
    pub async fn find(&self, query: &ProjectQuery) -> Result<Vec<Project>, ProjectServiceError> {
        Ok(self
            .projects
            .find(query, None)
            .await
            .context("Failed to query projects")?)
    }

    /// Narrow a query to projects with at least one country in `scope`
    pub fn filter_by_scope(query: ProjectQuery, scope: &str) -> ProjectQuery {
        query.scope(scope)
    }

    /// The whole result when it has at most `max_number` projects (same
    /// order), otherwise `max_number` of them drawn uniformly at random.
    pub async fn get_random(
        &self,
        query: &ProjectQuery,
        max_number: usize,
    ) -> Result<Vec<Project>, ProjectServiceError> {
        let all = self.find(query).await?;
        Ok(random::sample(all, max_number)?)
    }

    /// Drafts the user created or collaborates on
    pub async fn get_drafts_for_user(&self, user: &User) -> Result<Vec<Project>, ProjectServiceError> {
        self.find(&ProjectQuery::new().drafts().editable_by(user.id)).await
    }

    pub async fn published(&self) -> Result<Vec<Project>, ProjectServiceError> {
        self.find(&ProjectQuery::new().published()).await
    }

    /// Published projects a user collaborates on, or that use a package
    pub async fn get_related_projects(
        &self,
        related: RelatedTo,
    ) -> Result<Vec<Project>, ProjectServiceError> {
        self.find(&ProjectQuery::new().published().related_to(related))
            .await
    }

    pub async fn get_feature_projects(&self) -> Result<Vec<Project>, ProjectServiceError> {
        self.find(&ProjectQuery::new().feature(true)).await
    }

    /// One feature project picked at random, `None` when there are none
    pub async fn get_feature_project(&self) -> Result<Option<Project>, ProjectServiceError> {
        let featured = self.get_feature_projects().await?;
        Ok(random::choose(featured)?)
    }

    /// Published projects, optionally restricted to a scope and randomly
    /// capped at `limit`
    pub async fn list_public(
        &self,
        scope: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Project>, ProjectServiceError> {
        let mut query = ProjectQuery::new().published();
        if let Some(scope) = scope {
            query = Self::filter_by_scope(query, scope);
        }

        match limit {
            Some(limit) => self.get_random(&query, limit).await,
            None => self.find(&query).await,
        }
    }

    /// A project as seen by `viewer`: drafts are only visible to their
    /// creator and collaborators
    pub async fn get_visible(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<Project, ProjectServiceError> {
        let project = self
            .projects
            .get_by_slug(slug)
            .await
            .context("Failed to get project")?
            .ok_or_else(|| ProjectServiceError::NotFound(format!("Project '{}' not found", slug)))?;

        let visible = project.status == ProjectStatus::Published
            || viewer.is_some_and(|user| project.is_editable_by(user.id));
        if !visible {
            return Err(ProjectServiceError::NotFound(format!(
                "Project '{}' not found",
                slug
            )));
        }

        Ok(project)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Admin list rows, optionally filtered on `is_active`
    pub async fn admin_list(
        &self,
        is_active: Option<bool>,
    ) -> Result<Vec<ProjectSummary>, ProjectServiceError> {
        let mut query = ProjectQuery::new();
        if let Some(is_active) = is_active {
            query = query.active(is_active);
        }
        let projects = self.find(&query).await?;
        Ok(projects.iter().map(ProjectSummary::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Project, ProjectServiceError> {
        self.projects
            .get_by_id(id)
            .await
            .context("Failed to get project")?
            .ok_or_else(|| ProjectServiceError::NotFound(format!("Project {} not found", id)))
    }

    pub async fn create(&self, input: CreateProjectInput) -> Result<Project, ProjectServiceError> {
        let name = validate_name(&input.name)?;

        let explicit_slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => {
                let slug = validate_slug(slug)?;
                if self.slug_taken(&slug, None).await? {
                    return Err(ProjectServiceError::SlugExists(slug));
                }
                Some(slug)
            }
            None => None,
        };

        let mut record = ProjectRecord {
            name,
            slug: String::new(),
            creator_id: input.creator_id,
            status: input.status,
            is_active: input.is_active,
            feature: input.feature,
            started: input.started,
            description: input.description,
            challenges: input.challenges,
            audience: input.audience,
            technologies: input.technologies,
            metrics: input.metrics,
            num_users: input.num_users,
            repository_url: normalize_url(input.repository_url)?,
            countries: input.countries,
            collaborators: input.collaborators,
            packages: input.packages,
            tags: input.tags,
        };
        self.validate_record(&record).await?;

        let base = generate_slug(&record.name);
        let mut attempt = 1;
        loop {
            record.slug = match &explicit_slug {
                Some(slug) => slug.clone(),
                None => {
                    unique_slug(&base, "project", |candidate| {
                        let repo = self.projects.clone();
                        async move { repo.exists_by_slug(&candidate, None).await }
                    })
                    .await?
                }
            };

            match self.projects.create(&record).await {
                Ok(project) => {
                    tracing::info!(project_id = project.id, slug = %project.slug, "Created project");
                    return Ok(project);
                }
                Err(e) if is_unique_violation(&e) => {
                    if explicit_slug.is_some() || attempt >= SLUG_ATTEMPTS {
                        return Err(ProjectServiceError::SlugExists(record.slug));
                    }
                    tracing::debug!(slug = %record.slug, attempt, "Slug taken concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.context("Failed to create project").into()),
            }
        }
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateProjectInput,
    ) -> Result<Project, ProjectServiceError> {
        let existing = self.get(id).await?;
        let mut record = ProjectRecord::from(&existing);

        if let Some(name) = input.name {
            record.name = validate_name(&name)?;
        }
        if let Some(slug) = input.slug {
            let slug = validate_slug(slug.trim())?;
            if slug != existing.slug && self.slug_taken(&slug, Some(id)).await? {
                return Err(ProjectServiceError::SlugExists(slug));
            }
            record.slug = slug;
        }
        if let Some(creator_id) = input.creator_id {
            record.creator_id = creator_id;
        }
        if let Some(status) = input.status {
            record.status = status;
        }
        if let Some(is_active) = input.is_active {
            record.is_active = is_active;
        }
        if let Some(feature) = input.feature {
            record.feature = feature;
        }
        if let Some(started) = input.started {
            record.started = started;
        }
        if let Some(description) = input.description {
            record.description = description;
        }
        if let Some(challenges) = input.challenges {
            record.challenges = challenges;
        }
        if let Some(audience) = input.audience {
            record.audience = audience;
        }
        if let Some(technologies) = input.technologies {
            record.technologies = technologies;
        }
        if let Some(metrics) = input.metrics {
            record.metrics = metrics;
        }
        if let Some(num_users) = input.num_users {
            record.num_users = num_users;
        }
        if let Some(repository_url) = input.repository_url {
            record.repository_url = normalize_url(repository_url)?;
        }
        if let Some(countries) = input.countries {
            record.countries = countries;
        }
        if let Some(collaborators) = input.collaborators {
            record.collaborators = collaborators;
        }
        if let Some(packages) = input.packages {
            record.packages = packages;
        }
        if let Some(tags) = input.tags {
            record.tags = tags;
        }

        self.validate_record(&record).await?;

        match self.projects.update(id, &record).await {
            Ok(project) => Ok(project),
            Err(e) if is_unique_violation(&e) => Err(ProjectServiceError::SlugExists(record.slug)),
            Err(e) => Err(e.context("Failed to update project").into()),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), ProjectServiceError> {
        self.get(id).await?;
        self.projects
            .delete(id)
            .await
            .context("Failed to delete project")?;
        tracing::info!(project_id = id, "Deleted project");
        Ok(())
    }

    async fn slug_taken(&self, slug: &str, exclude: Option<i64>) -> Result<bool, ProjectServiceError> {
        Ok(self
            .projects
            .exists_by_slug(slug, exclude)
            .await
            .context("Failed to check project slug")?)
    }

    /// Every referenced user, country and package must exist
    async fn validate_record(&self, record: &ProjectRecord) -> Result<(), ProjectServiceError> {
        if let Some(n) = record.num_users {
            if n < 0 {
                return Err(ProjectServiceError::ValidationError(
                    "Number of users cannot be negative".to_string(),
                ));
            }
        }
        if let Some(tag) = record.tags.iter().find(|t| t.trim().chars().count() > MAX_TAG_LEN) {
            return Err(ProjectServiceError::ValidationError(format!(
                "Tag '{}' exceeds {} characters",
                tag, MAX_TAG_LEN
            )));
        }

        let user_ids = std::iter::once(&record.creator_id).chain(record.collaborators.iter());
        for &user_id in user_ids {
            if self.users.get_by_id(user_id).await.context("Failed to get user")?.is_none() {
                return Err(ProjectServiceError::ValidationError(format!(
                    "Unknown user id {}",
                    user_id
                )));
            }
        }
        for &country_id in &record.countries {
            if self
                .countries
                .get_by_id(country_id)
                .await
                .context("Failed to get country")?
                .is_none()
            {
                return Err(ProjectServiceError::ValidationError(format!(
                    "Unknown country id {}",
                    country_id
                )));
            }
        }
        for &package_id in &record.packages {
            if self
                .packages
                .get_by_id(package_id)
                .await
                .context("Failed to get package")?
                .is_none()
            {
                return Err(ProjectServiceError::ValidationError(format!(
                    "Unknown package id {}",
                    package_id
                )));
            }
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, ProjectServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProjectServiceError::ValidationError(
            "Name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ProjectServiceError::ValidationError(format!(
            "Name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn normalize_url(url: Option<String>) -> Result<Option<String>, ProjectServiceError> {
    normalize_repository_url(url).map_err(ProjectServiceError::ValidationError)
}

fn validate_slug(slug: &str) -> Result<String, ProjectServiceError> {
    if slug.is_empty() || generate_slug(slug) != slug {
        return Err(ProjectServiceError::ValidationError(format!(
            "Invalid slug '{}': use lowercase letters, digits and hyphens",
            slug
        )));
    }
    Ok(slug.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCountryRepository, SqlxPackageRepository, SqlxProjectRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Country, Package, UserRole};
    use async_trait::async_trait;

    struct Fixture {
        service: ProjectService,
        alice: User,
        bob: User,
        carol: User,
        kenya: i64,
        brazil: i64,
        package: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let mut created = Vec::new();
        for name in ["alice", "bob", "carol"] {
            created.push(
                users
                    .create(&User::new(
                        name.to_string(),
                        format!("{}@example.com", name),
                        "hash".to_string(),
                        UserRole::Member,
                    ))
                    .await
                    .unwrap(),
            );
        }

        let countries = SqlxCountryRepository::boxed(pool.clone());
        let mut country_ids = Vec::new();
        for (name, code, scope) in [("Kenya", "KE", "africa"), ("Brazil", "BR", "latam")] {
            let country = countries
                .create(&Country {
                    id: 0,
                    name: name.to_string(),
                    code: code.to_string(),
                    scope: scope.to_string(),
                })
                .await
                .unwrap();
            country_ids.push(country.id);
        }

        let packages = SqlxPackageRepository::boxed(pool.clone());
        let package = packages
            .create(&Package::new(
                "Geo".to_string(),
                "geo".to_string(),
                String::new(),
                None,
                created[0].id,
            ))
            .await
            .unwrap();

        let carol = created.pop().unwrap();
        let bob = created.pop().unwrap();
        let alice = created.pop().unwrap();

        Fixture {
            service: ProjectService::new(
                SqlxProjectRepository::boxed(pool),
                users,
                countries,
                packages,
            ),
            alice,
            bob,
            carol,
            kenya: country_ids[0],
            brazil: country_ids[1],
            package: package.id,
        }
    }

    fn input(name: &str, creator_id: i64) -> CreateProjectInput {
        serde_json::from_value(serde_json::json!({ "name": name, "creator_id": creator_id }))
            .unwrap()
    }

    fn published(name: &str, creator_id: i64) -> CreateProjectInput {
        let mut input = input(name, creator_id);
        input.status = ProjectStatus::Published;
        input
    }

    #[tokio::test]
    async fn test_create_prepopulates_unique_slug() {
        let fx = setup().await;

        let first = fx.service.create(input("Water Map", fx.alice.id)).await.unwrap();
        let second = fx.service.create(input("Water map!", fx.alice.id)).await.unwrap();

        assert_eq!(first.slug, "water-map");
        assert_eq!(second.slug, "water-map-2");
        assert!(first.is_active);
        assert_eq!(first.status, ProjectStatus::Draft);
    }

    #[tokio::test]
    async fn test_explicit_slug_conflict_and_format() {
        let fx = setup().await;
        let mut explicit = input("One", fx.alice.id);
        explicit.slug = Some("shared".to_string());
        fx.service.create(explicit.clone()).await.unwrap();

        let dup = fx.service.create(explicit).await;
        assert!(matches!(dup, Err(ProjectServiceError::SlugExists(_))));

        let mut bad = input("Two", fx.alice.id);
        bad.slug = Some("Not A Slug".to_string());
        assert!(matches!(
            fx.service.create(bad).await,
            Err(ProjectServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_references_are_rejected() {
        let fx = setup().await;

        let mut bad_country = input("A", fx.alice.id);
        bad_country.countries = vec![404];
        assert!(matches!(
            fx.service.create(bad_country).await,
            Err(ProjectServiceError::ValidationError(_))
        ));

        let bad_creator = input("B", 404);
        assert!(matches!(
            fx.service.create(bad_creator).await,
            Err(ProjectServiceError::ValidationError(_))
        ));

        let mut bad_package = input("C", fx.alice.id);
        bad_package.packages = vec![404];
        assert!(matches!(
            fx.service.create(bad_package).await,
            Err(ProjectServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_drafts_for_user_creator_or_collaborator_only() {
        let fx = setup().await;
        fx.service.create(input("Own draft", fx.alice.id)).await.unwrap();
        let mut shared = input("Shared draft", fx.bob.id);
        shared.collaborators = vec![fx.alice.id];
        fx.service.create(shared).await.unwrap();
        fx.service.create(input("Bob draft", fx.bob.id)).await.unwrap();
        fx.service.create(published("Own published", fx.alice.id)).await.unwrap();

        let drafts = fx.service.get_drafts_for_user(&fx.alice).await.unwrap();
        let mut names: Vec<&str> = drafts.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Own draft", "Shared draft"]);

        assert!(fx.service.get_drafts_for_user(&fx.carol).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_related_projects_are_published_only() {
        let fx = setup().await;
        let mut live = published("Live", fx.alice.id);
        live.collaborators = vec![fx.bob.id];
        live.packages = vec![fx.package];
        fx.service.create(live).await.unwrap();
        let mut draft = input("Draft", fx.alice.id);
        draft.collaborators = vec![fx.bob.id];
        draft.packages = vec![fx.package];
        fx.service.create(draft).await.unwrap();

        let by_user = fx.service.get_related_projects(RelatedTo::User(fx.bob.id)).await.unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].name, "Live");

        let by_package = fx
            .service
            .get_related_projects(RelatedTo::Package(fx.package))
            .await
            .unwrap();
        assert_eq!(by_package.len(), 1);

        let by_creator = fx.service.get_related_projects(RelatedTo::User(fx.alice.id)).await.unwrap();
        assert!(by_creator.is_empty());
    }

    #[tokio::test]
    async fn test_feature_project_none_when_empty() {
        let fx = setup().await;
        fx.service.create(published("Plain", fx.alice.id)).await.unwrap();

        assert!(fx.service.get_feature_projects().await.unwrap().is_empty());
        assert!(fx.service.get_feature_project().await.unwrap().is_none());

        let mut star = published("Star", fx.alice.id);
        star.feature = true;
        fx.service.create(star).await.unwrap();

        let picked = fx.service.get_feature_project().await.unwrap();
        assert_eq!(picked.map(|p| p.name), Some("Star".to_string()));
    }

    #[tokio::test]
    async fn test_get_random_caps_or_returns_unchanged() {
        let fx = setup().await;
        for i in 0..5 {
            fx.service.create(published(&format!("P{}", i), fx.alice.id)).await.unwrap();
        }
        let query = ProjectQuery::new().published();

        let all = fx.service.find(&query).await.unwrap();
        let unchanged = fx.service.get_random(&query, 5).await.unwrap();
        let ids = |v: &[Project]| v.iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(&unchanged), ids(&all));

        let sampled = fx.service.get_random(&query, 2).await.unwrap();
        assert_eq!(sampled.len(), 2);
        assert_ne!(sampled[0].id, sampled[1].id);
    }

    #[tokio::test]
    async fn test_list_public_by_scope() {
        let fx = setup().await;
        let mut both = published("Both", fx.alice.id);
        both.countries = vec![fx.kenya, fx.brazil];
        fx.service.create(both).await.unwrap();
        let mut africa_draft = input("Draft", fx.alice.id);
        africa_draft.countries = vec![fx.kenya];
        fx.service.create(africa_draft).await.unwrap();

        let africa = fx.service.list_public(Some("africa"), None).await.unwrap();
        assert_eq!(africa.len(), 1);
        assert_eq!(africa[0].name, "Both");

        assert!(fx.service.list_public(Some("europe"), None).await.unwrap().is_empty());
        assert_eq!(fx.service.list_public(None, Some(0)).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_draft_visibility() {
        let fx = setup().await;
        let mut draft = input("Secret", fx.alice.id);
        draft.collaborators = vec![fx.bob.id];
        let project = fx.service.create(draft).await.unwrap();

        assert!(fx.service.get_visible(&project.slug, Some(&fx.alice)).await.is_ok());
        assert!(fx.service.get_visible(&project.slug, Some(&fx.bob)).await.is_ok());
        assert!(matches!(
            fx.service.get_visible(&project.slug, Some(&fx.carol)).await,
            Err(ProjectServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.get_visible(&project.slug, None).await,
            Err(ProjectServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_list_filter_and_update() {
        let fx = setup().await;
        let project = fx.service.create(input("Alpha", fx.alice.id)).await.unwrap();
        fx.service.create(input("Beta", fx.alice.id)).await.unwrap();

        let update = UpdateProjectInput {
            is_active: Some(false),
            tags: Some(vec!["water".to_string()]),
            ..Default::default()
        };
        let updated = fx.service.update(project.id, update).await.unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.tags, vec!["water".to_string()]);
        assert_eq!(updated.slug, "alpha");

        let inactive = fx.service.admin_list(Some(false)).await.unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].name, "Alpha");
        assert_eq!(fx.service.admin_list(None).await.unwrap().len(), 2);

        fx.service.delete(project.id).await.unwrap();
        assert!(matches!(
            fx.service.get(project.id).await,
            Err(ProjectServiceError::NotFound(_))
        ));
    }

    fn update_from(value: serde_json::Value) -> UpdateProjectInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_update_null_clears_nullable_fields() {
        let fx = setup().await;
        let mut create = input("Alpha", fx.alice.id);
        create.started = chrono::NaiveDate::from_ymd_opt(2024, 1, 15);
        create.num_users = Some(5);
        create.repository_url = Some("https://x.org".to_string());
        let project = fx.service.create(create).await.unwrap();

        let untouched = fx
            .service
            .update(project.id, update_from(serde_json::json!({ "name": "Alpha 2" })))
            .await
            .unwrap();
        assert_eq!(untouched.num_users, Some(5));
        assert_eq!(untouched.repository_url.as_deref(), Some("https://x.org"));
        assert!(untouched.started.is_some());

        let cleared = fx
            .service
            .update(
                project.id,
                update_from(serde_json::json!({
                    "started": null,
                    "num_users": null,
                    "repository_url": null,
                })),
            )
            .await
            .unwrap();
        assert_eq!(cleared.started, None);
        assert_eq!(cleared.num_users, None);
        assert_eq!(cleared.repository_url, None);
        assert_eq!(cleared.name, "Alpha 2");
    }

    #[tokio::test]
    async fn test_repository_url_is_validated() {
        let fx = setup().await;

        let mut blank = input("Blank", fx.alice.id);
        blank.repository_url = Some("  ".to_string());
        let project = fx.service.create(blank).await.unwrap();
        assert_eq!(project.repository_url, None);

        let mut bad = input("Bad", fx.alice.id);
        bad.repository_url = Some("git@github.com:x/y".to_string());
        assert!(matches!(
            fx.service.create(bad).await,
            Err(ProjectServiceError::ValidationError(_))
        ));

        let long = format!("https://x.org/{}", "a".repeat(300));
        let result = fx
            .service
            .update(
                project.id,
                update_from(serde_json::json!({ "repository_url": long })),
            )
            .await;
        assert!(matches!(result, Err(ProjectServiceError::ValidationError(_))));

        let updated = fx
            .service
            .update(
                project.id,
                update_from(serde_json::json!({ "repository_url": " https://x.org/y " })),
            )
            .await
            .unwrap();
        assert_eq!(updated.repository_url.as_deref(), Some("https://x.org/y"));
    }

    /// Never sees a slug as taken, like a request racing a concurrent insert
    struct BlindSlugCheck {
        inner: Arc<dyn ProjectRepository>,
    }

    #[async_trait]
    impl ProjectRepository for BlindSlugCheck {
        async fn create(&self, record: &ProjectRecord) -> anyhow::Result<Project> {
            self.inner.create(record).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Project>> {
            self.inner.get_by_id(id).await
        }

        async fn get_by_slug(&self, slug: &str) -> anyhow::Result<Option<Project>> {
            self.inner.get_by_slug(slug).await
        }

        async fn exists_by_slug(&self, _slug: &str, _exclude_id: Option<i64>) -> anyhow::Result<bool> {
            Ok(false)
        }

        async fn find(&self, query: &ProjectQuery, limit: Option<i64>) -> anyhow::Result<Vec<Project>> {
            self.inner.find(query, limit).await
        }

        async fn update(&self, id: i64, record: &ProjectRecord) -> anyhow::Result<Project> {
            self.inner.update(id, record).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_slug_collision_is_a_conflict() {
        let fx = setup().await;
        let existing = fx.service.create(input("Water Map", fx.alice.id)).await.unwrap();
        let other = fx.service.create(input("Other", fx.alice.id)).await.unwrap();

        let racing = ProjectService::new(
            Arc::new(BlindSlugCheck {
                inner: fx.service.projects.clone(),
            }),
            fx.service.users.clone(),
            fx.service.countries.clone(),
            fx.service.packages.clone(),
        );

        let derived = racing.create(input("Water Map", fx.bob.id)).await;
        assert!(matches!(derived, Err(ProjectServiceError::SlugExists(ref slug)) if slug == "water-map"));

        let mut explicit = input("Another", fx.bob.id);
        explicit.slug = Some(existing.slug.clone());
        let explicit = racing.create(explicit).await;
        assert!(matches!(explicit, Err(ProjectServiceError::SlugExists(_))));

        let renamed = racing
            .update(
                other.id,
                update_from(serde_json::json!({ "slug": existing.slug })),
            )
            .await;
        assert!(matches!(renamed, Err(ProjectServiceError::SlugExists(_))));
        assert_eq!(fx.service.get(other.id).await.unwrap().slug, "other");
    }
}
