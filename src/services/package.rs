//! Package service
//!
//! Business rules for packages: creation with a generated slug, paginated
//! listing, creator-only editing and flagging for moderation.

use crate::db::is_unique_violation;
use crate::db::repositories::PackageRepository;
use crate::models::{
    CreatePackageInput, ListParams, Package, PagedResult, UpdatePackageInput, User,
};
use crate::services::flash::FlashMessage;
use crate::services::mail::FlagNotifier;
use crate::services::slug::{generate_slug, unique_slug};
use crate::services::url::normalize_repository_url;
use anyhow::Context;
use std::sync::Arc;

/// Packages shown per list page
pub const PACKAGES_PER_PAGE: u32 = 10;

const MAX_NAME_LEN: usize = 100;
const SLUG_ATTEMPTS: u32 = 3;

/// Error types for package service operations
#[derive(Debug, thiserror::Error)]
pub enum PackageServiceError {
    /// Missing package, missing page, or a package the user may not edit
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PackageService {
    repo: Arc<dyn PackageRepository>,
    notifier: Arc<FlagNotifier>,
}

impl PackageService {
    pub fn new(repo: Arc<dyn PackageRepository>, notifier: Arc<FlagNotifier>) -> Self {
        Self { repo, notifier }
    }

    /// Create a package owned by `creator`
    pub async fn create(
        &self,
        creator: &User,
        input: CreatePackageInput,
    ) -> Result<Package, PackageServiceError> {
        let name = validate_name(&input.name)?;
        let repository_url = normalize_url(input.repository_url)?;

        let base = generate_slug(&name);
        let mut attempt = 1;
        loop {
            let slug = unique_slug(&base, "package", |candidate| {
                let repo = self.repo.clone();
                async move { repo.exists_by_slug(&candidate).await }
            })
            .await?;

            let package = Package::new(
                name.clone(),
                slug,
                input.description.clone(),
                repository_url.clone(),
                creator.id,
            );
            match self.repo.create(&package).await {
                Ok(created) => {
                    tracing::info!(package_id = created.id, creator_id = creator.id, "Created package");
                    return Ok(created);
                }
                // Another request took the slug between the check and the insert
                Err(e) if attempt < SLUG_ATTEMPTS && is_unique_violation(&e) => {
                    tracing::debug!(slug = %package.slug, attempt, "Slug taken concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.context("Failed to create package").into()),
            }
        }
    }

    pub async fn get(&self, id: i64) -> Result<Package, PackageServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get package")?
            .ok_or_else(|| PackageServiceError::NotFound(format!("Package {} not found", id)))
    }

    /// One page of packages, newest first.
    ///
    /// A page below 1, or past the last page of a non-empty list, is not
    /// found. An empty list still has a first page.
    pub async fn list(&self, page: i64) -> Result<PagedResult<Package>, PackageServiceError> {
        let total = self.repo.count().await.context("Failed to count packages")?;
        let per_page = i64::from(PACKAGES_PER_PAGE);
        let last_page = ((total + per_page - 1) / per_page).max(1);

        if page < 1 || page > last_page {
            return Err(PackageServiceError::NotFound(format!("Page {} not found", page)));
        }

        let params = ListParams::new(page as u32, PACKAGES_PER_PAGE);
        let items = self
            .repo
            .list(params.offset(), params.limit())
            .await
            .context("Failed to list packages")?;

        Ok(PagedResult::new(items, total, &params))
    }

    /// The package, if `user` created it.
    ///
    /// Anyone else gets `NotFound`, the same as for a missing package, so
    /// the edit views do not reveal which ids exist.
    pub async fn get_for_edit(&self, id: i64, user: &User) -> Result<Package, PackageServiceError> {
        let package = self.get(id).await?;
        if !user.owns(package.creator_id) {
            tracing::debug!(package_id = id, user_id = user.id, "Edit refused to non-creator");
            return Err(PackageServiceError::NotFound(format!("Package {} not found", id)));
        }
        Ok(package)
    }

    pub async fn update(
        &self,
        id: i64,
        user: &User,
        input: UpdatePackageInput,
    ) -> Result<Package, PackageServiceError> {
        let mut package = self.get_for_edit(id, user).await?;

        if let Some(name) = input.name {
            package.name = validate_name(&name)?;
        }
        if let Some(description) = input.description {
            package.description = description;
        }
        if input.repository_url.is_some() {
            package.repository_url = normalize_url(input.repository_url)?;
        }

        Ok(self
            .repo
            .update(&package)
            .await
            .context("Failed to update package")?)
    }

    pub async fn delete(&self, id: i64, user: &User) -> Result<(), PackageServiceError> {
        let package = self.get_for_edit(id, user).await?;
        self.repo
            .delete(package.id)
            .await
            .context("Failed to delete package")?;
        tracing::info!(package_id = id, "Deleted package");
        Ok(())
    }

    /// Flag a package for the managers' attention.
    ///
    /// The package is looked up before anything is sent. A delivery failure
    /// is not an error for the caller: it becomes the error-level message
    /// that the user sees instead of the confirmation.
    pub async fn flag(
        &self,
        id: i64,
        user: &User,
        reason: &str,
    ) -> Result<FlashMessage, PackageServiceError> {
        let package = self.get(id).await?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PackageServiceError::ValidationError(
                "Reason cannot be empty".to_string(),
            ));
        }

        match self.notifier.notify(user, &package, reason).await {
            Ok(()) => {
                tracing::info!(package_id = id, user_id = user.id, "Package flagged");
                Ok(FlashMessage::success(format!(
                    "Thanks for flagging {}. We have notified the administrators and they will \
                     review this package shortly.",
                    package
                )))
            }
            Err(e) => {
                tracing::warn!(package_id = id, "Failed to send flag e-mail: {:#}", e);
                Ok(FlashMessage::error(
                    "Sorry, an error occurred while sending the flag email to administrators. \
                     Please try again later.",
                ))
            }
        }
    }
}

fn validate_name(name: &str) -> Result<String, PackageServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PackageServiceError::ValidationError(
            "Name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(PackageServiceError::ValidationError(format!(
            "Name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn normalize_url(url: Option<String>) -> Result<Option<String>, PackageServiceError> {
    normalize_repository_url(url).map_err(PackageServiceError::ValidationError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MailConfig, Manager, ServerConfig};
    use crate::db::repositories::{SqlxPackageRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;
    use crate::services::flash::FlashLevel;
    use crate::templates::TemplateEngine;
    use async_trait::async_trait;
    use lettre::transport::stub::AsyncStubTransport;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        service: PackageService,
        stub: Arc<AsyncStubTransport>,
        owner: User,
        other: User,
    }

    async fn setup_with(stub: AsyncStubTransport) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let owner = users
            .create(&User::new("owner".into(), "owner@example.com".into(), "h".into(), UserRole::Admin))
            .await
            .unwrap();
        let other = users
            .create(&User::new("other".into(), "other@example.com".into(), "h".into(), UserRole::Member))
            .await
            .unwrap();

        let stub = Arc::new(stub);
        let mail = MailConfig {
            managers: vec![Manager {
                name: "Mod".to_string(),
                email: "mod@example.org".to_string(),
            }],
            ..MailConfig::default()
        };
        let notifier = FlagNotifier::new(
            Arc::new(TemplateEngine::load(None).unwrap()),
            stub.clone(),
            ServerConfig::default(),
            &mail,
        )
        .unwrap();

        Fixture {
            service: PackageService::new(SqlxPackageRepository::boxed(pool), Arc::new(notifier)),
            stub,
            owner,
            other,
        }
    }

    async fn setup() -> Fixture {
        setup_with(AsyncStubTransport::new_ok()).await
    }

    fn input(name: &str) -> CreatePackageInput {
        CreatePackageInput {
            name: name.to_string(),
            description: "desc".to_string(),
            repository_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_creator_and_unique_slug() {
        let fx = setup().await;

        let first = fx.service.create(&fx.other, input("Geo Tools")).await.unwrap();
        let second = fx.service.create(&fx.owner, input("Geo  tools")).await.unwrap();

        assert_eq!(first.creator_id, fx.other.id);
        assert_eq!(first.slug, "geo-tools");
        assert_eq!(second.slug, "geo-tools-2");
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let fx = setup().await;

        let blank = fx.service.create(&fx.owner, input("   ")).await;
        assert!(matches!(blank, Err(PackageServiceError::ValidationError(_))));

        let long = fx.service.create(&fx.owner, input(&"x".repeat(101))).await;
        assert!(matches!(long, Err(PackageServiceError::ValidationError(_))));

        let mut bad_url = input("ok");
        bad_url.repository_url = Some("ftp://example.com".to_string());
        let result = fx.service.create(&fx.owner, bad_url).await;
        assert!(matches!(result, Err(PackageServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_non_creator_cannot_reach_edit() {
        let fx = setup().await;
        let package = fx.service.create(&fx.other, input("Mine")).await.unwrap();

        // Being an administrator does not grant ownership.
        let as_admin = fx.service.get_for_edit(package.id, &fx.owner).await;
        assert!(matches!(as_admin, Err(PackageServiceError::NotFound(_))));

        let update = UpdatePackageInput {
            name: Some("Stolen".to_string()),
            ..Default::default()
        };
        let result = fx.service.update(package.id, &fx.owner, update).await;
        assert!(matches!(result, Err(PackageServiceError::NotFound(_))));

        let result = fx.service.delete(package.id, &fx.owner).await;
        assert!(matches!(result, Err(PackageServiceError::NotFound(_))));
        assert_eq!(fx.service.get(package.id).await.unwrap().name, "Mine");
    }

    #[tokio::test]
    async fn test_creator_can_update_and_delete() {
        let fx = setup().await;
        let package = fx.service.create(&fx.other, input("Mine")).await.unwrap();

        let update = UpdatePackageInput {
            description: Some("Better".to_string()),
            repository_url: Some("https://example.com/mine".to_string()),
            ..Default::default()
        };
        let updated = fx.service.update(package.id, &fx.other, update).await.unwrap();
        assert_eq!(updated.description, "Better");
        assert_eq!(updated.slug, "mine");

        fx.service.delete(package.id, &fx.other).await.unwrap();
        assert!(matches!(
            fx.service.get(package.id).await,
            Err(PackageServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_paginates_by_ten() {
        let fx = setup().await;
        for i in 0..23 {
            fx.service.create(&fx.owner, input(&format!("pkg {}", i))).await.unwrap();
        }

        let first = fx.service.list(1).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_pages(), 3);
        assert_eq!(first.items[0].name, "pkg 22");

        let last = fx.service.list(3).await.unwrap();
        assert_eq!(last.items.len(), 3);

        assert!(matches!(fx.service.list(4).await, Err(PackageServiceError::NotFound(_))));
        assert!(matches!(fx.service.list(0).await, Err(PackageServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_list_serves_first_page() {
        let fx = setup().await;

        let page = fx.service.list(1).await.unwrap();
        assert!(page.items.is_empty());
        assert!(matches!(fx.service.list(2).await, Err(PackageServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_flag_sends_one_mail_and_confirms() {
        let fx = setup().await;
        let package = fx.service.create(&fx.owner, input("Geo")).await.unwrap();

        let message = fx.service.flag(package.id, &fx.other, "Spam link").await.unwrap();

        assert_eq!(message.level, FlashLevel::Success);
        assert!(message.text.starts_with("Thanks for flagging Geo."));
        assert_eq!(fx.stub.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_flag_delivery_failure_becomes_error_message() {
        let fx = setup_with(AsyncStubTransport::new_error()).await;
        let package = fx.service.create(&fx.owner, input("Geo")).await.unwrap();

        let message = fx.service.flag(package.id, &fx.other, "Spam").await.unwrap();

        assert_eq!(message.level, FlashLevel::Error);
        assert!(message.text.starts_with("Sorry, an error occurred"));
    }

    #[tokio::test]
    async fn test_flag_missing_package_or_reason() {
        let fx = setup().await;

        let missing = fx.service.flag(999, &fx.other, "Spam").await;
        assert!(matches!(missing, Err(PackageServiceError::NotFound(_))));

        let package = fx.service.create(&fx.owner, input("Geo")).await.unwrap();
        let blank = fx.service.flag(package.id, &fx.other, "  ").await;
        assert!(matches!(blank, Err(PackageServiceError::ValidationError(_))));
        assert!(fx.stub.messages().await.is_empty());
    }

    /// Reports every slug as free until its first answer, like a request
    /// that checked just before a concurrent insert.
    struct StaleSlugCheck {
        inner: Arc<dyn PackageRepository>,
        stale: AtomicBool,
    }

    #[async_trait]
    impl PackageRepository for StaleSlugCheck {
        async fn create(&self, package: &Package) -> anyhow::Result<Package> {
            self.inner.create(package).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Package>> {
            self.inner.get_by_id(id).await
        }

        async fn exists_by_slug(&self, slug: &str) -> anyhow::Result<bool> {
            if self.stale.swap(false, Ordering::SeqCst) {
                return Ok(false);
            }
            self.inner.exists_by_slug(slug).await
        }

        async fn list(&self, offset: i64, limit: i64) -> anyhow::Result<Vec<Package>> {
            self.inner.list(offset, limit).await
        }

        async fn count(&self) -> anyhow::Result<i64> {
            self.inner.count().await
        }

        async fn update(&self, package: &Package) -> anyhow::Result<Package> {
            self.inner.update(package).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_create_retries_slug_taken_concurrently() {
        let fx = setup().await;
        fx.service.create(&fx.owner, input("Geo")).await.unwrap();

        let racing = PackageService::new(
            Arc::new(StaleSlugCheck {
                inner: fx.service.repo.clone(),
                stale: AtomicBool::new(true),
            }),
            fx.service.notifier.clone(),
        );
        let second = racing.create(&fx.other, input("Geo")).await.unwrap();

        assert_eq!(second.slug, "geo-2");
        assert_eq!(fx.service.repo.count().await.unwrap(), 2);
    }
}
