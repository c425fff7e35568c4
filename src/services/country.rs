//! Country service
//!
//! Administration of the countries that give projects their scope.

use crate::db::repositories::CountryRepository;
use crate::models::{Country, CreateCountryInput, UpdateCountryInput};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CountryServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Country already exists: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CountryService {
    repo: Arc<dyn CountryRepository>,
}

impl CountryService {
    pub fn new(repo: Arc<dyn CountryRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Country>, CountryServiceError> {
        Ok(self.repo.list().await.context("Failed to list countries")?)
    }

    pub async fn create(&self, input: CreateCountryInput) -> Result<Country, CountryServiceError> {
        let country = Country {
            id: 0,
            name: required("Name", &input.name)?,
            code: normalize_code(&input.code)?,
            scope: required("Scope", &input.scope)?,
        };
        self.ensure_unique(&country).await?;

        Ok(self
            .repo
            .create(&country)
            .await
            .context("Failed to create country")?)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateCountryInput,
    ) -> Result<Country, CountryServiceError> {
        let mut country = self.get(id).await?;

        if let Some(name) = input.name {
            country.name = required("Name", &name)?;
        }
        if let Some(code) = input.code {
            country.code = normalize_code(&code)?;
        }
        if let Some(scope) = input.scope {
            country.scope = required("Scope", &scope)?;
        }
        self.ensure_unique(&country).await?;

        Ok(self
            .repo
            .update(&country)
            .await
            .context("Failed to update country")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), CountryServiceError> {
        self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete country")?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Country, CountryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get country")?
            .ok_or_else(|| CountryServiceError::NotFound(format!("Country {} not found", id)))
    }

    async fn ensure_unique(&self, country: &Country) -> Result<(), CountryServiceError> {
        let existing = self.list().await?;
        let clash = existing.iter().find(|other| {
            other.id != country.id
                && (other.code == country.code || other.name.eq_ignore_ascii_case(&country.name))
        });
        match clash {
            Some(other) => Err(CountryServiceError::Conflict(other.name.clone())),
            None => Ok(()),
        }
    }
}

fn required(field: &str, value: &str) -> Result<String, CountryServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CountryServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(value.to_string())
}

fn normalize_code(code: &str) -> Result<String, CountryServiceError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CountryServiceError::ValidationError(format!(
            "Invalid country code '{}': expected two letters",
            code
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCountryRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> CountryService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        CountryService::new(SqlxCountryRepository::boxed(pool))
    }

    fn input(name: &str, code: &str, scope: &str) -> CreateCountryInput {
        CreateCountryInput {
            name: name.to_string(),
            code: code.to_string(),
            scope: scope.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_code() {
        let service = setup_service().await;
        let country = service.create(input(" Kenya ", "ke", "africa")).await.unwrap();

        assert_eq!(country.name, "Kenya");
        assert_eq!(country.code, "KE");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_and_duplicate() {
        let service = setup_service().await;
        service.create(input("Kenya", "KE", "africa")).await.unwrap();

        assert!(matches!(
            service.create(input("Kenya", "KN", "africa")).await,
            Err(CountryServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.create(input("Kenia", "KEN", "africa")).await,
            Err(CountryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input("Chad", "TD", " ")).await,
            Err(CountryServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = setup_service().await;
        let country = service.create(input("Kenya", "KE", "africa")).await.unwrap();

        let update = UpdateCountryInput {
            scope: Some("east-africa".to_string()),
            ..Default::default()
        };
        let updated = service.update(country.id, update).await.unwrap();
        assert_eq!(updated.scope, "east-africa");
        assert_eq!(updated.code, "KE");

        service.delete(country.id).await.unwrap();
        assert!(matches!(
            service.delete(country.id).await,
            Err(CountryServiceError::NotFound(_))
        ));
    }
}
