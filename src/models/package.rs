//! Package model
//!
//! A package is a piece of software that projects can use. Only its creator
//! may edit or delete it; anyone signed in may flag it for moderation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub repository_url: Option<String>,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn new(
        name: String,
        slug: String,
        description: String,
        repository_url: Option<String>,
        creator_id: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            slug,
            description,
            repository_url,
            creator_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Site-relative URL of the package detail endpoint
    pub fn url_path(&self) -> String {
        format!("/api/v1/packages/{}", self.id)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Form data for creating a package
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePackageInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repository_url: Option<String>,
}

/// Form data for editing a package
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePackageInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub repository_url: Option<String>,
}

/// Form data for flagging a package
#[derive(Debug, Clone, Deserialize)]
pub struct FlagPackageInput {
    #[serde(default)]
    pub reason: String,
}
