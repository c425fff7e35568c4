//! Project model and the composable project query
//!
//! Projects carry a draft/published status, may be featured, and are scoped
//! geographically through their countries. `ProjectQuery` is the filter that
//! every project listing is expressed in.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Country;

/// Project status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Published,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            _ => Err(anyhow::anyhow!("Invalid project status: {}", s)),
        }
    }
}

/// Project record with its relations loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub creator_id: i64,
    pub status: ProjectStatus,
    pub is_active: bool,
    pub feature: bool,
    pub started: Option<NaiveDate>,
    pub description: String,
    pub challenges: String,
    pub audience: String,
    pub technologies: String,
    pub metrics: String,
    pub num_users: Option<i64>,
    pub repository_url: Option<String>,
    pub countries: Vec<Country>,
    pub collaborators: Vec<i64>,
    pub packages: Vec<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// True when `user_id` may see and edit this project while it is a draft
    pub fn is_editable_by(&self, user_id: i64) -> bool {
        self.creator_id == user_id || self.collaborators.contains(&user_id)
    }
}

/// Row shown in the administration list
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
    pub updated: DateTime<Utc>,
    pub is_active: bool,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            updated: project.updated_at,
            is_active: project.is_active,
        }
    }
}

/// Column values written by create and update. Relations are replaced
/// wholesale when present.
#[derive(Debug, Clone, Default)]
pub struct ProjectRecord {
    pub name: String,
    pub slug: String,
    pub creator_id: i64,
    pub status: ProjectStatus,
    pub is_active: bool,
    pub feature: bool,
    pub started: Option<NaiveDate>,
    pub description: String,
    pub challenges: String,
    pub audience: String,
    pub technologies: String,
    pub metrics: String,
    pub num_users: Option<i64>,
    pub repository_url: Option<String>,
    pub countries: Vec<i64>,
    pub collaborators: Vec<i64>,
    pub packages: Vec<i64>,
    pub tags: Vec<String>,
}

impl From<&Project> for ProjectRecord {
    fn from(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            slug: project.slug.clone(),
            creator_id: project.creator_id,
            status: project.status,
            is_active: project.is_active,
            feature: project.feature,
            started: project.started,
            description: project.description.clone(),
            challenges: project.challenges.clone(),
            audience: project.audience.clone(),
            technologies: project.technologies.clone(),
            metrics: project.metrics.clone(),
            num_users: project.num_users,
            repository_url: project.repository_url.clone(),
            countries: project.countries.iter().map(|c| c.id).collect(),
            collaborators: project.collaborators.clone(),
            packages: project.packages.clone(),
            tags: project.tags.clone(),
        }
    }
}

/// Admin input for creating a project
///
/// `slug` is derived from `name` when omitted. `created`/`updated` are not
/// accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub creator_id: i64,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub feature: bool,
    #[serde(default)]
    pub started: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub challenges: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub technologies: String,
    #[serde(default)]
    pub metrics: String,
    #[serde(default)]
    pub num_users: Option<i64>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub countries: Vec<i64>,
    #[serde(default)]
    pub collaborators: Vec<i64>,
    #[serde(default)]
    pub packages: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Admin input for updating a project; absent fields are left unchanged.
///
/// The nullable columns take `Some(None)` (JSON `null`) to clear them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub creator_id: Option<i64>,
    pub status: Option<ProjectStatus>,
    pub is_active: Option<bool>,
    pub feature: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub started: Option<Option<NaiveDate>>,
    pub description: Option<String>,
    pub challenges: Option<String>,
    pub audience: Option<String>,
    pub technologies: Option<String>,
    pub metrics: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub num_users: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub repository_url: Option<Option<String>>,
    pub countries: Option<Vec<i64>>,
    pub collaborators: Option<Vec<i64>>,
    pub packages: Option<Vec<i64>>,
    pub tags: Option<Vec<String>>,
}

// A field that is present, even as `null`, deserializes to `Some`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// What a related-projects lookup is anchored on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedTo {
    /// Projects the user collaborates on
    User(i64),
    /// Projects that use the package
    Package(i64),
}

/// Composable project filter.
///
/// Every criterion narrows the result; an empty query matches all projects.
/// Results are always distinct and ordered most recently updated first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    pub feature: Option<bool>,
    pub is_active: Option<bool>,
    pub scope: Option<String>,
    pub collaborator: Option<i64>,
    pub package: Option<i64>,
    /// Creator OR collaborator
    pub editable_by: Option<i64>,
}

impl ProjectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ProjectStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn published(self) -> Self {
        self.status(ProjectStatus::Published)
    }

    pub fn drafts(self) -> Self {
        self.status(ProjectStatus::Draft)
    }

    pub fn feature(mut self, feature: bool) -> Self {
        self.feature = Some(feature);
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn collaborator(mut self, user_id: i64) -> Self {
        self.collaborator = Some(user_id);
        self
    }

    pub fn package(mut self, package_id: i64) -> Self {
        self.package = Some(package_id);
        self
    }

    pub fn editable_by(mut self, user_id: i64) -> Self {
        self.editable_by = Some(user_id);
        self
    }

    pub fn related_to(self, related: RelatedTo) -> Self {
        match related {
            RelatedTo::User(user_id) => self.collaborator(user_id),
            RelatedTo::Package(package_id) => self.package(package_id),
        }
    }
}
