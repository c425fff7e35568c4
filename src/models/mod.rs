//! Data models
//!
//! This module contains the data structures used throughout ProjectHub:
//! - Database entities (User, Session, Country, Package, Project)
//! - API input types
//! - The composable `ProjectQuery` filter and pagination types

mod country;
mod package;
mod pagination;
mod project;
mod session;
mod user;

pub use country::{Country, CreateCountryInput, UpdateCountryInput};
pub use package::{CreatePackageInput, FlagPackageInput, Package, UpdatePackageInput};
pub use pagination::{ListParams, PagedResult};
pub use project::{
    CreateProjectInput, Project, ProjectQuery, ProjectRecord, ProjectStatus, ProjectSummary,
    RelatedTo, UpdateProjectInput,
};
pub use session::Session;
pub use user::{PublicUser, User, UserRole};
