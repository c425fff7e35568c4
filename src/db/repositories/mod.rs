//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity.

pub mod country;
pub mod package;
pub mod project;
pub mod session;
pub mod user;

pub use country::{CountryRepository, SqlxCountryRepository};
pub use package::{PackageRepository, SqlxPackageRepository};
pub use project::{ProjectRepository, SqlxProjectRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
