//! Services layer - Business logic
//!
//! Services implement the business rules of ProjectHub on top of the
//! repositories:
//! - Validation and ownership checks
//! - Slug generation and uniqueness
//! - Project queries, random sampling and feature selection
//! - Flag notifications and transient status messages

pub mod country;
pub mod flash;
pub mod mail;
pub mod package;
pub mod password;
pub mod project;
pub mod random;
pub mod slug;
pub mod url;
pub mod user;

pub use country::{CountryService, CountryServiceError};
pub use flash::{FlashLevel, FlashMessage, FlashStore};
pub use mail::{build_transport, FlagNotifier, LogTransport, MailTransport};
pub use package::{PackageService, PackageServiceError, PACKAGES_PER_PAGE};
pub use password::{hash_password, verify_password};
pub use project::{ProjectService, ProjectServiceError};
pub use slug::generate_slug;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
