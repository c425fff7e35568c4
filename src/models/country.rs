//! Country model
//!
//! A country belongs to exactly one geographic scope; projects are partitioned
//! by the scopes of the countries they operate in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: i64,
    pub name: String,
    /// ISO-3166 alpha-2 code, upper case
    pub code: String,
    pub scope: String,
}

/// Input for creating a country
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCountryInput {
    pub name: String,
    pub code: String,
    pub scope: String,
}

/// Input for updating a country
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCountryInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub scope: Option<String>,
}
