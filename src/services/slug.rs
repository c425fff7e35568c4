//! URL slug generation

use anyhow::Result;
use std::future::Future;

/// Turn a display name into a URL slug.
///
/// Lowercases ASCII, keeps non-ASCII letters, collapses every run of other
/// characters into a single hyphen and trims hyphens from both ends.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Pick a slug derived from `base` that `taken` reports as free, appending
/// `-2`, `-3`, ... on collision. An empty base falls back to `fallback`.
pub async fn unique_slug<F, Fut>(base: &str, fallback: &str, mut taken: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let base = if base.is_empty() { fallback } else { base };

    if !taken(base.to_string()).await? {
        return Ok(base.to_string());
    }

    let mut suffix = 2;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}
