//! Repository URL validation shared by packages and projects

/// Longest URL the `repository_url` columns hold
pub const MAX_URL_LEN: usize = 255;

/// Trim a repository URL; blank becomes `None`.
///
/// The error is the user-facing validation message.
pub fn normalize_repository_url(url: Option<String>) -> Result<Option<String>, String> {
    let url = match url.map(|u| u.trim().to_string()) {
        Some(u) if !u.is_empty() => u,
        _ => return Ok(None),
    };
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err("Repository URL must start with http:// or https://".to_string());
    }
    if url.len() > MAX_URL_LEN {
        return Err(format!(
            "Repository URL cannot exceed {} characters",
            MAX_URL_LEN
        ));
    }
    Ok(Some(url))
}
