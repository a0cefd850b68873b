//! Prefix matching and stripping for request targets.

/// Strips one leading `prefix` segment from a request target.
///
/// The prefix matches only on a segment boundary: the target must equal
/// the prefix or continue with `/` or `?`. The query string is kept, and
/// an empty remainder becomes `/`. A trailing slash on `prefix` is
/// ignored, and an empty prefix matches every target.
///
/// Returns `None` when the target is outside the prefix.
///
/// # Example
///
/// ```
/// # use waypoint::proxy::rewrite::strip_prefix;
/// assert_eq!(strip_prefix("/api/run", "/api").as_deref(), Some("/run"));
/// assert_eq!(strip_prefix("/api/api/run", "/api").as_deref(), Some("/api/run"));
/// assert_eq!(strip_prefix("/api?x=1", "/api").as_deref(), Some("/?x=1"));
/// assert_eq!(strip_prefix("/apiv2/run", "/api"), None);
/// ```
pub fn strip_prefix(target: &str, prefix: &str) -> Option<String> {
    let prefix = prefix.trim_end_matches('/');

    if prefix.is_empty() {
        return target.starts_with('/').then(|| target.to_string());
    }

    let rest = target.strip_prefix(prefix)?;

    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else if rest.starts_with('?') {
        Some(format!("/{}", rest))
    } else {
        None
    }
}

/// Prepends the upstream base path to an already stripped target.
///
/// `join_base_path("/v1", "/run")` is `/v1/run`; an empty or `/` base
/// leaves the target as it is.
pub fn join_base_path(base: &str, target: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        target.to_string()
    } else {
        format!("{}{}", base, target)
    }
}
