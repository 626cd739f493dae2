//! Helpers for external change links (pull requests, merge requests).

use crate::error::{Error, Result};

/// Extracts the trailing numeric identifier from a pull-request or
/// merge-request URL.
///
/// Accepts any URL whose last path segment is numeric, which covers both
/// GitHub (`.../pull/1543`) and GitLab (`.../-/merge_requests/1503`) shapes.
///
/// # Errors
///
/// Returns a validation error when the URL does not end with a non-empty
/// numeric segment; a bare trailing slash carries no usable id and is
/// rejected too.
pub fn catch_pull_request_id(input: &str) -> Result<String> {
    let candidate = input.rsplit('/').next().unwrap_or("");
    if !candidate.is_empty() && input.contains('/') && candidate.bytes().all(|b| b.is_ascii_digit())
    {
        Ok(candidate.to_string())
    } else {
        Err(Error::validation(format!(
            "no pull request id found in {input}"
        )))
    }
}
