//! Ref and repo name validation.
//!
//! Valid ref names:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `[`, `\`
//! - Must not contain `..` (double dot)
//! - Must not start or end with `.` or `/`
//! - Must not contain consecutive slashes (`//`)
//!
//! `*` is rejected in ref names (it is reserved for refspecs).

use crate::error::{Result, TypeError};

/// The ref every repo owns for its local working state.
///
/// The head ref is special in two places: a repo with refs other than its
/// head cannot gain a remote, and upstream deletes/resets never clobber it.
pub const HEAD_REF: &str = "head";

/// Prefix under which shared lines of history live (e.g. "branch/main").
pub const BRANCH_PREFIX: &str = "branch/";

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Validate a ref name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use refhub_types::names::validate_ref_name;
///
/// assert!(validate_ref_name("head").is_ok());
/// assert!(validate_ref_name("branch/main").is_ok());
/// assert!(validate_ref_name("").is_err());
/// assert!(validate_ref_name("bad..name").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TypeError::InvalidRefName {
            name: name.to_string(),
            reason: "ref name must not be empty".into(),
        });
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(TypeError::InvalidRefName {
                name: name.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }

    if name.contains("..") {
        return Err(TypeError::InvalidRefName {
            name: name.to_string(),
            reason: "must not contain '..'".into(),
        });
    }

    if name.starts_with('.') || name.ends_with('.') {
        return Err(TypeError::InvalidRefName {
            name: name.to_string(),
            reason: "must not start or end with '.'".into(),
        });
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(TypeError::InvalidRefName {
            name: name.to_string(),
            reason: "must not start or end with '/'".into(),
        });
    }

    if name.contains("//") {
        return Err(TypeError::InvalidRefName {
            name: name.to_string(),
            reason: "must not contain consecutive slashes '//'".into(),
        });
    }

    Ok(())
}

/// Validate a repo name. Same character rules as ref names, but `*` aside,
/// repo names additionally allow dots in path components (host names appear
/// in repo paths, e.g. "example.com/foo").
pub fn validate_repo_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TypeError::InvalidRepoName {
            name: name.to_string(),
            reason: "repo name must not be empty".into(),
        });
    }
    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(TypeError::InvalidRepoName {
                name: name.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }
    if name.contains("..") {
        return Err(TypeError::InvalidRepoName {
            name: name.to_string(),
            reason: "must not contain '..'".into(),
        });
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(TypeError::InvalidRepoName {
            name: name.to_string(),
            reason: "must not start or end with '/'".into(),
        });
    }
    Ok(())
}
