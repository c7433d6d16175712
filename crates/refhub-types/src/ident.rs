//! Ref addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The addressing key for watches and updates: a (repo, ref) pair.
///
/// Identifiers are immutable values, ordered by (repo, ref) so that
/// listings are deterministic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefIdentifier {
    /// Repository name (an opaque path-like string).
    pub repo: String,
    /// Ref name within the repository (e.g. "head", "branch/main").
    #[serde(rename = "ref")]
    pub ref_name: String,
}

impl RefIdentifier {
    /// Create an identifier from repo and ref names.
    pub fn new(repo: impl Into<String>, ref_name: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            ref_name: ref_name.into(),
        }
    }
}

impl fmt::Display for RefIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo, self.ref_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let id = RefIdentifier::new("r", "branch/x");
        assert_eq!(id.to_string(), "r:branch/x");
    }

    #[test]
    fn ordering_by_repo_then_ref() {
        let a = RefIdentifier::new("a", "z");
        let b = RefIdentifier::new("b", "a");
        let c = RefIdentifier::new("b", "b");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn serde_uses_ref_key() {
        let id = RefIdentifier::new("r", "head");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["repo"], "r");
        assert_eq!(json["ref"], "head");
    }
}
