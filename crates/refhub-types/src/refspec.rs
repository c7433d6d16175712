//! Refspec matching.
//!
//! A refspec selects ref names for a watch or subscription scope. The
//! supported forms are an exact ref name or a glob where `*` matches any
//! run of characters (so the bare refspec `*` matches everything).

/// Returns `true` iff `spec` matches the ref name.
///
/// Matching is total: no spec/name combination panics, and an empty spec
/// matches only the empty name.
pub fn refspec_matches(spec: &str, name: &str) -> bool {
    if !spec.contains('*') {
        return spec == name;
    }
    glob_match(spec, name)
}

/// Returns `true` iff any of `specs` matches the ref name.
pub fn matches_any(specs: &[String], name: &str) -> bool {
    specs.iter().any(|s| refspec_matches(s, name))
}

/// Iterative wildcard match with backtracking over the last `*`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((spi, sti)) = star {
            pi = spi + 1;
            ti = sti + 1;
            star = Some((spi, sti + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
