//! Backend pattern subscriptions.
//!
//! Patterns are globs in which `*` matches any run of characters,
//! separators included. A glob cannot match an absent trailing level, so a
//! topic ending in `.*` is subscribed with two patterns: itself and the
//! topic without the suffix. `a.b.*` + `a.b` together match what `a/b/#`
//! means in the standard scheme.

use crate::topic::{BACKEND_SEPARATOR, BACKEND_WILDCARD};

/// Returns the patterns a subscription to `topic` is realised with.
pub fn backend_patterns(topic: &str) -> Vec<String> {
    let suffix = format!("{BACKEND_SEPARATOR}{BACKEND_WILDCARD}");
    match topic.strip_suffix(suffix.as_str()) {
        Some(parent) if !parent.is_empty() => vec![topic.to_string(), parent.to_string()],
        _ => vec![topic.to_string()],
    }
}

/// Glob match of `channel` against `pattern`.
pub fn matches(pattern: &str, channel: &str) -> bool {
    let p = pattern.as_bytes();
    let c = channel.as_bytes();
    let (mut pi, mut ci) = (0, 0);
    // position of the last `*` seen and the channel index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while ci < c.len() {
        if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ci));
            pi += 1;
        } else if pi < p.len() && p[pi] == c[ci] {
            pi += 1;
            ci += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ci = matched + 1;
            backtrack = Some((star, ci));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|b| *b == b'*')
}

/// True when `channel` matches any of `patterns`.
pub fn matches_any(patterns: &[String], channel: &str) -> bool {
    patterns.iter().any(|p| matches(p, channel))
}
