//! Topic translation
//!
//! Callers use the standard hierarchical scheme: `/` separates levels, `#`
//! is the multi-level wildcard (trailing only) and `+` the single-level
//! wildcard. The backend only knows `.` as separator and a single `*`
//! wildcard, so both standard wildcards collapse into `*` on the way out.
//!
//! The reverse mapping is lossy: `*` followed by `.` comes back as `+`,
//! every other `*` comes back as `#`. A topic ending in a single-level
//! wildcard (`a/+`) is therefore reported back as `a/#`. There is no
//! information on the wire to tell the two apart.

use crate::utils::{MessagingError, Result};

pub const STANDARD_SEPARATOR: &str = "/";
pub const STANDARD_WILDCARD: &str = "#";
pub const SINGLE_LEVEL_WILDCARD: &str = "+";
pub const BACKEND_SEPARATOR: &str = ".";
pub const BACKEND_WILDCARD: &str = "*";

/// Converts a standard topic into the backend scheme.
pub fn to_backend(topic: &str) -> String {
    topic
        .replace(STANDARD_SEPARATOR, BACKEND_SEPARATOR)
        .replace(STANDARD_WILDCARD, BACKEND_WILDCARD)
        .replace(SINGLE_LEVEL_WILDCARD, BACKEND_WILDCARD)
}

/// Converts a backend topic back into the standard scheme.
pub fn from_backend(topic: &str) -> String {
    let wildcard_level = format!("{BACKEND_WILDCARD}{BACKEND_SEPARATOR}");
    let single_level = format!("{SINGLE_LEVEL_WILDCARD}{STANDARD_SEPARATOR}");

    topic
        .replace(&wildcard_level, &single_level)
        .replace(BACKEND_SEPARATOR, STANDARD_SEPARATOR)
        .replace(BACKEND_WILDCARD, STANDARD_WILDCARD)
}

/// Checks that `topic` can be published to.
pub fn validate_publish_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(MessagingError::invalid_topic(
            topic,
            "unable to publish to an empty topic",
        ));
    }
    Ok(())
}

/// Checks that `topic` is a well formed subscription filter: non-empty,
/// a single-level wildcard only as a whole level and a multi-level wildcard
/// only as the whole last level.
pub fn validate_subscription_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(MessagingError::invalid_topic(
            topic,
            "unable to subscribe to an empty topic",
        ));
    }

    let levels: Vec<&str> = topic.split(STANDARD_SEPARATOR).collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains(STANDARD_WILDCARD) && (i != last || *level != STANDARD_WILDCARD) {
            return Err(MessagingError::invalid_topic(
                topic,
                "multi-level wildcard must be the trailing level",
            ));
        }
        if level.contains(SINGLE_LEVEL_WILDCARD) && *level != SINGLE_LEVEL_WILDCARD {
            return Err(MessagingError::invalid_topic(
                topic,
                "single-level wildcard must occupy a whole level",
            ));
        }
    }
    Ok(())
}

/// Joins topic levels with the standard separator.
pub fn build_topic<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(STANDARD_SEPARATOR)
}
