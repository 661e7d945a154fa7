/*!
 * Locator parsing: `scheme://container/object/path`
 */

use super::ObjectLocation;
use crate::error::{RelayError, Result};

/// Split a storage locator into its container and object path
///
/// Query strings and fragments are discarded; the object path keeps every
/// other character verbatim (no percent-decoding), so keys containing spaces
/// or unicode round-trip unchanged.
pub fn parse_locator(locator: &str) -> Result<ObjectLocation> {
    let invalid = |reason: &str| RelayError::InvalidLocator {
        locator: locator.to_string(),
        reason: reason.to_string(),
    };

    let (scheme, rest) = locator
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme (expected scheme://container/path)"))?;

    if !is_valid_scheme(scheme) {
        return Err(invalid("invalid scheme"));
    }

    let rest = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let (container, path) = match rest.split_once('/') {
        Some((container, path)) => (container, path.trim_start_matches('/')),
        None => (rest, ""),
    };

    if container.is_empty() {
        return Err(invalid("missing container"));
    }
    if path.is_empty() {
        return Err(invalid("missing object path"));
    }

    Ok(ObjectLocation::new(
        scheme.to_ascii_lowercase(),
        container,
        path,
    ))
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}
