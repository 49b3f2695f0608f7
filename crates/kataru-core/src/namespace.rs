//! Namespace conventions for story identifiers.
//!
//! Story identifiers (passages, characters, commands) may be qualified as
//! `"namespace:name"`. Identifiers without a delimiter belong to the global
//! namespace. These helpers back the generated-constants tooling.

/// The implicit namespace of unqualified identifiers.
pub const GLOBAL: &str = "global";

/// Sentinel identifier that belongs to every namespace.
pub const NONE: &str = "None";

/// Separator between a namespace and a local name.
pub const DELIMITER: char = ':';

/// The namespace of an identifier, or [`GLOBAL`] when unqualified.
pub fn namespace_of(identifier: &str) -> &str {
    match identifier.split_once(DELIMITER) {
        Some((namespace, _)) => namespace,
        None => GLOBAL,
    }
}

/// The local part of an identifier, with any namespace stripped.
pub fn local_name(identifier: &str) -> &str {
    match identifier.split_once(DELIMITER) {
        Some((_, local)) => local,
        None => identifier,
    }
}

/// Filter identifiers down to those belonging to `namespace`.
///
/// Global identifiers are those with no delimiter; [`NONE`] is kept for
/// every namespace.
pub fn filter_by_namespace<'a>(identifiers: &'a [String], namespace: &str) -> Vec<&'a str> {
    identifiers
        .iter()
        .map(String::as_str)
        .filter(|identifier| {
            *identifier == NONE
                || if namespace == GLOBAL {
                    !identifier.contains(DELIMITER)
                } else {
                    identifier
                        .strip_prefix(namespace)
                        .and_then(|rest| rest.strip_prefix(DELIMITER))
                        .is_some()
                }
        })
        .collect()
}

/// Turn an identifier into a `SCREAMING_SNAKE_CASE` constant name.
///
/// Namespace delimiters and non-alphanumeric characters become underscores;
/// a leading digit is prefixed with an underscore.
pub fn const_ident(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    let mut prev_underscore = false;
    for (i, c) in identifier.chars().enumerate() {
        if c.is_ascii_alphanumeric() {
            // Break camelCase boundaries: "GiveItem" -> "GIVE_ITEM".
            if c.is_ascii_uppercase() && i > 0 && !prev_underscore && !out.is_empty() {
                let splits_word = identifier
                    .chars()
                    .nth(i - 1)
                    .is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
                if splits_word {
                    out.push('_');
                }
            }
            out.push(c.to_ascii_uppercase());
            prev_underscore = false;
        } else if !prev_underscore && !out.is_empty() {
            out.push('_');
            prev_underscore = true;
        } else {
            prev_underscore = true;
        }
    }
    let out = out.trim_end_matches('_').to_string();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("_{out}")
    } else {
        out
    }
}
