//! Environment variable substitution for configuration files.
//!
//! `${NAME}` and `$NAME` are replaced with the variable's value. Unset
//! variables expand to the empty string so that validation reports the
//! missing field rather than a literal `${...}` leaking into a request.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENV_REF_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<braced>[^}]*)\}|\$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)").ok()
});

/// Expand references using the process environment
#[must_use]
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand references using an arbitrary lookup
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Some(regex) = ENV_REF_REGEX.as_ref() else {
        return input.to_string();
    };

    regex
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .name("braced")
                .or_else(|| caps.name("bare"))
                .map_or("", |m| m.as_str());
            lookup(name).unwrap_or_default()
        })
        .into_owned()
}
