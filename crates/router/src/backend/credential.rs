//! API key resolution.

use tracing::warn;

/// Resolve a configured API key.
///
/// A value of the form `${NAME}` is read from the environment variable
/// `NAME`. An unset variable yields an empty key and a warning; the provider
/// will then typically answer 401 on first use.
pub fn resolve_credential(raw: Option<&str>) -> String {
    resolve_with(raw, |name| std::env::var(name).ok())
}

fn resolve_with(raw: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    match env_reference(raw) {
        Some(name) => lookup(name).unwrap_or_else(|| {
            warn!(variable = name, "credential variable is not set, using an empty key");
            String::new()
        }),
        None => raw.to_string(),
    }
}

fn env_reference(raw: &str) -> Option<&str> {
    raw.strip_prefix("${")?
        .strip_suffix('}')
        .filter(|name| !name.is_empty())
}
