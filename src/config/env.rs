//! `${NAME}` / `${NAME:-default}` expansion for configuration strings.

use thiserror::Error;

/// A referenced variable was unset and had no default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("environment variable {0} is not set")]
pub struct MissingVar(pub String);

/// Expand every `${...}` reference in `input`.
///
/// Unterminated `${` sequences are copied through verbatim.
pub fn expand_with<F>(input: &str, lookup: F) -> Result<String, MissingVar>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let reference = &after[..end];
        let (name, default) = match reference.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (reference, None),
        };

        match lookup(name).filter(|v| !v.is_empty()).or_else(|| default.map(str::to_string)) {
            Some(value) => out.push_str(&value),
            None => return Err(MissingVar(name.to_string())),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Expand references, substituting the empty string for unset variables.
pub fn expand_or_empty<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut current = input.to_string();
    loop {
        match expand_with(&current, &lookup) {
            Ok(expanded) => return expanded,
            Err(MissingVar(name)) => {
                current = current.replacen(&format!("${{{name}}}"), "", 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "PORT" => Some("8080".into()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn test_expand() {
        assert_eq!(expand_with("http://localhost:${PORT}/test", lookup).unwrap(), "http://localhost:8080/test");
        assert_eq!(expand_with("no refs", lookup).unwrap(), "no refs");
        assert_eq!(expand_with("${KEY:-test}", lookup).unwrap(), "test");
        assert_eq!(expand_with("${EMPTY:-fallback}", lookup).unwrap(), "fallback");
        assert_eq!(expand_with("${PORT", lookup).unwrap(), "${PORT");
    }

    #[test]
    fn test_missing_variable() {
        assert_eq!(expand_with("${WEATHER_URL}", lookup), Err(MissingVar("WEATHER_URL".into())));
    }

    #[test]
    fn test_expand_or_empty() {
        assert_eq!(expand_or_empty("key-${NOPE}-${PORT}", lookup), "key--8080");
    }
}
