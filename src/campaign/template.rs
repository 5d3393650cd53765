//! Query template values and the `%header:<name>%` placeholder grammar.
//!
//! # Grammar
//! ```text
//! placeholder := DELIM source SEP name DELIM
//! DELIM       := '%'
//! SEP         := ':'
//! ```
//! A value is split on runs of `%`/`:` characters. It is a placeholder only
//! when the split yields at least three parts and both the first and the last
//! part are empty. Placeholders whose source is not `header` stay literal.

use std::fmt;

use serde::{Deserialize, Deserializer};

/// Placeholder delimiter.
pub const DELIM: char = '%';
/// Separator between the placeholder source and its argument.
pub const SEP: char = ':';

const HEADER_SOURCE: &str = "header";

/// A single query template value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    /// Passed through unchanged.
    Literal(String),
    /// Replaced by the named inbound header (lowercased name).
    HeaderRef(String),
}

impl TemplateValue {
    /// Parse a raw configuration string.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        let parts: Vec<&str> = lowered.split(|c| c == DELIM || c == SEP).collect();

        // `split` on single chars yields empty pieces between adjacent
        // delimiters; drop the interior ones so a run counts once.
        let last = parts.len().saturating_sub(1);
        let parts: Vec<&str> = parts
            .iter()
            .enumerate()
            .filter(|(i, p)| *i == 0 || *i == last || !p.is_empty())
            .map(|(_, p)| *p)
            .collect();

        if parts.len() < 3 || !parts[0].is_empty() || !parts[parts.len() - 1].is_empty() {
            return TemplateValue::Literal(raw.to_string());
        }

        let inner = &parts[1..parts.len() - 1];
        match inner {
            [source, name, ..] if *source == HEADER_SOURCE => {
                TemplateValue::HeaderRef((*name).to_string())
            }
            _ => TemplateValue::Literal(raw.to_string()),
        }
    }

    /// Build a header placeholder value.
    pub fn header(name: &str) -> Self {
        TemplateValue::HeaderRef(name.to_lowercase())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        TemplateValue::Literal(value.into())
    }

    /// Returns true for `HeaderRef` values.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, TemplateValue::HeaderRef(_))
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Literal(value) => f.write_str(value),
            TemplateValue::HeaderRef(name) => write!(f, "{DELIM}{HEADER_SOURCE}{SEP}{name}{DELIM}"),
        }
    }
}

impl<'de> Deserialize<'de> for TemplateValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TemplateValue::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_placeholder() {
        assert_eq!(
            TemplateValue::parse("%header:x-region%"),
            TemplateValue::HeaderRef("x-region".into())
        );
        assert_eq!(
            TemplateValue::parse("%HEADER:X-Source%"),
            TemplateValue::HeaderRef("x-source".into())
        );
    }

    #[test]
    fn test_delimiter_runs_count_once() {
        assert_eq!(
            TemplateValue::parse("%%header::x-target-url%%"),
            TemplateValue::HeaderRef("x-target-url".into())
        );
        assert_eq!(
            TemplateValue::parse("%header%x-region%"),
            TemplateValue::HeaderRef("x-region".into())
        );
    }

    #[test]
    fn test_literals() {
        for raw in ["amazon", "a:b", "%header:x-region", "header:x-region%", "", "%header%"] {
            assert_eq!(TemplateValue::parse(raw), TemplateValue::Literal(raw.into()), "{raw}");
        }
    }

    #[test]
    fn test_unknown_source_stays_literal() {
        assert_eq!(
            TemplateValue::parse("%query:q%"),
            TemplateValue::Literal("%query:q%".into())
        );
    }

    #[test]
    fn test_literal_case_is_preserved() {
        assert_eq!(TemplateValue::parse("XxX"), TemplateValue::Literal("XxX".into()));
    }

    #[test]
    fn test_display_round_trips_placeholder() {
        let value = TemplateValue::header("X-Region");
        assert_eq!(value.to_string(), "%header:x-region%");
        assert!(value.is_placeholder());
    }
}
