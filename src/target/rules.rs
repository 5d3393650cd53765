//! Business rules consulted by the target builder.
//!
//! Every rule is data: the defaults reproduce the partner behaviour the relay
//! shipped with, and new partners are added in `[rules]` without code changes.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::env::expand_with;

/// Characters left unescaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a query component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Overrides a working parameter when the secondary target's host matches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PartnerOverride {
    /// Hostname prefix, compared case-insensitively.
    pub host_prefix: String,
    pub param: String,
    pub value: String,
}

impl PartnerOverride {
    pub fn matches(&self, host: &str) -> bool {
        host.to_lowercase().starts_with(&self.host_prefix.to_lowercase())
    }
}

/// Campaign tag extraction from the secondary target's query string.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TagRule {
    /// Output parameter name.
    pub name: String,
    /// Source parameters in preference order.
    pub params: Vec<String>,
    /// Literal removed (first occurrence) from the extracted value.
    pub strip: String,
}

impl Default for TagRule {
    fn default() -> Self {
        Self {
            name: "ctag".to_string(),
            params: vec!["ref".to_string(), "crlp".to_string()],
            strip: "pd_sl_a".to_string(),
        }
    }
}

impl TagRule {
    /// Extract the encoded tag as a `(name, value)` query entry.
    pub fn extract(&self, url: &Url) -> Option<(String, String)> {
        let tag = self.params.iter().find_map(|param| {
            url.query_pairs()
                .find(|(key, _)| key == param.as_str())
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
        })?;

        let tag = if self.strip.is_empty() {
            tag
        } else {
            tag.replacen(&self.strip, "", 1)
        };
        Some((self.name.clone(), encode_component(&tag)))
    }
}

/// Moves a required parameter into the URL path for one endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PathEmbed {
    /// Base URL this rule applies to (exact match).
    pub base_url: String,
    /// Parameter whose value is appended to the path.
    pub param: String,
    /// Appended after the value.
    #[serde(default = "default_path_suffix")]
    pub suffix: String,
}

fn default_path_suffix() -> String {
    ".json".to_string()
}

/// Rule tables for target URL construction.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetRules {
    /// Public suffix → expected lowercase region code.
    pub suffix_regions: HashMap<String, String>,

    /// Parameter overrides keyed by secondary target host.
    pub partner_overrides: Vec<PartnerOverride>,

    /// Campaign tag extraction.
    pub tag: TagRule,

    /// Endpoints that take a parameter in the path.
    pub path_embeds: Vec<PathEmbed>,

    /// Remaps applied to lowercased header substitutions.
    pub value_remaps: HashMap<String, String>,

    /// Headers whose substitutions are percent-encoded verbatim.
    pub encoded_headers: Vec<String>,
}

impl Default for TargetRules {
    fn default() -> Self {
        let suffix_regions = [
            ("ca", "ca"),
            ("co.uk", "gb"),
            ("com.au", "au"),
            ("com", "us"),
            ("de", "de"),
            ("fr", "fr"),
        ]
        .into_iter()
        .map(|(s, r)| (s.to_string(), r.to_string()))
        .collect();

        Self {
            suffix_regions,
            partner_overrides: vec![PartnerOverride {
                host_prefix: "www.ebay.".to_string(),
                param: "sub1".to_string(),
                value: "ebay".to_string(),
            }],
            tag: TagRule::default(),
            path_embeds: Vec::new(),
            value_remaps: [("gb".to_string(), "uk".to_string())].into_iter().collect(),
            encoded_headers: vec!["x-target-url".to_string()],
        }
    }
}

impl TargetRules {
    /// Expected region for a public suffix, if the suffix is known.
    pub fn region_for(&self, suffix: &str) -> Option<&str> {
        self.suffix_regions.get(&suffix.to_lowercase()).map(String::as_str)
    }

    pub fn overrides_for<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a PartnerOverride> + 'a {
        self.partner_overrides.iter().filter(move |rule| rule.matches(host))
    }

    pub fn path_embed_for(&self, base_url: &str) -> Option<&PathEmbed> {
        self.path_embeds.iter().find(|rule| rule.base_url == base_url)
    }

    /// Apply the value remap table to an already-lowercased value.
    pub fn remap(&self, value: String) -> String {
        match self.value_remaps.get(&value) {
            Some(mapped) => mapped.clone(),
            None => value,
        }
    }

    pub fn is_encoded(&self, header: &str) -> bool {
        self.encoded_headers.iter().any(|h| h.eq_ignore_ascii_case(header))
    }

    /// Expand `${VAR}` in path embed base URLs. A rule whose base URL names an
    /// unset variable can never match and is dropped.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.path_embeds.retain_mut(|rule| match expand_with(&rule.base_url, &lookup) {
            Ok(expanded) if !expanded.is_empty() => {
                rule.base_url = expanded;
                true
            }
            Ok(_) | Err(_) => {
                tracing::debug!(param = %rule.param, "Dropping path embed rule without base URL");
                false
            }
        });
        self
    }
}
