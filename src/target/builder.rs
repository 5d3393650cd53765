//! Target URL builder.
//!
//! Resolves a campaign descriptor against one inbound request. Each call
//! builds a fresh [`ResolutionContext`] from a copy of the descriptor's
//! template; the descriptor itself is never touched.

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderMap;
use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::campaign::{CampaignDescriptor, CampaignError, QueryTemplate, TemplateValue};
use crate::target::rules::{encode_component, TargetRules};
use crate::target::suffix::{PublicSuffixList, SuffixLookup};

/// Secondary target used for tag and region extraction.
pub const X_TARGET_URL: &str = "x-target-url";
/// Client region code.
pub const X_REGION: &str = "x-region";

/// Failures that abort resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Public suffix region mismatch.")]
    RegionMismatch {
        suffix: String,
        expected: String,
        actual: String,
    },

    #[error("{0} parameter must be provided.")]
    MissingParameter(String),

    #[error(transparent)]
    Campaign(#[from] CampaignError),
}

impl ResolveError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ResolveError::RegionMismatch { .. } => "region_mismatch",
            ResolveError::MissingParameter(_) => "missing_parameter",
            ResolveError::Campaign(_) => "unconfigured",
        }
    }
}

/// A fully resolved target: no placeholders remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    base_url: String,
    query: Vec<(String, String)>,
}

impl ResolvedTarget {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Output query entries in their final order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// `key=value` pairs joined with `&`.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Parse the final URL string.
    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.to_string())
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query_string())?;
        }
        Ok(())
    }
}

/// Per-request working state. Discarded once the target is produced.
struct ResolutionContext<'a> {
    headers: &'a HeaderMap,
    base_url: String,
    params: QueryTemplate,
    tags: Vec<(String, String)>,
}

impl<'a> ResolutionContext<'a> {
    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    }
}

/// Builds target URLs from campaign descriptors.
#[derive(Debug, Clone)]
pub struct TargetBuilder {
    rules: TargetRules,
    suffixes: Arc<dyn SuffixLookup>,
}

impl TargetBuilder {
    /// Create a builder using the embedded public suffix list.
    pub fn new(rules: TargetRules) -> Self {
        Self::with_suffixes(rules, Arc::new(PublicSuffixList))
    }

    pub fn with_suffixes(rules: TargetRules, suffixes: Arc<dyn SuffixLookup>) -> Self {
        Self { rules, suffixes }
    }

    pub fn rules(&self) -> &TargetRules {
        &self.rules
    }

    /// Resolve `descriptor` against the inbound headers and query string.
    pub fn resolve(
        &self,
        descriptor: &CampaignDescriptor,
        headers: &HeaderMap,
        query: Option<&str>,
    ) -> Result<ResolvedTarget, ResolveError> {
        let base_url = descriptor
            .base_url()
            .ok_or_else(|| CampaignError::Unconfigured(descriptor.id().to_string()))?
            .to_string();

        let mut ctx = ResolutionContext {
            headers,
            base_url,
            params: descriptor.query().clone(),
            tags: Vec::new(),
        };

        // Inbound parameters win on collision.
        if let Some(query) = query {
            for (name, value) in form_urlencoded::parse(query.as_bytes()) {
                ctx.params.insert(name.into_owned(), TemplateValue::parse(&value));
            }
        }

        self.apply_secondary_target(&mut ctx)?;
        self.apply_path_embed(&mut ctx)?;

        let mut resolved = std::mem::take(&mut ctx.tags);
        for (name, value) in ctx.params.iter() {
            let value = match value {
                TemplateValue::Literal(literal) => literal.clone(),
                TemplateValue::HeaderRef(header) => self.substitute(&ctx, header),
            };
            resolved.push((name.to_string(), value));
        }

        Ok(ResolvedTarget {
            base_url: ctx.base_url,
            query: resolved,
        })
    }

    /// Region check, partner overrides and tag extraction from `X-Target-URL`.
    fn apply_secondary_target(&self, ctx: &mut ResolutionContext<'_>) -> Result<(), ResolveError> {
        let Some(raw) = ctx.header(X_TARGET_URL).filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        let url = match Url::parse(&raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::info!(error = %e, "Invalid URL passed for X-Target-URL: {}", raw);
                return Ok(());
            }
        };
        let host = url.host_str().unwrap_or_default().to_string();

        if let (Some(suffix), Some(region)) = (
            self.suffixes.suffix(&host),
            ctx.header(X_REGION).filter(|r| !r.is_empty()),
        ) {
            if let Some(expected) = self.rules.region_for(&suffix) {
                let actual = region.to_lowercase();
                if expected != actual {
                    return Err(ResolveError::RegionMismatch {
                        suffix,
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
        }

        for rule in self.rules.overrides_for(&host) {
            ctx.params.insert(rule.param.clone(), TemplateValue::literal(rule.value.clone()));
        }

        if let Some(tag) = self.rules.tag.extract(&url) {
            ctx.tags.push(tag);
        }
        Ok(())
    }

    /// Move a required parameter into the path for configured endpoints.
    fn apply_path_embed(&self, ctx: &mut ResolutionContext<'_>) -> Result<(), ResolveError> {
        let Some(rule) = self.rules.path_embed_for(&ctx.base_url) else {
            return Ok(());
        };

        let value = match ctx.params.remove(&rule.param) {
            Some(TemplateValue::Literal(value)) => value,
            Some(TemplateValue::HeaderRef(header)) => ctx.header(&header).unwrap_or_default(),
            None => String::new(),
        };
        if value.is_empty() {
            return Err(ResolveError::MissingParameter(rule.param.clone()));
        }

        ctx.base_url = format!("{}{}{}", ctx.base_url, value, rule.suffix);
        Ok(())
    }

    fn substitute(&self, ctx: &ResolutionContext<'_>, header: &str) -> String {
        let value = ctx.header(header).unwrap_or_default();
        if self.rules.is_encoded(header) {
            encode_component(&value)
        } else {
            self.rules.remap(value.to_lowercase())
        }
    }
}
