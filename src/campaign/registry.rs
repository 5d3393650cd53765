//! Campaign registry.
//!
//! Built once at startup, read-only afterwards. Lookups trim and lowercase
//! the requested identifier.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::campaign::descriptor::{CampaignDescriptor, QueryTemplate};
use crate::campaign::template::TemplateValue;
use crate::config::env::{expand_or_empty, expand_with};
use crate::config::schema::CampaignConfig;

/// Reasons a request cannot be dispatched to a campaign.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CampaignError {
    #[error("no campaign identifier found")]
    MissingId,

    #[error("invalid campaign identifier: {0}")]
    Unknown(String),

    #[error("invalid campaign, please check environment variables.")]
    Unconfigured(String),

    #[error("invalid request method: {0}")]
    MethodNotAllowed(Method),
}

/// Immutable mapping from campaign id to descriptor.
#[derive(Debug, Clone, Default)]
pub struct CampaignRegistry {
    campaigns: HashMap<String, Arc<CampaignDescriptor>>,
}

impl CampaignRegistry {
    pub fn new(descriptors: impl IntoIterator<Item = CampaignDescriptor>) -> Self {
        let campaigns = descriptors
            .into_iter()
            .map(|d| (d.id().to_string(), Arc::new(d)))
            .collect();
        Self { campaigns }
    }

    /// Build from configuration, expanding `${VAR}` references through the
    /// process environment.
    pub fn from_config(campaigns: &HashMap<String, CampaignConfig>) -> Self {
        Self::from_config_with_env(campaigns, |name| std::env::var(name).ok())
    }

    /// Build from configuration with an explicit variable lookup.
    pub fn from_config_with_env<F>(campaigns: &HashMap<String, CampaignConfig>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let descriptors = campaigns.iter().map(|(id, campaign)| {
            let base_url = campaign.base_url.as_deref().and_then(|raw| match expand_with(raw, &lookup) {
                Ok(url) if !url.is_empty() => Some(url),
                Ok(_) => None,
                Err(missing) => {
                    tracing::warn!(campaign = %id, variable = %missing.0, "Campaign base URL is unconfigured");
                    None
                }
            });

            let query: QueryTemplate = campaign
                .query
                .iter()
                .map(|(name, raw)| {
                    let value = match TemplateValue::parse(raw) {
                        TemplateValue::Literal(literal) => {
                            TemplateValue::Literal(expand_or_empty(&literal, &lookup))
                        }
                        placeholder => placeholder,
                    };
                    (name.clone(), value)
                })
                .collect();

            let method = campaign
                .method
                .as_deref()
                .and_then(|m| m.trim().to_uppercase().parse::<Method>().ok())
                .unwrap_or(Method::GET);

            CampaignDescriptor::new(id.clone(), base_url, query).with_method(method)
        });

        let registry = Self::new(descriptors);
        tracing::debug!(campaigns = registry.len(), "Campaign registry built");
        registry
    }

    /// Look up a campaign by raw identifier (trimmed, case-insensitive).
    pub fn get(&self, raw_id: &str) -> Option<&Arc<CampaignDescriptor>> {
        self.campaigns.get(&raw_id.trim().to_lowercase())
    }

    /// Select the campaign a request should be dispatched to.
    pub fn select(&self, raw_id: &str, method: &Method) -> Result<Arc<CampaignDescriptor>, CampaignError> {
        let id = raw_id.trim();
        if id.is_empty() {
            return Err(CampaignError::MissingId);
        }
        let id = id.to_lowercase();

        let campaign = self
            .campaigns
            .get(&id)
            .ok_or_else(|| CampaignError::Unknown(id.clone()))?;

        if campaign.base_url().is_none() {
            return Err(CampaignError::Unconfigured(id));
        }
        if campaign.method() != method {
            return Err(CampaignError::MethodNotAllowed(method.clone()));
        }
        Ok(Arc::clone(campaign))
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.campaigns.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::OrderedParams;

    fn campaign(base_url: Option<&str>, query: &[(&str, &str)]) -> CampaignConfig {
        CampaignConfig {
            base_url: base_url.map(str::to_string),
            method: None,
            query: OrderedParams::from_pairs(query.iter().map(|(k, v)| (k.to_string(), v.to_string()))),
        }
    }

    fn registry() -> CampaignRegistry {
        let mut campaigns = HashMap::new();
        campaigns.insert(
            "amzn_2020_1".to_string(),
            campaign(
                Some("http://localhost:${PORT}/test"),
                &[("sub1", "amazon"), ("key", "${AMZN_KEY:-test}"), ("h1", "%header:x-region%")],
            ),
        );
        campaigns.insert("weather".to_string(), campaign(Some("${WEATHER_URL}"), &[]));
        CampaignRegistry::from_config_with_env(&campaigns, |name| match name {
            "PORT" => Some("8080".to_string()),
            _ => None,
        })
    }

    #[test]
    fn test_expands_environment() {
        let registry = registry();
        let campaign = registry.get("amzn_2020_1").unwrap();
        assert_eq!(campaign.base_url(), Some("http://localhost:8080/test"));
        assert_eq!(campaign.query().get("key"), Some(&TemplateValue::literal("test")));
        assert_eq!(campaign.query().get("h1"), Some(&TemplateValue::header("x-region")));
    }

    #[test]
    fn test_select_is_case_insensitive_and_trimmed() {
        let registry = registry();
        let campaign = registry.select("  AMZN_2020_1 ", &Method::GET).unwrap();
        assert_eq!(campaign.id(), "amzn_2020_1");
    }

    #[test]
    fn test_select_errors() {
        let registry = registry();
        assert_eq!(registry.select("  ", &Method::GET).unwrap_err(), CampaignError::MissingId);
        assert_eq!(
            registry.select("not_found", &Method::GET).unwrap_err(),
            CampaignError::Unknown("not_found".into())
        );
        assert_eq!(
            registry.select("weather", &Method::GET).unwrap_err(),
            CampaignError::Unconfigured("weather".into())
        );
        let err = registry.select("amzn_2020_1", &Method::POST).unwrap_err();
        assert_eq!(err.to_string(), "invalid request method: POST");
    }
}
