//! Campaign descriptors.

use axum::http::Method;

use crate::campaign::template::TemplateValue;

/// Ordered query template. Declaration order is the output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplate {
    entries: Vec<(String, TemplateValue)>,
}

impl QueryTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, replacing the value in place if the name exists.
    pub fn insert(&mut self, name: impl Into<String>, value: TemplateValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<TemplateValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TemplateValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, TemplateValue)> for QueryTemplate {
    fn from_iter<I: IntoIterator<Item = (N, TemplateValue)>>(iter: I) -> Self {
        let mut template = QueryTemplate::new();
        for (name, value) in iter {
            template.insert(name, value);
        }
        template
    }
}

/// A named advertising destination.
///
/// Immutable once built; the registry hands out shared references and the
/// target builder copies what it needs into its own resolution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignDescriptor {
    id: String,
    base_url: Option<String>,
    query: QueryTemplate,
    method: Method,
}

impl CampaignDescriptor {
    /// Create a descriptor accepting `GET`.
    pub fn new(id: impl Into<String>, base_url: Option<String>, query: QueryTemplate) -> Self {
        Self {
            id: id.into().trim().to_lowercase(),
            base_url,
            query,
            method: Method::GET,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Normalized (trimmed, lowercased) identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute base URL, absent when its configuration did not resolve.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn query(&self) -> &QueryTemplate {
        &self.query
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}
