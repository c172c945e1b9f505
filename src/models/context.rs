//! Protocol state threaded through a crawl.

use std::collections::BTreeMap;
use std::fmt;

use crate::utils::truncate_chars;

/// Opaque server-side UI state token.
///
/// Every AJAX exchange must submit the most recent one; a replacement returned
/// by the server fully supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState(String);

impl ViewState {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines; the full token can be several kilobytes.
    pub fn prefix(&self) -> &str {
        truncate_chars(&self.0, 16)
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.prefix())
    }
}

/// Namespace of the protocol's request parameters.
///
/// Older servers use `javax.faces.*`, newer ones `jakarta.faces.*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacesPrefix {
    #[default]
    Jakarta,
    Javax,
}

impl FacesPrefix {
    /// Pick the namespace a full page uses. Defaults to jakarta.
    pub fn detect(html: &str) -> Self {
        if !html.contains("jakarta.faces.") && html.contains("javax.faces.") {
            FacesPrefix::Javax
        } else {
            FacesPrefix::Jakarta
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacesPrefix::Jakarta => "jakarta",
            FacesPrefix::Javax => "javax",
        }
    }

    /// Full parameter name, e.g. `field("ViewState")` -> `jakarta.faces.ViewState`.
    pub fn field(&self, name: &str) -> String {
        format!("{}.faces.{}", self.as_str(), name)
    }
}

impl fmt::Display for FacesPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the jurisdiction selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jurisdiction {
    pub label: String,
    pub value: String,
}

/// Identifiers needed to submit a search, extracted from one full page load.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub form_id: String,
    pub jurisdiction_field: String,
    pub language_field: Option<String>,
    pub submit_id: String,
    /// Options in document order, labels unique.
    pub jurisdictions: Vec<Jurisdiction>,
    pub view_state: ViewState,
    pub prefix: FacesPrefix,
}

impl SearchContext {
    pub fn jurisdiction(&self, label: &str) -> Option<&Jurisdiction> {
        self.jurisdictions.iter().find(|j| j.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.jurisdictions.iter().map(|j| j.label.as_str())
    }
}

/// Identifiers needed to page through one result set.
#[derive(Debug, Clone)]
pub struct ResultContext {
    pub form_id: String,
    pub grid_id: String,
    pub refresh_id: String,
    pub view_state: ViewState,
    pub prefix: FacesPrefix,
}

/// Update targets decoded from one partial-response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSet {
    updates: BTreeMap<String, String>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, payload: impl Into<String>) {
        self.updates.insert(id.into(), payload.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.updates.get(id).map(|s| s.as_str())
    }

    /// Payload of `id`, treating an empty payload as absent.
    pub fn non_empty(&self, id: &str) -> Option<&str> {
        self.get(id).filter(|s| !s.trim().is_empty())
    }

    /// True if any update targets `id` or a component nested inside it.
    pub fn targets(&self, id: &str) -> bool {
        self.updates
            .keys()
            .any(|k| k == id || k.strip_prefix(id).is_some_and(|rest| rest.starts_with(':')))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.updates.keys().map(|s| s.as_str())
    }

    /// Sorted update ids, comma separated, for error messages.
    pub fn keys_joined(&self) -> String {
        self.ids().collect::<Vec<_>>().join(", ")
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}
