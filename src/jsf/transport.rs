//! One AJAX request/response exchange against the faces endpoint.

use std::sync::Arc;

use tracing::debug;
use url::form_urlencoded;

use super::response::{classify, Classified};
use crate::config::TargetConfig;
use crate::error::{ProtocolError, ScrapeError};
use crate::models::{FacesPrefix, UpdateSet, ViewState};
use crate::scrapers::HttpTransport;
use crate::utils::truncate_chars;

const FULL_PAGE_SNIPPET_CHARS: usize = 500;
const VIEW_EXPIRED: &str = "ViewExpired";

/// Description of a single AJAX exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub prefix: FacesPrefix,
    pub form_id: String,
    pub source_id: String,
    /// Defaults to `source_id`.
    pub execute: Option<String>,
    pub render: Option<String>,
    pub behavior_event: Option<String>,
    /// Submitted after the protocol fields; may override them.
    pub extra: Vec<(String, String)>,
}

impl Exchange {
    pub fn new(prefix: FacesPrefix, form_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            prefix,
            form_id: form_id.into(),
            source_id: source_id.into(),
            execute: None,
            render: None,
            behavior_event: None,
            extra: Vec::new(),
        }
    }

    pub fn execute(mut self, execute: impl Into<String>) -> Self {
        self.execute = Some(execute.into());
        self
    }

    pub fn render(mut self, render: impl Into<String>) -> Self {
        self.render = Some(render.into());
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.behavior_event = Some(event.into());
        self
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub fn extras<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.extra
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Update target this exchange expects back, for error messages.
    fn expected_target(&self) -> &str {
        self.render.as_deref().unwrap_or(&self.form_id)
    }
}

/// Ordered form fields. Setting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(field) => field.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

/// Request fields of an exchange, in submission order.
pub fn build_form(exchange: &Exchange, view_state: &ViewState) -> FormFields {
    let p = exchange.prefix;
    let source = exchange.source_id.as_str();
    let mut form = FormFields::default();

    form.set(&exchange.form_id, &exchange.form_id);
    form.set(p.field("partial.ajax"), "true");
    form.set(p.field("source"), source);
    form.set(
        p.field("partial.execute"),
        exchange.execute.as_deref().unwrap_or(source),
    );
    if let Some(render) = &exchange.render {
        form.set(p.field("partial.render"), render);
    }
    if let Some(event) = &exchange.behavior_event {
        form.set(p.field("behavior.event"), event);
        form.set(p.field("partial.event"), event);
    }
    form.set(source, source);
    form.set(p.field("ViewState"), view_state.as_str());

    for (name, value) in &exchange.extra {
        form.set(name, value);
    }
    form
}

/// Updates and the view state to use for the next exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub updates: UpdateSet,
    pub view_state: ViewState,
}

/// Posts exchanges to the AJAX endpoint and validates the envelopes.
pub struct AjaxTransport<T: HttpTransport + ?Sized> {
    http: Arc<T>,
    endpoint: String,
    origin: String,
}

impl<T: HttpTransport + ?Sized> AjaxTransport<T> {
    pub fn new(http: Arc<T>, target: &TargetConfig) -> Self {
        Self {
            http,
            endpoint: target.ajax_url(),
            origin: target.origin().to_string(),
        }
    }

    pub fn http(&self) -> &Arc<T> {
        &self.http
    }

    pub async fn exchange(
        &self,
        exchange: &Exchange,
        view_state: &ViewState,
    ) -> Result<ExchangeOutcome, ScrapeError> {
        let form = build_form(exchange, view_state);
        debug!(
            "AJAX source={} render={:?} view_state={}",
            exchange.source_id, exchange.render, view_state
        );

        let headers = [
            ("Faces-Request", "partial/ajax".to_string()),
            ("X-Requested-With", "XMLHttpRequest".to_string()),
            ("Accept", "application/xml, text/xml, */*; q=0.01".to_string()),
            (
                "Content-Type",
                "application/x-www-form-urlencoded; charset=UTF-8".to_string(),
            ),
            ("Origin", self.origin.clone()),
            ("Referer", self.endpoint.clone()),
        ];
        let body = self
            .http
            .post_form(&self.endpoint, &headers, form.encode())
            .await?;

        Ok(validate(exchange, view_state, &body)?)
    }
}

/// Check an exchange response and pick the view state to continue with.
pub fn validate(
    exchange: &Exchange,
    submitted: &ViewState,
    body: &str,
) -> Result<ExchangeOutcome, ProtocolError> {
    if body.trim().is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }

    let partial = match classify(body)? {
        Classified::Partial(partial) => partial,
        Classified::Full(html) => {
            return Err(ProtocolError::UnexpectedFullPage {
                snippet: truncate_chars(&html, FULL_PAGE_SNIPPET_CHARS).to_string(),
            })
        }
    };

    if let Some(error) = &partial.error {
        if error.name.contains(VIEW_EXPIRED) {
            return Err(ProtocolError::SessionExpired {
                expected: exchange.expected_target().to_string(),
                returned: error.name.clone(),
            });
        }
        return Err(ProtocolError::ServerError {
            name: error.name.clone(),
            message: error.message.clone(),
        });
    }

    if let Some(url) = &partial.redirect {
        return Err(ProtocolError::SessionExpired {
            expected: exchange.expected_target().to_string(),
            returned: format!("redirect to {}", url),
        });
    }

    Ok(ExchangeOutcome {
        view_state: partial.view_state.unwrap_or_else(|| submitted.clone()),
        updates: partial.updates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(form: &FormFields) -> Vec<&str> {
        form.names().collect()
    }

    #[test]
    fn test_search_form_fields() {
        let exchange = Exchange::new(FacesPrefix::Jakarta, "searchForm", "searchForm:btn")
            .execute("searchForm")
            .render("mainPageContent")
            .event("click")
            .extra("searchForm:ddRAKammer_input", "11")
            .extra("searchForm:ddLanguage_input", "en");
        let form = build_form(&exchange, &ViewState::new("vs1"));

        assert_eq!(
            names(&form),
            vec![
                "searchForm",
                "jakarta.faces.partial.ajax",
                "jakarta.faces.source",
                "jakarta.faces.partial.execute",
                "jakarta.faces.partial.render",
                "jakarta.faces.behavior.event",
                "jakarta.faces.partial.event",
                "searchForm:btn",
                "jakarta.faces.ViewState",
                "searchForm:ddRAKammer_input",
                "searchForm:ddLanguage_input",
            ]
        );
        assert_eq!(form.get("jakarta.faces.ViewState"), Some("vs1"));
        assert_eq!(form.get("jakarta.faces.partial.execute"), Some("searchForm"));
    }

    #[test]
    fn test_execute_defaults_to_source_and_no_event_fields() {
        let exchange = Exchange::new(FacesPrefix::Javax, "resultForm", "resultForm:0:link")
            .render("resultDetailForm");
        let form = build_form(&exchange, &ViewState::new("vs"));

        assert_eq!(form.get("javax.faces.partial.execute"), Some("resultForm:0:link"));
        assert_eq!(form.get("javax.faces.behavior.event"), None);
        assert_eq!(form.get("javax.faces.partial.event"), None);
        assert_eq!(form.get("resultForm:0:link"), Some("resultForm:0:link"));
    }

    #[test]
    fn test_extras_override_in_place() {
        let exchange = Exchange::new(FacesPrefix::Jakarta, "resultForm", "resultForm:grid")
            .extra("jakarta.faces.partial.ajax", "false")
            .extra("resultForm:grid_first", "800");
        let form = build_form(&exchange, &ViewState::new("vs"));

        assert_eq!(form.names().nth(1), Some("jakarta.faces.partial.ajax"));
        assert_eq!(form.get("jakarta.faces.partial.ajax"), Some("false"));
        assert_eq!(form.names().last(), Some("resultForm:grid_first"));
    }

    #[test]
    fn test_source_equal_to_form_is_not_duplicated() {
        let exchange = Exchange::new(FacesPrefix::Jakarta, "resultForm", "resultForm");
        let form = build_form(&exchange, &ViewState::new("vs"));
        assert_eq!(form.names().filter(|n| *n == "resultForm").count(), 1);
    }

    #[test]
    fn test_encode() {
        let mut form = FormFields::default();
        form.set("a:b", "x y");
        form.set("c", "1&2");
        assert_eq!(form.encode(), "a%3Ab=x+y&c=1%262");
    }

    fn exchange() -> Exchange {
        Exchange::new(FacesPrefix::Jakarta, "resultForm", "resultForm:refresh").render("resultForm")
    }

    #[test]
    fn test_validate_keeps_submitted_view_state_when_none_returned() {
        let body = r#"<partial-response><changes><update id="resultForm"><![CDATA[<div/>]]></update></changes></partial-response>"#;
        let outcome = validate(&exchange(), &ViewState::new("old"), body).unwrap();
        assert_eq!(outcome.view_state.as_str(), "old");
        assert!(outcome.updates.get("resultForm").is_some());
    }

    #[test]
    fn test_validate_replaces_view_state() {
        let body = r#"<partial-response><changes><update id="j_id1:jakarta.faces.ViewState:0"><![CDATA[new]]></update></changes></partial-response>"#;
        let outcome = validate(&exchange(), &ViewState::new("old"), body).unwrap();
        assert_eq!(outcome.view_state.as_str(), "new");
    }

    #[test]
    fn test_validate_rejects_empty_and_full_pages() {
        let vs = ViewState::new("v");
        assert!(matches!(
            validate(&exchange(), &vs, "  \n"),
            Err(ProtocolError::EmptyResponse)
        ));
        assert!(matches!(
            validate(&exchange(), &vs, "<html><body>Login</body></html>"),
            Err(ProtocolError::UnexpectedFullPage { .. })
        ));
    }

    #[test]
    fn test_validate_maps_envelope_errors() {
        let vs = ViewState::new("v");
        let expired = r#"<partial-response><error><error-name>jakarta.faces.application.ViewExpiredException</error-name><error-message><![CDATA[View could not be restored]]></error-message></error></partial-response>"#;
        let err = validate(&exchange(), &vs, expired).unwrap_err();
        assert!(err.is_session_expired());

        let redirect = r#"<partial-response><redirect url="/bravsearch/index.xhtml"/></partial-response>"#;
        assert!(validate(&exchange(), &vs, redirect).unwrap_err().is_session_expired());

        let other = r#"<partial-response><error><error-name>java.lang.NullPointerException</error-name><error-message>boom</error-message></error></partial-response>"#;
        assert!(matches!(
            validate(&exchange(), &vs, other),
            Err(ProtocolError::ServerError { ref message, .. }) if message == "boom"
        ));
    }
}
