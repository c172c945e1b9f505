//! Search page structure: form fields, jurisdiction options, submit control.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::response::extract_view_state;
use crate::config::TargetConfig;
use crate::error::ProtocolError;
use crate::models::{FacesPrefix, Jurisdiction, SearchContext};
use crate::utils::clean_text;

static NAMED: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[name]").unwrap());
static OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());
static ONCLICK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[id][onclick]").unwrap());

/// Update list of a `PrimeFaces.ab({...})` behaviour descriptor.
static UPDATE_TARGETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bu:\s*["']([^"']*)["']"#).unwrap());

const AJAX_DISPATCH: &str = "PrimeFaces.ab";

/// Build a [`SearchContext`] from a full search page.
pub fn extract_search_context(
    html: &str,
    target: &TargetConfig,
) -> Result<SearchContext, ProtocolError> {
    let view_state = extract_view_state(html)?;
    let document = Html::parse_document(html);

    let jurisdiction_select = find_named(&document, &target.jurisdiction_field_suffix)
        .ok_or(ProtocolError::MissingField("jurisdiction field"))?;
    let jurisdiction_field = jurisdiction_select
        .value()
        .attr("name")
        .unwrap_or_default()
        .to_string();

    let jurisdictions = select_options(jurisdiction_select);
    if jurisdictions.is_empty() {
        return Err(ProtocolError::MissingField("jurisdiction options"));
    }

    let language_field = find_named(&document, &target.language_field_suffix)
        .and_then(|el| el.value().attr("name"))
        .map(|s| s.to_string());

    let submit_id = find_submit_control(&document, &target.result_region)
        .ok_or(ProtocolError::MissingField("search submit control"))?;

    Ok(SearchContext {
        form_id: target.search_form_id.clone(),
        jurisdiction_field,
        language_field,
        submit_id,
        jurisdictions,
        view_state,
        prefix: FacesPrefix::detect(html),
    })
}

/// First element in document order whose `name` ends with `suffix`.
fn find_named<'a>(document: &'a Html, suffix: &str) -> Option<ElementRef<'a>> {
    document
        .select(&NAMED)
        .find(|el| el.value().attr("name").is_some_and(|n| n.ends_with(suffix)))
}

/// Options of a select control in document order. Duplicate labels keep the
/// first occurrence; options without label or value are skipped.
fn select_options(select: ElementRef<'_>) -> Vec<Jurisdiction> {
    let mut seen = HashSet::new();
    select
        .select(&OPTION)
        .filter_map(|option| {
            let value = option.value().attr("value").unwrap_or_default().trim();
            let label = clean_text(&option.text().collect::<String>());
            if label.is_empty() || value.is_empty() || !seen.insert(label.clone()) {
                return None;
            }
            Some(Jurisdiction {
                label,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Id of the first control whose AJAX behaviour re-renders `region`.
fn find_submit_control(document: &Html, region: &str) -> Option<String> {
    document.select(&ONCLICK).find_map(|el| {
        let onclick = el.value().attr("onclick")?;
        if !onclick.contains(AJAX_DISPATCH) {
            return None;
        }
        let renders_region = UPDATE_TARGETS
            .captures_iter(onclick)
            .any(|c| c[1].split_whitespace().any(|t| t == region));
        renders_region.then(|| el.value().attr("id").unwrap_or_default().to_string())
    })
}
