//! Detail fragment parsing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::models::detail_column;
use crate::utils::clean_text;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.cssRow").unwrap());
static LABEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("label").unwrap());
static VALUE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[class*="cssColResultDetailText"]"#).unwrap()
});

/// Placeholder the server renders for empty fields.
const NO_INFORMATION: &str = "No Information";

/// Extract detail fields keyed by output column.
///
/// Each `div.cssRow` contributes one label/value pair. Rows without a label or
/// value, and placeholder values, are skipped. The first row for a label wins.
pub fn extract_details(fragment: &str) -> BTreeMap<String, String> {
    let document = Html::parse_fragment(fragment);
    let mut details = BTreeMap::new();

    for row in document.select(&ROW) {
        let Some(label) = row.select(&LABEL).next().map(text_of) else {
            continue;
        };
        let label = label.trim_end_matches(':').trim();
        if label.is_empty() {
            continue;
        }

        let Some(value) = row.select(&VALUE).next().map(text_of) else {
            continue;
        };
        if value.is_empty() || value == NO_INFORMATION {
            continue;
        }

        details.entry(detail_column(label)).or_insert(value);
    }

    details
}

/// Text nodes joined by single spaces, so `<br>`-separated lines stay apart.
fn text_of(element: ElementRef<'_>) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    clean_text(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"
<div id="resultDetailForm:panel">
  <div class="cssRow">
    <div class="cssColResultDetailLabel"><label>Form of address:</label></div>
    <div class="cssColResultDetailText">Herr</div>
  </div>
  <div class="cssRow">
    <div class="cssColResultDetailLabel"><label>Law office:</label></div>
    <div class="cssColResultDetailTextGroup"><span>Kanzlei Muster</span><br/><span>Partnerschaft mbB</span></div>
  </div>
  <div class="cssRow">
    <div class="cssColResultDetailLabel"><label>E-Mail:</label></div>
    <div class="cssColResultDetailText"><a href="mailto:max@example.org">max@example.org</a></div>
  </div>
  <div class="cssRow">
    <div class="cssColResultDetailLabel"><label>Telefax:</label></div>
    <div class="cssColResultDetailText">No Information</div>
  </div>
  <div class="cssRow">
    <div class="cssColResultDetailLabel"><label>E-Mail:</label></div>
    <div class="cssColResultDetailText">second@example.org</div>
  </div>
  <div class="cssRow">
    <div class="cssColResultDetailLabel"><label>beA SAFE-ID:</label></div>
    <div class="cssColResultDetailText">DE.BRAK.1234</div>
  </div>
  <div class="cssRow"><div class="cssColResultDetailText">orphan value</div></div>
</div>"#;

    #[test]
    fn test_extract_details() {
        let details = extract_details(DETAIL);
        assert_eq!(details.get("form_of_address").map(String::as_str), Some("Herr"));
        assert_eq!(
            details.get("detail_office").map(String::as_str),
            Some("Kanzlei Muster Partnerschaft mbB")
        );
        assert_eq!(details.get("bea_safe_id").map(String::as_str), Some("DE.BRAK.1234"));
    }

    #[test]
    fn test_first_label_wins() {
        let details = extract_details(DETAIL);
        assert_eq!(details.get("email").map(String::as_str), Some("max@example.org"));
    }

    #[test]
    fn test_placeholder_and_unlabelled_rows_are_dropped() {
        let details = extract_details(DETAIL);
        assert!(!details.contains_key("telefax"));
        assert_eq!(details.len(), 4);
    }
}
