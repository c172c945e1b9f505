//! Result fragment structure: paging identifiers, total count, result cards.
//!
//! The data-grid id and the refresh control id are only emitted inside inline
//! widget scripts, so they are matched against the raw fragment text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::TargetConfig;
use crate::error::ProtocolError;
use crate::models::{FacesPrefix, ResultContext, ResultRecord, ViewState};
use crate::utils::{clean_text, strip_tags};

static DATAGRID_INIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"PrimeFaces\.cw\(\s*"DataGrid"\s*,\s*"[^"]+"\s*,\s*\{\s*id\s*:\s*"([^"]+)""#).unwrap()
});
static REFRESH_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"updateDataResult\s*=\s*function\(\)\s*\{\s*return\s+PrimeFaces\.ab\(\{\s*s\s*:\s*"([^"]+)""#)
        .unwrap()
});

/// Localized "result count" phrasings, tried in order.
static TOTAL_COUNT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Number of result entries:\s*([0-9][0-9.,]*)",
        r"Anzahl der Treffer:\s*([0-9][0-9.,]*)",
        r"Entries\s+\d+\s*-\s*\d+\s+of\s+([0-9][0-9.,]*)",
        r"Einträge\s+\d+\s*-\s*\d+\s+von\s+([0-9][0-9.,]*)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static ZIP_CITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{5})\s+(.+)$").unwrap());

static CARD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.resultCard").unwrap());
static CARD_HEADER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.resultCardHeader, span.resultCardHeader").unwrap()
});
static CARD_LINE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static DETAIL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.resultCardDetailLink").unwrap());

/// Separator between the lines of a multi-line office name.
const OFFICE_SEPARATOR: &str = " | ";

/// Build a [`ResultContext`] from the fragment a search rendered.
pub fn extract_result_context(
    fragment: &str,
    view_state: ViewState,
    prefix: FacesPrefix,
    target: &TargetConfig,
) -> Result<ResultContext, ProtocolError> {
    let grid_id = DATAGRID_INIT
        .captures(fragment)
        .map(|c| c[1].to_string())
        .ok_or(ProtocolError::MissingField("data grid id"))?;
    let refresh_id = REFRESH_SOURCE
        .captures(fragment)
        .map(|c| c[1].to_string())
        .ok_or(ProtocolError::MissingField("page refresh control"))?;

    Ok(ResultContext {
        form_id: target.result_form_id.clone(),
        grid_id,
        refresh_id,
        view_state,
        prefix,
    })
}

/// Total number of results announced by a fragment.
/// Grouping separators (`.` and `,`) are ignored.
pub fn extract_total_count(fragment: &str) -> Result<u64, ProtocolError> {
    let text = strip_tags(fragment);
    TOTAL_COUNT
        .iter()
        .find_map(|re| re.captures(&text))
        .and_then(|c| c[1].replace(['.', ','], "").parse().ok())
        .ok_or(ProtocolError::CountNotFound)
}

/// Parse every result card of a page fragment.
pub fn extract_records(fragment: &str, jurisdiction: &str) -> Vec<ResultRecord> {
    let document = Html::parse_fragment(fragment);
    document
        .select(&CARD)
        .map(|card| parse_card(card, jurisdiction))
        .collect()
}

fn parse_card(card: ElementRef<'_>, jurisdiction: &str) -> ResultRecord {
    let name = card
        .select(&CARD_HEADER)
        .next()
        .map(|h| clean_text(&h.text().collect::<String>()))
        .unwrap_or_default();

    let lines: Vec<String> = card
        .select(&CARD_LINE)
        .map(|li| clean_text(&li.text().collect::<String>()))
        .filter(|line| !line.is_empty())
        .collect();

    let detail_link_id = card
        .select(&DETAIL_LINK)
        .next()
        .and_then(|a| a.value().attr("id"))
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string());

    let mut record = ResultRecord {
        jurisdiction: jurisdiction.to_string(),
        name,
        detail_link_id,
        ..Default::default()
    };
    apply_card_lines(&mut record, &lines);
    record
}

/// Positional field split of a card's detail lines.
///
/// Line 0 is the professional title. A trailing `NNNNN City` line becomes zip
/// and city. One remaining line is the street; with more, the last is the
/// street and the others form the office name.
fn apply_card_lines(record: &mut ResultRecord, lines: &[String]) {
    let Some((title, mut rest)) = lines.split_first() else {
        return;
    };
    record.professional_title = title.clone();

    if let Some((last, init)) = rest.split_last() {
        if let Some(caps) = ZIP_CITY.captures(last) {
            record.zip = caps[1].to_string();
            record.city = caps[2].trim().to_string();
            record.zip_city_raw = last.clone();
            rest = init;
        }
    }

    match rest {
        [] => {}
        [street] => record.street = street.clone(),
        [office @ .., street] => {
            record.street = street.clone();
            record.office = office.join(OFFICE_SEPARATOR).trim().to_string();
        }
    }
}
