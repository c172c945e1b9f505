//! Response classification: full HTML documents vs. partial-response envelopes.
//!
//! A partial-response looks like
//!
//! ```xml
//! <partial-response id="j_id1"><changes>
//!   <update id="mainPageContent"><![CDATA[<div>...</div>]]></update>
//!   <update id="j_id1:jakarta.faces.ViewState:0"><![CDATA[-123:456]]></update>
//! </changes></partial-response>
//! ```
//!
//! Decoding is scanner-based rather than a full XML parse. Update payloads are
//! HTML and only ever appear inside CDATA sections or as escaped text.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ProtocolError;
use crate::models::{UpdateSet, ViewState};
use crate::utils::{clean_text, xml_unescape};

const PARTIAL_MARKER: &[u8] = b"<partial-response";
/// Only this many leading bytes are inspected for the envelope marker.
const MARKER_SCAN_BYTES: usize = 4000;
/// Update ids containing this carry the session token.
const VIEW_STATE_MARKER: &str = "ViewState";

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";
const UPDATE_CLOSE: &str = "</update>";

static UPDATE_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<update\b[^>]*?\bid=(?:"([^"]*)"|'([^']*)')[^>]*?(/?)>"#).unwrap()
});
static REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<redirect\b[^>]*?\burl=(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static ERROR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<error-name>(.*?)</error-name>").unwrap());
static ERROR_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<error-message>(.*?)</error-message>").unwrap());

/// Hidden-field patterns for the ViewState of a full page, tried in order.
static HIDDEN_VIEW_STATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)name="jakarta\.faces\.ViewState"\s+value="([^"]+)""#,
        r#"(?i)name="javax\.faces\.ViewState"\s+value="([^"]+)""#,
        r#"(?i)id="[^"]*ViewState[^"]*"\s+value="([^"]+)""#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Error element of a partial-response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeError {
    pub name: String,
    pub message: String,
}

/// Decoded partial-response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResponse {
    pub updates: UpdateSet,
    pub view_state: Option<ViewState>,
    pub redirect: Option<String>,
    pub error: Option<EnvelopeError>,
}

/// A response body, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Full(String),
    Partial(PartialResponse),
}

/// True if the body is a partial-response envelope.
pub fn is_partial_response(body: &str) -> bool {
    let bytes = body.trim_start().as_bytes();
    let head = &bytes[..bytes.len().min(MARKER_SCAN_BYTES)];
    head.windows(PARTIAL_MARKER.len()).any(|w| w == PARTIAL_MARKER)
}

/// Classify a response body, decoding partial-responses.
pub fn classify(body: &str) -> Result<Classified, ProtocolError> {
    if is_partial_response(body) {
        parse_partial_response(body).map(Classified::Partial)
    } else {
        Ok(Classified::Full(body.to_string()))
    }
}

/// Decode every `<update>` of an envelope plus its redirect and error elements.
pub fn parse_partial_response(xml: &str) -> Result<PartialResponse, ProtocolError> {
    let mut response = PartialResponse::default();
    // Envelope markup outside the update elements; redirect and error are
    // only looked for here so update payloads cannot fake them.
    let mut outside = String::new();

    let mut pos = 0;
    while let Some(caps) = UPDATE_OPEN.captures_at(xml, pos) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(pos..pos);
        outside.push_str(&xml[pos..whole.start]);
        let id = xml_unescape(quoted(&caps));
        let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());

        let payload = if self_closing {
            pos = whole.end;
            String::new()
        } else {
            let (payload, consumed) = read_update_body(&xml[whole.end..])
                .ok_or_else(|| ProtocolError::MalformedEnvelope(format!("unterminated update {:?}", id)))?;
            pos = whole.end + consumed;
            payload
        };

        if id.contains(VIEW_STATE_MARKER) && !payload.trim().is_empty() {
            response.view_state = Some(ViewState::new(payload.trim()));
        }
        response.updates.insert(id, payload);
    }
    outside.push_str(&xml[pos..]);

    response.redirect = REDIRECT.captures(&outside).map(|c| xml_unescape(quoted(&c)));
    if let Some(name) = ERROR_NAME.captures(&outside) {
        let message = ERROR_MESSAGE
            .captures(&outside)
            .map(|c| clean_text(&unwrap_cdata(&c[1])))
            .unwrap_or_default();
        response.error = Some(EnvelopeError {
            name: clean_text(&unwrap_cdata(&name[1])),
            message,
        });
    }

    Ok(response)
}

/// Attribute value of a double- or single-quoted capture pair.
fn quoted<'h>(caps: &regex::Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}

/// Read an update's content up to its closing tag.
/// Returns the decoded payload and the number of bytes consumed, including
/// the closing tag.
fn read_update_body(s: &str) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut i = 0;
    loop {
        let rest = &s[i..];
        if let Some(cdata) = rest.strip_prefix(CDATA_OPEN) {
            let end = cdata.find(CDATA_CLOSE)?;
            out.push_str(&cdata[..end]);
            i += CDATA_OPEN.len() + end + CDATA_CLOSE.len();
        } else if rest.starts_with(UPDATE_CLOSE) {
            return Some((out, i + UPDATE_CLOSE.len()));
        } else {
            let next = rest.find('<')?;
            if next == 0 {
                return None;
            }
            out.push_str(&xml_unescape(&rest[..next]));
            i += next;
        }
    }
}

fn unwrap_cdata(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed
        .strip_prefix(CDATA_OPEN)
        .and_then(|t| t.strip_suffix(CDATA_CLOSE))
    {
        Some(inner) => inner.to_string(),
        None => xml_unescape(trimmed),
    }
}

/// Extract the ViewState from either response form.
///
/// For envelopes this is the view-state update, trimmed. For full pages the
/// known hidden-field patterns are tried in order and the first match is
/// returned unmodified.
pub fn extract_view_state(body: &str) -> Result<ViewState, ProtocolError> {
    match classify(body)? {
        Classified::Partial(partial) => partial.view_state.ok_or_else(|| ProtocolError::NoViewState {
            keys: Some(partial.updates.keys_joined()),
        }),
        Classified::Full(html) => view_state_from_html(&html),
    }
}

fn view_state_from_html(html: &str) -> Result<ViewState, ProtocolError> {
    HIDDEN_VIEW_STATE
        .iter()
        .find_map(|re| re.captures(html).map(|c| ViewState::new(&c[1])))
        .ok_or(ProtocolError::NoViewState { keys: None })
}
