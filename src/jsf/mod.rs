//! PrimeFaces/JSF protocol layer: response decoding, page structure and the
//! AJAX exchange.

mod details;
mod response;
mod results;
mod search_page;
mod transport;

pub use details::extract_details;
pub use response::{
    classify, extract_view_state, is_partial_response, parse_partial_response, Classified,
    EnvelopeError, PartialResponse,
};
pub use results::{extract_records, extract_result_context, extract_total_count};
pub use search_page::extract_search_context;
pub use transport::{build_form, validate, AjaxTransport, Exchange, ExchangeOutcome, FormFields};
