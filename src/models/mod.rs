//! Data models for the registry crawler.

mod context;
mod record;

pub use context::{
    FacesPrefix, Jurisdiction, ResultContext, SearchContext, UpdateSet, ViewState,
};
pub use record::{detail_column, normalize_label, ResultRecord, RECORD_COLUMNS};
