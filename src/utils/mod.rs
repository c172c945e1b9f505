//! Shared utility functions.

mod html;

pub use html::{clean_text, strip_tags, truncate_chars, xml_unescape};
