//! bravscrape - crawler for the BRAV lawyer registry.
//!
//! The registry is a PrimeFaces/JSF application: results are only reachable
//! through AJAX exchanges that thread a server-side view state. This crate
//! decodes those exchanges, drives the search → paginate → detail cycle per
//! jurisdiction, and writes the records to CSV.

pub mod cli;
pub mod config;
pub mod error;
pub mod jsf;
pub mod models;
pub mod scrapers;
pub mod sink;
pub mod utils;
