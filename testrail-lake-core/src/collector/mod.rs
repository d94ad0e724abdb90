//! TestRail API collection
//!
//! This module pulls records from the TestRail API into the raw store.
//!
//! ## Architecture
//!
//! - [`ApiClient`] is the seam between collection and HTTP; [`TestrailClient`]
//!   implements it over reqwest with basic auth
//! - [`ApiCollector`] drives one endpoint family: flat or paginated, optionally
//!   fanned out over parent records
//! - [`endpoints::collect`] knows which endpoint, parser and fan-out input each
//!   entity kind needs
//!
//! A collection first clears the raw rows it staged previously for the same
//! `(table, params)`, so re-running replaces rather than duplicates.

mod client;
pub mod endpoints;
mod pager;

pub use client::{ApiClient, TestrailClient, API_PREFIX};
pub use endpoints::collect;
pub use pager::{
    ApiCollector, ApiCollectorArgs, CollectStats, Page, QueryFn, ResponseParser, UrlTemplate,
};
