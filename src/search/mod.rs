//! BDRC lookup for titles and persons
//!
//! # Components
//!
//! - [`build_msearch_payload`]: multi-search NDJSON body
//! - [`BdrcClient`]: HTTP client with bounded retry
//! - [`DebouncedSearch`]: per-field debounce and cancellation
//!
//! Search fields only observe [`SearchState`] (`is_loading`, `results`,
//! `error`).

mod bdrc;
mod debounce;
mod types;

pub use bdrc::{
    build_msearch_payload, parse_msearch_response, BdrcClient, RetryPolicy, DEFAULT_BDRC_ENDPOINT,
};
pub use debounce::{DebouncedSearch, DEFAULT_DEBOUNCE};
pub use types::{SearchBackend, SearchError, SearchHit, SearchRequest, SearchState, SearchType};
