//! Local same-session heuristics. Pure functions, no I/O.

pub mod dedupe;
pub mod heuristics;

pub use dedupe::deduplicate_tabs;
pub use heuristics::{
    base_domain, extract_hostname, has_significant_domain_change, is_domain_excluded,
    is_excluded_url, is_idle_threshold_exceeded, should_start_new_session, CaptureMarker,
};
