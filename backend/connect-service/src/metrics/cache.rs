use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Read cache events by outcome (hit, miss, error).
    pub static ref QUERY_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "query_cache_events_total",
        "Read cache lookups segmented by outcome",
        &["event"]
    )
    .expect("failed to register query_cache_events_total");

    /// Entries dropped by tag invalidation, by mutation.
    pub static ref QUERY_CACHE_INVALIDATIONS: IntCounterVec = register_int_counter_vec!(
        "query_cache_invalidations_total",
        "Read cache entries invalidated segmented by mutation",
        &["mutation"]
    )
    .expect("failed to register query_cache_invalidations_total");
}
