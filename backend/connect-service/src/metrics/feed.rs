use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

lazy_static! {
    /// Time to assemble one page, by mode (feed, explore, user_posts).
    pub static ref FEED_ASSEMBLY_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_assembly_duration_seconds",
        "Page assembly duration segmented by mode",
        &["mode"]
    )
    .expect("failed to register feed_assembly_duration_seconds");

    /// Store lookups issued to augment one page.
    pub static ref FEED_AUGMENT_LOOKUPS: HistogramVec = register_histogram_vec!(
        "feed_augment_lookups",
        "Store lookups per assembled page segmented by mode",
        &["mode"],
        vec![0.0, 4.0, 8.0, 16.0, 24.0, 32.0, 40.0, 80.0, 160.0]
    )
    .expect("failed to register feed_augment_lookups");

    /// Assembled pages by mode and outcome (ok, error).
    pub static ref FEED_PAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_pages_total",
        "Assembled pages segmented by mode and outcome",
        &["mode", "outcome"]
    )
    .expect("failed to register feed_pages_total");
}
