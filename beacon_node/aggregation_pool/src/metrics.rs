pub use beacon_metrics::*;
use lazy_static::lazy_static;

lazy_static! {
    /*
     * Aggregating attestation pool
     */
    pub static ref AGG_POOL_SIZE: Result<IntGauge> = try_create_int_gauge(
        "aggregation_pool_attestations_total",
        "Count of attestations currently stored in the aggregating pool"
    );
    pub static ref AGG_POOL_INSERT_SECONDS: Result<Histogram> = try_create_histogram(
        "aggregation_pool_insert_seconds",
        "Time taken to insert an attestation into the pool"
    );
    pub static ref AGG_POOL_CREATE_GROUP_SECONDS: Result<Histogram> = try_create_histogram(
        "aggregation_pool_create_group_seconds",
        "Time taken to create a group for newly-seen attestation data"
    );
    pub static ref AGG_POOL_PRUNE_SECONDS: Result<Histogram> = try_create_histogram(
        "aggregation_pool_prune_seconds",
        "Time taken to drop expired slots from the pool"
    );
    pub static ref AGG_POOL_BLOCK_PRODUCTION_SECONDS: Result<Histogram> = try_create_histogram(
        "aggregation_pool_block_production_seconds",
        "Time taken to assemble the attestations for a block"
    );
    pub static ref AGG_POOL_EVICTED_ATTESTATIONS_TOTAL: Result<IntCounter> = try_create_int_counter(
        "aggregation_pool_evicted_attestations_total",
        "Count of attestations evicted under capacity pressure"
    );

    /*
     * Validator liveness
     */
    pub static ref AGG_POOL_CURRENT_LIVE_VALIDATORS: Result<IntGauge> = try_create_int_gauge(
        "beacon_current_live_validators",
        "Number of current-epoch validators visible in pending attestations"
    );
    pub static ref AGG_POOL_PREVIOUS_LIVE_VALIDATORS: Result<IntGauge> = try_create_int_gauge(
        "beacon_previous_live_validators",
        "Number of previous-epoch validators visible in pending attestations"
    );
}
