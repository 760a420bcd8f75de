//! A wrapper around the `prometheus` crate that provides a global, process-wide metrics
//! registry with fallible metric creation.
//!
//! Metrics are declared as `lazy_static` items of type `Result<Metric>`; registration
//! failures (e.g. duplicate names) surface as `Err` values which every accessor here treats
//! as a silent no-op, so a bad metric definition can never take down the host process.
//!
//! ## Example
//!
//! ```rust
//! use lazy_static::lazy_static;
//! use beacon_metrics::*;
//!
//! lazy_static! {
//!     pub static ref RUN_COUNT: Result<IntCounter> =
//!         try_create_int_counter("runs_total", "Total runs");
//!     pub static ref RUN_SECONDS: Result<Histogram> =
//!         try_create_histogram("run_seconds", "Time taken per run");
//! }
//!
//! fn run() {
//!     inc_counter(&RUN_COUNT);
//!     let _timer = start_timer(&RUN_SECONDS);
//! }
//! # run();
//! ```

use prometheus::{HistogramOpts, Opts};

pub use prometheus::{
    proto::MetricFamily, Encoder, Histogram, HistogramTimer, IntCounter, IntGauge, Result,
    TextEncoder,
};

/// Collect all metrics from the global registry for reporting.
pub fn gather() -> Vec<MetricFamily> {
    prometheus::gather()
}

/// Attempts to create an `IntCounter`, returning `Err` if the registry does not accept it.
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(name, help);
    let counter = IntCounter::with_opts(opts)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Attempts to create an `IntGauge`, returning `Err` if the registry does not accept it.
pub fn try_create_int_gauge(name: &str, help: &str) -> Result<IntGauge> {
    let opts = Opts::new(name, help);
    let gauge = IntGauge::with_opts(opts)?;
    prometheus::register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Attempts to create a `Histogram`, returning `Err` if the registry does not accept it.
pub fn try_create_histogram(name: &str, help: &str) -> Result<Histogram> {
    let opts = HistogramOpts::new(name, help);
    let histogram = Histogram::with_opts(opts)?;
    prometheus::register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Starts a timer for the given histogram, stopping it and recording the duration on drop.
pub fn start_timer(histogram: &Result<Histogram>) -> Option<HistogramTimer> {
    if let Ok(histogram) = histogram {
        Some(histogram.start_timer())
    } else {
        None
    }
}

/// Stops a timer created with `start_timer`, recording the duration.
pub fn stop_timer(timer: Option<HistogramTimer>) {
    if let Some(timer) = timer {
        timer.observe_duration();
    }
}

pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

pub fn inc_counter_by(counter: &Result<IntCounter>, value: u64) {
    if let Ok(counter) = counter {
        counter.inc_by(value);
    }
}

pub fn set_gauge(gauge: &Result<IntGauge>, value: i64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

pub fn observe(histogram: &Result<Histogram>, value: f64) {
    if let Ok(histogram) = histogram {
        histogram.observe(value);
    }
}
