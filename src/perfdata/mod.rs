//! Perfdata Module
//!
//! Turns the performance data suffix of a check output into metrics.
//!
//! ## Pipeline
//! ```text
//! output text ──parse_perfdata──▶ [PerfField] ──MetricNamer──▶ [MetricRecord]
//! ```
//!
//! Both stages are pure functions of their inputs: the same output and the
//! same `CommandSpec` always give the same metrics.

mod parser;
mod namer;

pub use parser::{
    decode_labels, parse_field, parse_perfdata, parse_value, perfdata_section, try_parse_value,
    PerfField, PerfValue, DEFAULT_LABELED_VALUE, INVALID_VALUE, PERFDATA_SEPARATOR,
};
pub use namer::{
    sanitize_label_name, sanitize_label_value, sanitize_metric_name, MetricCandidate,
    MetricNamer, UNDEFINED_METRIC_NAME,
};
