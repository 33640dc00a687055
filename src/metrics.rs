//! Metric records and Prometheus text exposition
//!
//! A scrape produces an ordered list of `MetricRecord`s. `encode_text`
//! renders them in the Prometheus text format through the `prometheus`
//! crate's data model. Records are not registered in a `Registry`: names
//! are only known at scrape time and duplicate samples are allowed.

use std::collections::HashMap;

use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metric value type
///
/// Parsed case-insensitively, both on the command line and in profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MetricKind {
    Counter,
    #[default]
    Gauge,
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(format!("unsupported metric type: {}", other)),
        }
    }
}

impl TryFrom<String> for MetricKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// One sample
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_keys: Vec<String>,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_keys: Vec::new(),
            label_values: Vec::new(),
            value,
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Gauge, value)
    }

    /// Append a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_keys.push(key.into());
        self.label_values.push(value.into());
        self
    }

    /// Value of the label `key`, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.label_keys
            .iter()
            .position(|k| k == key)
            .map(|i| self.label_values[i].as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.label_keys
            .iter()
            .map(String::as_str)
            .zip(self.label_values.iter().map(String::as_str))
    }

    fn to_proto(&self) -> proto::Metric {
        let labels: Vec<LabelPair> = self
            .labels()
            .map(|(k, v)| {
                let mut pair = LabelPair::default();
                pair.set_name(k.to_string());
                pair.set_value(v.to_string());
                pair
            })
            .collect();

        let mut metric = proto::Metric::default();
        metric.set_label(labels.into());
        match self.kind {
            MetricKind::Counter => {
                let mut counter = proto::Counter::default();
                counter.set_value(self.value);
                metric.set_counter(counter);
            }
            MetricKind::Gauge => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(self.value);
                metric.set_gauge(gauge);
            }
        }
        metric
    }
}

/// Receives records as a scrape produces them
pub trait MetricSink {
    fn emit(&mut self, record: MetricRecord);
}

impl MetricSink for Vec<MetricRecord> {
    fn emit(&mut self, record: MetricRecord) {
        self.push(record);
    }
}

/// Group records into metric families, in first-appearance order
///
/// The first record of a name decides the family's help and type.
pub fn to_families(records: &[MetricRecord]) -> Vec<MetricFamily> {
    let mut order: Vec<(MetricFamily, Vec<proto::Metric>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let slot = *index.entry(record.name.as_str()).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(record.name.clone());
            family.set_help(record.help.clone());
            family.set_field_type(metric_type(record.kind));
            order.push((family, Vec::new()));
            order.len() - 1
        });

        let (family, metrics) = &mut order[slot];
        let mut metric = record.to_proto();
        // Keep the sample consistent with its family's type
        if family.get_field_type() != metric_type(record.kind) {
            metric = MetricRecord {
                kind: kind_of(family.get_field_type()),
                ..record.clone()
            }
            .to_proto();
        }
        metrics.push(metric);
    }

    order
        .into_iter()
        .map(|(mut family, metrics)| {
            family.set_metric(metrics.into());
            family
        })
        .collect()
}

/// Render records in the Prometheus text exposition format
pub fn encode_text(records: &[MetricRecord]) -> Result<String> {
    let families = to_families(records);
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn metric_type(kind: MetricKind) -> MetricType {
    match kind {
        MetricKind::Counter => MetricType::COUNTER,
        MetricKind::Gauge => MetricType::GAUGE,
    }
}

fn kind_of(metric_type: MetricType) -> MetricKind {
    match metric_type {
        MetricType::COUNTER => MetricKind::Counter,
        _ => MetricKind::Gauge,
    }
}
