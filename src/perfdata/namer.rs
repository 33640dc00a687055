//! Metric Namer
//!
//! Turns parsed perfdata fields into metric identities for one command.
//!
//! ## Numeric fields
//! 1. `metric_name` configured: value slot *i* becomes metric `names[i]`,
//!    extra slots are dropped. The field name goes into a label keyed by
//!    `label_name` (or the command name).
//! 2. `metric_prefix` configured: metric `<prefix>_<field>`, first slot,
//!    no label.
//! 3. Otherwise: metric `<command>`, first slot, the field name in a label
//!    keyed by `label_name` (or the command name).
//!
//! A `label_name` of `NONE` suppresses the label in 1 and 3. Several fields
//! then map to the same unlabeled series; such duplicates are emitted as is.
//!
//! ## Labeled fields
//! Metric `<prefix or command>_<field>` with the decoded labels.

use crate::config::NamingDefaults;
use crate::metrics::{MetricKind, MetricRecord};
use crate::profile::CommandSpec;

use super::parser::{parse_value, PerfField, PerfValue, DEFAULT_LABELED_VALUE, INVALID_VALUE};

/// Name used when sanitizing an empty string
pub const UNDEFINED_METRIC_NAME: &str = "undefined_metric_name";

/// Make `name` a valid Prometheus metric name
///
/// Characters outside `[a-zA-Z0-9_:]` become `_`, as does a leading digit;
/// the result is lowercase.
pub fn sanitize_metric_name(name: &str) -> String {
    if name.is_empty() {
        return UNDEFINED_METRIC_NAME.to_string();
    }
    name.chars()
        .enumerate()
        .map(|(i, c)| match c {
            'a'..='z' | 'A'..='Z' | '_' | ':' => c.to_ascii_lowercase(),
            '0'..='9' if i > 0 => c,
            _ => '_',
        })
        .collect()
}

/// Make `name` a valid Prometheus label name
///
/// Same as `sanitize_metric_name`, but `:` is not allowed in label names.
pub fn sanitize_label_name(name: &str) -> String {
    sanitize_metric_name(name).replace(':', "_")
}

/// Replace everything outside printable ASCII with `_`
pub fn sanitize_label_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '_' })
        .collect()
}

/// A metric derived from perfdata, before help and type are attached
#[derive(Debug, Clone, PartialEq)]
pub struct MetricCandidate {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl MetricCandidate {
    pub fn into_record(self, help: &str, kind: MetricKind) -> MetricRecord {
        let (label_keys, label_values) = self.labels.into_iter().unzip();
        MetricRecord {
            name: self.name,
            help: help.to_string(),
            kind,
            label_keys,
            label_values,
            value: self.value,
        }
    }
}

/// Applies the naming policy of one command
pub struct MetricNamer<'a> {
    spec: &'a CommandSpec,
    defaults: &'a NamingDefaults,
}

impl<'a> MetricNamer<'a> {
    pub fn new(spec: &'a CommandSpec, defaults: &'a NamingDefaults) -> Self {
        Self { spec, defaults }
    }

    /// Candidates for all fields, in field order
    pub fn candidates(&self, fields: &[PerfField]) -> Vec<MetricCandidate> {
        fields.iter().flat_map(|f| self.name_field(f)).collect()
    }

    /// Finished records for all fields, in field order
    pub fn records(&self, fields: &[PerfField]) -> Vec<MetricRecord> {
        let help = self.spec.help_or(self.defaults);
        let kind = self.spec.kind_or(self.defaults);
        self.candidates(fields)
            .into_iter()
            .map(|c| c.into_record(help, kind))
            .collect()
    }

    /// Candidates for one field
    pub fn name_field(&self, field: &PerfField) -> Vec<MetricCandidate> {
        match &field.value {
            PerfValue::Numeric { values } => self.name_numeric(&field.name, values),
            PerfValue::Labeled { pairs, extra } => {
                vec![self.name_labeled(&field.name, pairs, extra.as_deref())]
            }
        }
    }

    fn name_numeric(&self, field: &str, values: &[String]) -> Vec<MetricCandidate> {
        if let Some(names) = self.spec.metric_names() {
            let labels = self.field_label(field);
            return values
                .iter()
                .zip(names)
                .filter(|(_, name)| !name.is_empty())
                .map(|(raw, name)| MetricCandidate {
                    name: sanitize_metric_name(name),
                    labels: labels.clone(),
                    value: parse_value(raw),
                })
                .collect();
        }

        let first = values.first().map_or(INVALID_VALUE, |raw| parse_value(raw));

        if let Some(prefix) = self.spec.prefix() {
            return vec![MetricCandidate {
                name: sanitize_metric_name(&format!("{}_{}", prefix, field)),
                labels: Vec::new(),
                value: first,
            }];
        }

        vec![MetricCandidate {
            name: sanitize_metric_name(&self.spec.command),
            labels: self.field_label(field),
            value: first,
        }]
    }

    fn name_labeled(
        &self,
        field: &str,
        pairs: &[(String, String)],
        extra: Option<&str>,
    ) -> MetricCandidate {
        let base = self.spec.prefix().unwrap_or(&self.spec.command);
        MetricCandidate {
            name: sanitize_metric_name(&format!("{}_{}", base, field)),
            labels: pairs
                .iter()
                .map(|(k, v)| (k.clone(), sanitize_label_value(v)))
                .collect(),
            value: extra.map_or(DEFAULT_LABELED_VALUE, parse_value),
        }
    }

    /// The single label carrying the field name, unless suppressed by `NONE`
    fn field_label(&self, field: &str) -> Vec<(String, String)> {
        if self.spec.is_label_none() {
            return Vec::new();
        }
        let key = self.spec.label().unwrap_or(&self.spec.command);
        vec![(sanitize_label_name(key), sanitize_label_value(field))]
    }
}
