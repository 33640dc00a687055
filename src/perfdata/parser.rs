//! Perfdata Parser
//!
//! Extracts performance data fields from a check's output text.
//!
//! ```text
//! DISK OK - free space: / 3326 MB | /=2643MB;5948;5958;0;5968 conn=labels(a2V5PSJ2YWwi),3
//! └────────── status line ───────┘ └──────── numeric ───────┘ └──────── labeled ────────┘
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{NrpeError, Result};

/// Separator between the status line and perfdata
pub const PERFDATA_SEPARATOR: char = '|';

/// Value used when a perfdata value is missing or not numeric
pub const INVALID_VALUE: f64 = -1.0;

/// Value of a labeled field without an explicit number
pub const DEFAULT_LABELED_VALUE: f64 = 1.0;

lazy_static! {
    /// `labels(<base64>)[,<value>]`
    static ref LABELS_RE: Regex =
        Regex::new(r"^labels\(([^)]*)\)(?:,(.*))?$").expect("labels pattern");

    /// `key="value"` inside a decoded label payload
    static ref LABEL_PAIR_RE: Regex =
        Regex::new(r#"^([A-Za-z_][A-Za-z0-9_]*)="([^"]*)"$"#).expect("label pair pattern");

    /// Leading numeric part of a raw value (`0.50s` -> `0.50`)
    static ref VALUE_RE: Regex = Regex::new(r"^[+-]?[0-9.]+").expect("value pattern");
}

/// One `name=value` token of perfdata
#[derive(Debug, Clone, PartialEq)]
pub struct PerfField {
    pub name: String,
    pub value: PerfValue,
}

/// The value side of a perfdata field
#[derive(Debug, Clone, PartialEq)]
pub enum PerfValue {
    /// `v1;v2;v3...` raw slots, in order
    Numeric { values: Vec<String> },

    /// `labels(<base64>)[,extra]` with its decoded pairs
    Labeled {
        pairs: Vec<(String, String)>,
        extra: Option<String>,
    },
}

/// The perfdata part of `output`, trimmed; `None` when there is none
pub fn perfdata_section(output: &str) -> Option<&str> {
    output
        .split_once(PERFDATA_SEPARATOR)
        .map(|(_, rest)| rest.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n')))
}

/// Parse all perfdata fields of a check output
///
/// Output without a `|` has no perfdata and yields no fields. Malformed
/// fields are skipped; they never fail the whole output.
pub fn parse_perfdata(output: &str) -> Vec<PerfField> {
    let Some(section) = perfdata_section(output) else {
        return Vec::new();
    };
    tracing::debug!("perfdata: {:?}", section);

    section
        .split(' ')
        .filter(|token| !token.is_empty())
        .filter_map(parse_field)
        .collect()
}

/// Parse one `name=value` token
///
/// Returns `None` for tokens without `=` and for labeled fields whose
/// labels cannot be decoded.
pub fn parse_field(token: &str) -> Option<PerfField> {
    let Some((name, raw)) = token.split_once('=') else {
        tracing::debug!("Skipping perfdata token without '=': {:?}", token);
        return None;
    };

    if let Some(caps) = LABELS_RE.captures(raw) {
        let encoded = caps.get(1).map_or("", |m| m.as_str());
        return match decode_labels(encoded) {
            Ok(pairs) => Some(PerfField {
                name: name.to_string(),
                value: PerfValue::Labeled {
                    pairs,
                    extra: caps.get(2).map(|m| m.as_str().to_string()),
                },
            }),
            Err(e) => {
                tracing::warn!("Dropping perfdata field {:?}: {}", name, e);
                None
            }
        };
    }

    Some(PerfField {
        name: name.to_string(),
        value: PerfValue::Numeric {
            values: raw.split(';').map(str::to_string).collect(),
        },
    })
}

/// Decode a base64 label payload into `key="value"` pairs
///
/// All or nothing: one malformed pair or repeated key rejects the whole
/// payload.
pub fn decode_labels(encoded: &str) -> Result<Vec<(String, String)>> {
    let bytes = BASE64.decode(encoded)?;
    let text: String = String::from_utf8_lossy(&bytes)
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    let mut pairs = Vec::new();
    for token in text.split(' ').filter(|t| !t.is_empty()) {
        let caps = LABEL_PAIR_RE
            .captures(token)
            .ok_or_else(|| NrpeError::LabelDecode(format!("malformed label {:?}", token)))?;
        let key = &caps[1];
        if pairs.iter().any(|(k, _)| k == key) {
            return Err(NrpeError::LabelDecode(format!("duplicate label {:?}", key)));
        }
        pairs.push((key.to_string(), caps[2].to_string()));
    }

    if pairs.is_empty() {
        return Err(NrpeError::LabelDecode("no labels in payload".to_string()));
    }
    Ok(pairs)
}

/// Parse the leading number of a raw perfdata value
pub fn try_parse_value(raw: &str) -> Result<f64> {
    VALUE_RE
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| NrpeError::ValueParse(raw.to_string()))
}

/// Parse the leading number of a raw perfdata value, `-1` when invalid
pub fn parse_value(raw: &str) -> f64 {
    match try_parse_value(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("{}", e);
            INVALID_VALUE
        }
    }
}
