// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SigMF recording metadata.
//!
//! A `.sigmf-meta` document has three top-level sections:
//!
//! ```text
//! { "global": {...}, "captures": [{...}, ...], "annotations": [{...}, ...] }
//! ```
//!
//! Parsing happens in two pure steps. The document is first deserialized into
//! typed per-section structs ([`GlobalInfo`], [`CaptureInfo`], [`Annotation`]),
//! then [`MetadataStats::derive`] computes the summary statistics once. The
//! resulting [`Metadata`] is never mutated afterwards.

mod stats;

pub use stats::{MetadataStats, SIGNAL_POWER_SCALE};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while parsing a metadata document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid metadata format: {0}")]
    InvalidFormat(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// The `global` section of a recording.
///
/// Every field is optional; absent keys deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalInfo {
    /// Sample format, e.g. `cf32_le`.
    #[serde(rename = "core:datatype", default)]
    pub datatype: Option<String>,

    /// Sample rate in Hz.
    #[serde(rename = "core:sample_rate", default)]
    pub sample_rate: Option<f64>,

    #[serde(rename = "core:author", default)]
    pub author: Option<String>,

    /// Hardware used to make the recording.
    #[serde(rename = "core:hw", default)]
    pub hardware: Option<String>,

    /// Index offset of the first sample in the data file.
    #[serde(rename = "core:offset", default)]
    pub offset: Option<u64>,

    #[serde(rename = "core:recorder", default)]
    pub recorder: Option<String>,

    #[serde(rename = "core:description", default)]
    pub description: Option<String>,

    #[serde(rename = "core:version", default)]
    pub version: Option<String>,

    /// SHA-512 of the data file, hex encoded.
    #[serde(rename = "core:sha512", default)]
    pub sha512: Option<String>,

    #[serde(rename = "core:license", default)]
    pub license: Option<String>,
}

/// The first entry of the `captures` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureInfo {
    /// ISO-8601 timestamp of the capture start.
    #[serde(rename = "core:datetime", default)]
    pub datetime: Option<String>,

    /// Center frequency in Hz.
    #[serde(rename = "core:frequency", default)]
    pub center_frequency: Option<f64>,

    #[serde(rename = "core:sample_start", default)]
    pub sample_start: Option<u64>,
}

/// A labeled region of a recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Annotation {
    /// First sample covered by the annotation.
    pub start_sample: u64,
    /// Number of samples covered.
    pub sample_count: u64,
    /// Lower frequency edge in Hz.
    pub freq_lower_edge: Option<f64>,
    /// Upper frequency edge in Hz.
    pub freq_upper_edge: Option<f64>,
    pub label: Option<String>,
    pub comment: Option<String>,
}

impl Annotation {
    /// True unless both edges are present and the upper one lies below the lower one.
    #[must_use]
    pub fn has_ordered_edges(&self) -> bool {
        match (self.freq_lower_edge, self.freq_upper_edge) {
            (Some(lower), Some(upper)) => upper >= lower,
            _ => true,
        }
    }
}

/// Annotation as it appears on the wire.
///
/// Both namespaced (`core:sample_start`) and bare (`sample_start`) keys are
/// accepted; older uploads used the bare form.
#[derive(Debug, Deserialize)]
struct AnnotationEntry {
    #[serde(rename = "core:sample_start", alias = "sample_start", default)]
    sample_start: Option<u64>,
    #[serde(rename = "core:sample_count", alias = "sample_count", default)]
    sample_count: Option<u64>,
    #[serde(rename = "core:freq_lower_edge", alias = "freq_lower_edge", default)]
    freq_lower_edge: Option<f64>,
    #[serde(rename = "core:freq_upper_edge", alias = "freq_upper_edge", default)]
    freq_upper_edge: Option<f64>,
    #[serde(rename = "core:label", alias = "label", default)]
    label: Option<String>,
    #[serde(rename = "core:comment", alias = "comment", default)]
    comment: Option<String>,
}

impl From<AnnotationEntry> for Annotation {
    fn from(entry: AnnotationEntry) -> Self {
        Self {
            start_sample: entry.sample_start.unwrap_or(0),
            sample_count: entry.sample_count.unwrap_or(0),
            freq_lower_edge: entry.freq_lower_edge,
            freq_upper_edge: entry.freq_upper_edge,
            label: entry.label,
            comment: entry.comment,
        }
    }
}

/// Parsed description of one recording, with derived statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    global: GlobalInfo,
    capture: CaptureInfo,
    annotations: Vec<Annotation>,
    stats: MetadataStats,
}

/// Flat view of a recording used for display and JSON export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataSummary {
    pub datatype: Option<String>,
    pub sample_rate: Option<f64>,
    pub center_frequency: Option<f64>,
    pub sample_start: Option<u64>,
    pub offset: Option<u64>,
    pub author: Option<String>,
    pub hardware: Option<String>,
    pub recorder: Option<String>,
    pub datetime: Option<String>,
    pub annotation_count: usize,
    #[serde(flatten)]
    pub stats: MetadataStats,
}

impl Metadata {
    /// Parse a metadata document from raw bytes.
    ///
    /// Missing optional fields never fail the parse. The document must be a
    /// JSON object with `global`, `captures` (non-empty) and `annotations`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ParseError::InvalidFormat(e.to_string()))?;

        let Value::Object(mut root) = value else {
            return Err(ParseError::InvalidFormat(
                "top-level value is not an object".to_string(),
            ));
        };

        let global: GlobalInfo = take_section(&mut root, "global")?;
        let captures: Vec<CaptureInfo> = take_section(&mut root, "captures")?;
        let entries: Vec<AnnotationEntry> = take_section(&mut root, "annotations")?;

        let capture = captures
            .into_iter()
            .next()
            .ok_or(ParseError::MissingField("captures[0]"))?;

        let annotations: Vec<Annotation> = entries.into_iter().map(Annotation::from).collect();

        if let Some(bad) = annotations.iter().position(|a| !a.has_ordered_edges()) {
            return Err(ParseError::InvalidValue {
                field: "annotations",
                value: format!("entry {bad} has freq_upper_edge below freq_lower_edge"),
            });
        }

        let metadata = Self::from_parts(global, capture, annotations);
        log::debug!(
            "Parsed metadata: {} annotations, sample rate {:?}, center {:?}",
            metadata.annotations.len(),
            metadata.global.sample_rate,
            metadata.capture.center_frequency
        );
        Ok(metadata)
    }

    /// Assemble a model from already-typed sections and derive its statistics.
    #[must_use]
    pub fn from_parts(global: GlobalInfo, capture: CaptureInfo, annotations: Vec<Annotation>) -> Self {
        let stats = MetadataStats::derive(&global, &capture, &annotations);
        Self {
            global,
            capture,
            annotations,
            stats,
        }
    }

    #[must_use]
    pub fn global(&self) -> &GlobalInfo {
        &self.global
    }

    #[must_use]
    pub fn capture(&self) -> &CaptureInfo {
        &self.capture
    }

    /// Annotations in document order.
    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    #[must_use]
    pub fn stats(&self) -> &MetadataStats {
        &self.stats
    }

    /// Sample rate in Hz, or 0 when unknown.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.global.sample_rate.unwrap_or(0.0)
    }

    /// Center frequency in Hz, or 0 when unknown.
    #[must_use]
    pub fn center_frequency(&self) -> f64 {
        self.capture.center_frequency.unwrap_or(0.0)
    }

    /// Capture start time, if present and valid RFC 3339.
    #[must_use]
    pub fn datetime_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.capture.datetime.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    #[must_use]
    pub fn summary(&self) -> MetadataSummary {
        MetadataSummary {
            datatype: self.global.datatype.clone(),
            sample_rate: self.global.sample_rate,
            center_frequency: self.capture.center_frequency,
            sample_start: self.capture.sample_start,
            offset: self.global.offset,
            author: self.global.author.clone(),
            hardware: self.global.hardware.clone(),
            recorder: self.global.recorder.clone(),
            datetime: self.capture.datetime.clone(),
            annotation_count: self.annotations.len(),
            stats: self.stats,
        }
    }
}

/// Remove a required top-level key and deserialize it.
fn take_section<T: DeserializeOwned>(
    root: &mut Map<String, Value>,
    key: &'static str,
) -> Result<T, ParseError> {
    let value = root.remove(key).ok_or(ParseError::MissingField(key))?;
    serde_json::from_value(value).map_err(|e| ParseError::InvalidValue {
        field: key,
        value: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DOC: &str = r#"{
        "global": {
            "core:datatype": "cf32_le",
            "core:sample_rate": 2000000,
            "core:author": "ops",
            "core:hw": "HackRF One",
            "core:offset": 0,
            "core:recorder": "gnuradio",
            "core:version": "1.0.0"
        },
        "captures": [
            {"core:sample_start": 4000000, "core:frequency": 915000000.0,
             "core:datetime": "2024-03-01T12:00:00Z"},
            {"core:sample_start": 9, "core:frequency": 1.0}
        ],
        "annotations": [
            {"core:sample_start": 0, "core:sample_count": 100,
             "core:freq_lower_edge": 914500000.0, "core:freq_upper_edge": 914700000.0,
             "core:label": "burst"},
            {"core:sample_start": 500, "core:sample_count": 50,
             "core:freq_lower_edge": 914200000.0},
            {"core:sample_start": 900, "core:sample_count": 10,
             "core:freq_upper_edge": 915300000.0, "core:comment": "tail"}
        ]
    }"#;

    fn doc(global: &str, capture: &str, annotations: &str) -> String {
        format!(r#"{{"global": {global}, "captures": [{capture}], "annotations": {annotations}}}"#)
    }

    #[test]
    fn test_parse_full_document() {
        let meta = Metadata::parse(FULL_DOC.as_bytes()).unwrap();

        assert_eq!(meta.global().datatype.as_deref(), Some("cf32_le"));
        assert_eq!(meta.sample_rate(), 2_000_000.0);
        assert_eq!(meta.global().hardware.as_deref(), Some("HackRF One"));
        assert_eq!(meta.global().recorder.as_deref(), Some("gnuradio"));
        assert_eq!(meta.center_frequency(), 915_000_000.0);
        assert_eq!(meta.capture().sample_start, Some(4_000_000));
        assert_eq!(meta.annotations().len(), 3);
        assert_eq!(meta.annotations()[0].label.as_deref(), Some("burst"));
        assert_eq!(meta.annotations()[2].comment.as_deref(), Some("tail"));
    }

    #[test]
    fn test_only_first_capture_is_used() {
        let meta = Metadata::parse(FULL_DOC.as_bytes()).unwrap();
        assert_eq!(meta.capture().sample_start, Some(4_000_000));
    }

    #[test]
    fn test_derived_stats_from_annotations() {
        let meta = Metadata::parse(FULL_DOC.as_bytes()).unwrap();
        let stats = meta.stats();

        assert_eq!(stats.duration, 2.0);
        assert_eq!(stats.min_frequency, 914_200_000.0);
        assert_eq!(stats.max_frequency, 915_300_000.0);
        assert_eq!(stats.frequency_range, 1_100_000.0);
        assert_eq!(stats.signal_power, 2_000_000.0 * SIGNAL_POWER_SCALE);
    }

    #[test]
    fn test_empty_annotations_fall_back_to_window() {
        let text = doc(
            r#"{"core:sample_rate": 1000000}"#,
            r#"{"core:frequency": 100000000}"#,
            "[]",
        );
        let meta = Metadata::parse(text.as_bytes()).unwrap();
        let stats = meta.stats();

        assert!(meta.annotations().is_empty());
        assert_eq!(stats.min_frequency, 99_500_000.0);
        assert_eq!(stats.max_frequency, 100_500_000.0);
        assert_eq!(stats.frequency_range, 1_000_000.0);
    }

    #[test]
    fn test_zero_center_frequency_gives_zero_bounds() {
        let text = doc(
            r#"{"core:sample_rate": 1000000}"#,
            r#"{"core:frequency": 0}"#,
            "[]",
        );
        let stats = *Metadata::parse(text.as_bytes()).unwrap().stats();

        assert_eq!(stats.min_frequency, 0.0);
        assert_eq!(stats.max_frequency, 0.0);
        assert_eq!(stats.frequency_range, 0.0);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let text = doc("{}", "{}", "[]");
        let meta = Metadata::parse(text.as_bytes()).unwrap();

        assert_eq!(meta.sample_rate(), 0.0);
        assert_eq!(meta.center_frequency(), 0.0);
        assert!(meta.global().author.is_none());
        assert!(meta.datetime_utc().is_none());
        assert_eq!(*meta.stats(), MetadataStats::default());
    }

    #[test]
    fn test_annotation_missing_counts_default_to_zero() {
        let text = doc(
            r#"{"core:sample_rate": 1000000}"#,
            r#"{"core:frequency": 100000000}"#,
            r#"[{"core:label": "unsized"}]"#,
        );
        let meta = Metadata::parse(text.as_bytes()).unwrap();
        let annotation = &meta.annotations()[0];

        assert_eq!(annotation.start_sample, 0);
        assert_eq!(annotation.sample_count, 0);
        assert_eq!(annotation.label.as_deref(), Some("unsized"));
        // no edges anywhere, so the window is used
        assert_eq!(meta.stats().min_frequency, 99_500_000.0);
    }

    #[test]
    fn test_bare_annotation_keys_accepted() {
        let text = doc(
            "{}",
            "{}",
            r#"[{"sample_start": 10, "sample_count": 20,
                 "freq_lower_edge": 5.0, "freq_upper_edge": 7.5, "label": "bare"}]"#,
        );
        let meta = Metadata::parse(text.as_bytes()).unwrap();
        let annotation = &meta.annotations()[0];

        assert_eq!(annotation.start_sample, 10);
        assert_eq!(annotation.sample_count, 20);
        assert_eq!(annotation.freq_lower_edge, Some(5.0));
        assert_eq!(meta.stats().frequency_range, 2.5);
    }

    #[test]
    fn test_missing_annotations_key_fails() {
        let text = r#"{"global": {}, "captures": [{}]}"#;
        let err = Metadata::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("annotations")));
    }

    #[test]
    fn test_missing_global_key_fails() {
        let text = r#"{"captures": [{}], "annotations": []}"#;
        let err = Metadata::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("global")));
    }

    #[test]
    fn test_empty_captures_fails() {
        let text = r#"{"global": {}, "captures": [], "annotations": []}"#;
        let err = Metadata::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("captures[0]")));
    }

    #[test]
    fn test_invalid_json_fails() {
        let err = Metadata::parse(b"{not json").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));

        let err = Metadata::parse(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_inverted_annotation_edges_rejected() {
        let text = doc(
            "{}",
            "{}",
            r#"[{"core:freq_lower_edge": 10.0, "core:freq_upper_edge": 5.0}]"#,
        );
        let err = Metadata::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { field: "annotations", .. }));
    }

    #[test]
    fn test_wrong_section_type_fails() {
        let text = r#"{"global": {}, "captures": {}, "annotations": []}"#;
        let err = Metadata::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { field: "captures", .. }));
    }

    #[test]
    fn test_datetime_utc() {
        let meta = Metadata::parse(FULL_DOC.as_bytes()).unwrap();
        let dt = meta.datetime_utc().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_summary_serializes_flat() {
        let meta = Metadata::parse(FULL_DOC.as_bytes()).unwrap();
        let json = serde_json::to_value(meta.summary()).unwrap();

        assert_eq!(json["annotation_count"], 3);
        assert_eq!(json["hardware"], "HackRF One");
        assert_eq!(json["duration"], 2.0);
        assert_eq!(json["min_frequency"], 914_200_000.0);
    }
}
