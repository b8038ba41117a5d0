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

//! Summary statistics derived from a recording's metadata.

use serde::Serialize;

use super::{Annotation, CaptureInfo, GlobalInfo};

/// Scale applied to the sample rate to produce the signal power estimate.
pub const SIGNAL_POWER_SCALE: f64 = 1e-3;

/// Statistics computed once from the parsed sections.
///
/// Values that cannot be derived (missing or zero inputs) are reported as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetadataStats {
    /// Capture start offset in seconds (`sample_start / sample_rate`).
    pub duration: f64,
    /// Lowest frequency in Hz covered by the recording.
    pub min_frequency: f64,
    /// Highest frequency in Hz covered by the recording.
    pub max_frequency: f64,
    /// `max_frequency - min_frequency`, or 0 if either bound is unknown.
    pub frequency_range: f64,
    /// Proxy derived from the sample rate. An estimate, not a measured power.
    pub signal_power: f64,
}

impl MetadataStats {
    /// Derive statistics from typed metadata sections.
    ///
    /// Frequency bounds come from annotation edges when any annotation carries
    /// one; otherwise from a `sample_rate`-wide window around the center
    /// frequency. Both sample rate and center frequency must be non-zero for
    /// the window to apply.
    #[must_use]
    pub fn derive(global: &GlobalInfo, capture: &CaptureInfo, annotations: &[Annotation]) -> Self {
        let sample_rate = nonzero(global.sample_rate);
        let center = nonzero(capture.center_frequency);

        let duration = match (capture.sample_start, sample_rate) {
            (Some(start), Some(rate)) if start > 0 => start as f64 / rate,
            _ => 0.0,
        };

        let window = match (sample_rate, center) {
            (Some(rate), Some(fc)) => Some((fc - rate / 2.0, fc + rate / 2.0)),
            _ => None,
        };

        let lowest_edge = annotations
            .iter()
            .filter_map(|a| a.freq_lower_edge)
            .reduce(f64::min);
        let highest_edge = annotations
            .iter()
            .filter_map(|a| a.freq_upper_edge)
            .reduce(f64::max);

        let min_frequency = lowest_edge.or(window.map(|(lo, _)| lo));
        let max_frequency = highest_edge.or(window.map(|(_, hi)| hi));

        let frequency_range = match (min_frequency, max_frequency) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0.0,
        };

        Self {
            duration,
            min_frequency: min_frequency.unwrap_or(0.0),
            max_frequency: max_frequency.unwrap_or(0.0),
            frequency_range,
            signal_power: sample_rate.map_or(0.0, |rate| rate * SIGNAL_POWER_SCALE),
        }
    }
}

/// Treat zero, NaN and infinities the same as a missing value.
fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}
