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

//! Interface to external signal detectors.
//!
//! A detector receives the raw samples of a recording plus its tuning
//! parameters and either finds signal regions (returned as annotations) or
//! proposes better tuning parameters. Implementations live outside this crate.

use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::{Annotation, Metadata};

/// Errors reported by or about a detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector failed: {0}")]
    Failed(String),

    #[error("detector returned annotation {index} with freq_upper_edge below freq_lower_edge")]
    InvalidAnnotation { index: usize },

    #[error("detector returned non-finite parameter {0}")]
    InvalidParams(&'static str),
}

/// Tunable detector parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorParams {
    pub beta: f64,
    pub scale: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            beta: 2.0,
            scale: 1.0,
        }
    }
}

/// Everything a detector gets to see.
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
    pub samples: &'a [Complex32],
    pub sample_rate: f64,
    pub center_frequency: f64,
    pub params: DetectorParams,
}

impl<'a> DetectionRequest<'a> {
    /// Build a request from a recording's samples and metadata.
    #[must_use]
    pub fn new(samples: &'a [Complex32], metadata: &Metadata, params: DetectorParams) -> Self {
        Self {
            samples,
            sample_rate: metadata.sample_rate(),
            center_frequency: metadata.center_frequency(),
            params,
        }
    }
}

/// What a detector produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Signal regions found in the recording
    Annotations(Vec<Annotation>),
    /// Suggested parameters for a later run
    TunedParams(DetectorParams),
}

/// An external detection or optimization routine.
pub trait Detector {
    /// Short name for logging.
    fn name(&self) -> &str;

    fn detect(&self, request: &DetectionRequest<'_>) -> Result<DetectionOutcome, DetectorError>;
}

/// Invoke a detector and check what it returned.
pub fn run_detector<D: Detector + ?Sized>(
    detector: &D,
    request: &DetectionRequest<'_>,
) -> Result<DetectionOutcome, DetectorError> {
    log::info!(
        "Running detector '{}' on {} samples (beta={}, scale={})",
        detector.name(),
        request.samples.len(),
        request.params.beta,
        request.params.scale
    );

    let outcome = detector.detect(request)?;

    match &outcome {
        DetectionOutcome::Annotations(annotations) => {
            if let Some(index) = annotations.iter().position(|a| !a.has_ordered_edges()) {
                return Err(DetectorError::InvalidAnnotation { index });
            }
            log::info!("Detector '{}' found {} regions", detector.name(), annotations.len());
        }
        DetectionOutcome::TunedParams(params) => {
            if !params.beta.is_finite() {
                return Err(DetectorError::InvalidParams("beta"));
            }
            if !params.scale.is_finite() {
                return Err(DetectorError::InvalidParams("scale"));
            }
            log::info!(
                "Detector '{}' suggested beta={}, scale={}",
                detector.name(),
                params.beta,
                params.scale
            );
        }
    }

    Ok(outcome)
}
