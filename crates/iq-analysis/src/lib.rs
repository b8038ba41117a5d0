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

//! IQ recording analysis library.
//!
//! This library turns SigMF-style recordings into feature arrays for
//! visualization, and generates synthetic RF scenes for testing. The layers
//! can be used independently:
//!
//! - **Metadata layer**: [`metadata::Metadata`] parses a `.sigmf-meta`
//!   document and derives duration, frequency bounds and a power estimate
//! - **Sample layer**: [`samples`] decodes raw I/Q bytes and the
//!   `Real,Imaginary` CSV form
//! - **Spectral layer**: [`spectral::extract`] produces time-domain,
//!   spectrum, spectrogram and constellation views
//! - **Scenario layer**: [`scenario::synthesize`] builds a noise floor with
//!   transmitter bursts placed at random or equally spaced
//! - **Detector interface**: [`detect::Detector`] is the seam for external
//!   detection plugins
//!
//! All operations are synchronous and pure; results are owned by the caller.
//!
//! # Quick Start
//!
//! ```
//! use iq_analysis::metadata::Metadata;
//! use iq_analysis::samples::{self, SampleFormat};
//! use iq_analysis::spectral;
//!
//! let meta = Metadata::parse(br#"{
//!     "global": {"core:datatype": "cf32_le", "core:sample_rate": 1000000},
//!     "captures": [{"core:sample_start": 0, "core:frequency": 433920000}],
//!     "annotations": []
//! }"#).unwrap();
//!
//! let bytes = samples::encode_cf32_le(&samples::tones(1e6, 4096, &[100e3]));
//! let iq = samples::decode(&bytes, SampleFormat::from_datatype(meta.global().datatype.as_deref()).unwrap()).unwrap();
//!
//! let features = spectral::extract(&iq, &meta).unwrap();
//! assert_eq!(features.time_domain.len(), 1000);
//! assert_eq!(features.spectrogram.num_freqs(), 256);
//! ```

pub mod detect;
pub mod metadata;
pub mod samples;
pub mod scenario;
pub mod spectral;

pub use detect::{DetectionOutcome, DetectionRequest, Detector, DetectorError, DetectorParams};
pub use metadata::{Annotation, Metadata, MetadataStats, ParseError};
pub use samples::{SampleFormat, ShapeError};
pub use scenario::{
    synthesize, InvalidParameterError, MatrixCsvError, PlacementMethod, PowerMatrix,
    ScenarioParams, SyntheticScene, Transmitter,
};
pub use spectral::{extract, extract_with, FeatureSet, SpectralConfig, Spectrogram};
