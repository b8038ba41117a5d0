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

//! Spectral feature extraction for IQ recordings.
//!
//! [`extract`] turns a sample sequence plus its [`Metadata`] into a
//! [`FeatureSet`] with four independent views:
//! - time-domain trace of the first samples
//! - centered full-length spectrum in dB
//! - STFT power spectrogram (linear; converted to dB only for rendering)
//! - constellation (IQ scatter) sample

mod stft;

pub use stft::{Spectrogram, POWER_FLOOR};

use std::io::Write;

use num_complex::Complex32;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::metadata::Metadata;
pub use crate::samples::ShapeError;

/// Smallest magnitude used before taking a logarithm.
pub const MAGNITUDE_FLOOR: f64 = 1e-12;

/// Tuning for [`extract_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectralConfig {
    /// STFT segment length
    pub nfft: usize,
    /// Samples shared by consecutive STFT segments
    pub noverlap: usize,
    /// Number of samples in the time-domain trace
    pub time_domain_len: usize,
    /// Number of samples in the constellation view
    pub constellation_len: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            nfft: 256,
            noverlap: 128,
            time_domain_len: 1000,
            constellation_len: 5000,
        }
    }
}

impl SpectralConfig {
    fn validate(&self) -> Result<(), ShapeError> {
        if self.nfft == 0 || self.noverlap >= self.nfft {
            return Err(ShapeError::InvalidWindow {
                nfft: self.nfft,
                noverlap: self.noverlap,
            });
        }
        Ok(())
    }
}

/// Leading samples against a time axis in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeDomain {
    pub time: Vec<f64>,
    pub real: Vec<f32>,
    pub imag: Vec<f32>,
}

impl TimeDomain {
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["time", "real", "imag"])?;
        for ((t, re), im) in self.time.iter().zip(&self.real).zip(&self.imag) {
            csv_writer.write_record([t.to_string(), re.to_string(), im.to_string()])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Magnitude spectrum, zero frequency centered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    /// Bin frequencies in Hz (baseband, not offset by the center frequency)
    pub frequencies: Vec<f64>,
    /// `20·log10(|X|)` per bin
    pub magnitude_db: Vec<f64>,
}

impl Spectrum {
    /// Frequency and level of the strongest bin.
    #[must_use]
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.magnitude_db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &db)| (self.frequencies[i], db))
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["frequency_hz", "magnitude_db"])?;
        for (f, db) in self.frequencies.iter().zip(&self.magnitude_db) {
            csv_writer.write_record([f.to_string(), db.to_string()])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Raw I/Q components for a scatter plot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constellation {
    pub real: Vec<f32>,
    pub imag: Vec<f32>,
}

impl Constellation {
    #[must_use]
    pub fn len(&self) -> usize {
        self.real.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["real", "imag"])?;
        for (re, im) in self.real.iter().zip(&self.imag) {
            csv_writer.write_record([re.to_string(), im.to_string()])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// All feature views derived from one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub time_domain: TimeDomain,
    pub frequency_spectrum: Spectrum,
    pub spectrogram: Spectrogram,
    pub iq_scatter: Constellation,
}

/// Extract features with the default [`SpectralConfig`].
pub fn extract(samples: &[Complex32], metadata: &Metadata) -> Result<FeatureSet, ShapeError> {
    extract_with(samples, metadata, &SpectralConfig::default())
}

/// Extract features from `samples` using the metadata's sample rate and
/// center frequency.
///
/// An unknown (non-positive) sample rate yields axes in normalized units,
/// as if the rate were 1 Hz.
pub fn extract_with(
    samples: &[Complex32],
    metadata: &Metadata,
    config: &SpectralConfig,
) -> Result<FeatureSet, ShapeError> {
    if samples.is_empty() {
        return Err(ShapeError::Empty);
    }
    config.validate()?;

    let sample_rate = if metadata.sample_rate() > 0.0 {
        metadata.sample_rate()
    } else {
        log::warn!("Sample rate unknown, using normalized frequency and time axes");
        1.0
    };
    let center_frequency = metadata.center_frequency();

    log::debug!(
        "Extracting features: {} samples, fs={:.1} Hz, fc={:.1} Hz",
        samples.len(),
        sample_rate,
        center_frequency
    );

    let wide: Vec<Complex64> = samples
        .iter()
        .map(|s| Complex64::new(f64::from(s.re), f64::from(s.im)))
        .collect();
    let mut planner = FftPlanner::new();

    Ok(FeatureSet {
        time_domain: time_domain(samples, sample_rate, config.time_domain_len),
        frequency_spectrum: frequency_spectrum(&wide, sample_rate, &mut planner),
        spectrogram: stft::compute(
            &wide,
            sample_rate,
            center_frequency,
            config.nfft,
            config.noverlap,
            &mut planner,
        ),
        iq_scatter: constellation(samples, config.constellation_len),
    })
}

fn time_domain(samples: &[Complex32], sample_rate: f64, len: usize) -> TimeDomain {
    let head = &samples[..samples.len().min(len)];
    TimeDomain {
        time: (0..head.len()).map(|i| i as f64 / sample_rate).collect(),
        real: head.iter().map(|s| s.re).collect(),
        imag: head.iter().map(|s| s.im).collect(),
    }
}

fn frequency_spectrum(
    samples: &[Complex64],
    sample_rate: f64,
    planner: &mut FftPlanner<f64>,
) -> Spectrum {
    let mut buffer = samples.to_vec();
    planner.plan_fft_forward(buffer.len()).process(&mut buffer);

    let magnitude_db = stft::fftshift(&buffer)
        .iter()
        .map(|x| 20.0 * x.norm().max(MAGNITUDE_FLOOR).log10())
        .collect();

    Spectrum {
        frequencies: stft::shifted_frequencies(samples.len(), sample_rate),
        magnitude_db,
    }
}

fn constellation(samples: &[Complex32], len: usize) -> Constellation {
    let head = &samples[..samples.len().min(len)];
    Constellation {
        real: head.iter().map(|s| s.re).collect(),
        imag: head.iter().map(|s| s.im).collect(),
    }
}
