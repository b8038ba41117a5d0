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

//! Complex baseband sample decoding and encoding.
//!
//! Raw recordings are interleaved I/Q pairs. The default layout is `cf32_le`
//! (two little-endian 32-bit floats per sample, the `.cfile` format written by
//! GNU Radio). Integer SigMF datatypes are scaled into `[-1, 1)`.
//!
//! Recordings can also travel as a two-column CSV with a `Real,Imaginary`
//! header, one sample per row.

use std::io::{Read, Write};
use std::str::FromStr;

use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for sample buffers that cannot be decoded or transformed.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("sample sequence is empty")]
    Empty,

    #[error("buffer of {len} bytes is not a whole number of {width}-byte samples")]
    TrailingBytes { len: usize, width: usize },

    #[error("unsupported sample datatype: {0}")]
    UnsupportedDatatype(String),

    #[error("invalid STFT window: nfft={nfft}, noverlap={noverlap}")]
    InvalidWindow { nfft: usize, noverlap: usize },
}

/// On-disk sample layout, named after the SigMF `core:datatype` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleFormat {
    /// Complex float32, little-endian
    #[default]
    Cf32Le,
    /// Complex float32, big-endian
    Cf32Be,
    /// Complex int16, little-endian
    Ci16Le,
    /// Complex int8
    Ci8,
    /// Complex unsigned int8 (RTL-SDR native)
    Cu8,
}

impl SampleFormat {
    /// Resolve the format from an optional `core:datatype` value.
    ///
    /// A missing datatype means `cf32_le`.
    pub fn from_datatype(datatype: Option<&str>) -> Result<Self, ShapeError> {
        datatype.map_or(Ok(Self::default()), |s| s.parse::<Self>())
    }

    /// Size of one complex sample in bytes.
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Cf32Le | Self::Cf32Be => 8,
            Self::Ci16Le => 4,
            Self::Ci8 | Self::Cu8 => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cf32Le => "cf32_le",
            Self::Cf32Be => "cf32_be",
            Self::Ci16Le => "ci16_le",
            Self::Ci8 => "ci8",
            Self::Cu8 => "cu8",
        }
    }
}

impl FromStr for SampleFormat {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cf32_le" | "cf32" => Ok(Self::Cf32Le),
            "cf32_be" => Ok(Self::Cf32Be),
            "ci16_le" | "ci16" => Ok(Self::Ci16Le),
            "ci8" => Ok(Self::Ci8),
            "cu8" => Ok(Self::Cu8),
            other => Err(ShapeError::UnsupportedDatatype(other.to_string())),
        }
    }
}

/// Decode an interleaved I/Q byte buffer.
pub fn decode(bytes: &[u8], format: SampleFormat) -> Result<Vec<Complex32>, ShapeError> {
    let width = format.bytes_per_sample();
    if bytes.len() % width != 0 {
        return Err(ShapeError::TrailingBytes {
            len: bytes.len(),
            width,
        });
    }

    let samples = bytes
        .chunks_exact(width)
        .map(|c| match format {
            SampleFormat::Cf32Le => Complex32::new(
                f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            ),
            SampleFormat::Cf32Be => Complex32::new(
                f32::from_be_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_be_bytes([c[4], c[5], c[6], c[7]]),
            ),
            SampleFormat::Ci16Le => Complex32::new(
                f32::from(i16::from_le_bytes([c[0], c[1]])) / 32768.0,
                f32::from(i16::from_le_bytes([c[2], c[3]])) / 32768.0,
            ),
            SampleFormat::Ci8 => Complex32::new(
                f32::from(i8::from_le_bytes([c[0]])) / 128.0,
                f32::from(i8::from_le_bytes([c[1]])) / 128.0,
            ),
            SampleFormat::Cu8 => Complex32::new(
                (f32::from(c[0]) - 127.5) / 128.0,
                (f32::from(c[1]) - 127.5) / 128.0,
            ),
        })
        .collect();

    Ok(samples)
}

/// Encode samples as interleaved little-endian float32 (`cf32_le`).
#[must_use]
pub fn encode_cf32_le(samples: &[Complex32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 8);
    for s in samples {
        out.extend_from_slice(&s.re.to_le_bytes());
        out.extend_from_slice(&s.im.to_le_bytes());
    }
    out
}

#[derive(Debug, Serialize, Deserialize)]
struct IqRow {
    #[serde(rename = "Real")]
    real: f32,
    #[serde(rename = "Imaginary")]
    imaginary: f32,
}

/// Read samples from a `Real,Imaginary` CSV.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Complex32>, csv::Error> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize()
        .map(|row| row.map(|r: IqRow| Complex32::new(r.real, r.imaginary)))
        .collect()
}

/// Write samples as a `Real,Imaginary` CSV.
pub fn write_csv<W: Write>(writer: W, samples: &[Complex32]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for s in samples {
        csv_writer.serialize(IqRow {
            real: s.re,
            imaginary: s.im,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Generate a sum of unit-amplitude complex tones.
///
/// Useful for exercising the pipeline when no real recording is at hand.
/// `tone_frequencies` are baseband offsets in Hz.
#[must_use]
#[allow(clippy::cast_possible_truncation, reason = "samples are stored as f32")]
pub fn tones(sample_rate: f64, num_samples: usize, tone_frequencies: &[f64]) -> Vec<Complex32> {
    use std::f64::consts::PI;

    if tone_frequencies.is_empty() {
        return vec![Complex32::new(0.0, 0.0); num_samples];
    }

    let scale = 1.0 / tone_frequencies.len() as f64;

    (0..num_samples)
        .map(|n| {
            let t = n as f64 / sample_rate;
            let (mut i_sample, mut q_sample) = (0.0, 0.0);
            for &freq in tone_frequencies {
                let phase = 2.0 * PI * freq * t;
                i_sample += phase.cos();
                q_sample += phase.sin();
            }
            Complex32::new((i_sample * scale) as f32, (q_sample * scale) as f32)
        })
        .collect()
}
