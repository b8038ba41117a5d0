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

//! Short-time Fourier transform power spectral density.
//!
//! Segments of `nfft` samples overlapping by `noverlap` are Hann-windowed and
//! transformed. For complex input the result is two-sided and reordered so the
//! zero-frequency bin sits in the middle of each row.

use std::f64::consts::PI;
use std::io::Write;

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Smallest power used before taking a logarithm.
pub const POWER_FLOOR: f64 = 1e-20;

/// Time-frequency power matrix with its axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// Linear power spectral density, indexed `pxx[time_bin][freq_bin]`.
    pub pxx: Vec<Vec<f64>>,
    /// Frequency of each column in Hz, including the center frequency offset.
    pub freqs: Vec<f64>,
    /// Time of each row in seconds (segment midpoints).
    pub bins: Vec<f64>,
}

impl Spectrogram {
    #[must_use]
    pub fn num_times(&self) -> usize {
        self.pxx.len()
    }

    #[must_use]
    pub fn num_freqs(&self) -> usize {
        self.freqs.len()
    }

    /// Power in decibels (`10·log10`), for rendering.
    #[must_use]
    pub fn to_db(&self) -> Vec<Vec<f64>> {
        self.pxx
            .iter()
            .map(|row| row.iter().map(|&p| 10.0 * p.max(POWER_FLOOR).log10()).collect())
            .collect()
    }

    /// Write the linear matrix as CSV: `time_s` then one column per frequency.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.freqs.len() + 1);
        header.push("time_s".to_string());
        header.extend(self.freqs.iter().map(ToString::to_string));
        csv_writer.write_record(&header)?;

        for (t, row) in self.bins.iter().zip(&self.pxx) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(t.to_string());
            record.extend(row.iter().map(ToString::to_string));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Symmetric Hann window of `size` points.
pub(crate) fn hann(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Rotate a spectrum so the zero-frequency bin is centered.
pub(crate) fn fftshift<T: Copy>(values: &[T]) -> Vec<T> {
    let mut shifted = values.to_vec();
    shifted.rotate_right(values.len() / 2);
    shifted
}

/// Bin frequencies matching [`fftshift`] ordering, spacing `sample_rate / n`.
pub(crate) fn shifted_frequencies(n: usize, sample_rate: f64) -> Vec<f64> {
    let half = (n / 2) as f64;
    let n_f = n as f64;
    (0..n)
        .map(|i| (i as f64 - half) * sample_rate / n_f)
        .collect()
}

/// Compute the PSD spectrogram of `samples`.
///
/// Input shorter than `nfft` is zero-padded to a single segment. Callers
/// guarantee `samples` is non-empty and `noverlap < nfft`.
pub(crate) fn compute(
    samples: &[Complex64],
    sample_rate: f64,
    center_frequency: f64,
    nfft: usize,
    noverlap: usize,
    planner: &mut FftPlanner<f64>,
) -> Spectrogram {
    let mut padded;
    let input = if samples.len() < nfft {
        padded = samples.to_vec();
        padded.resize(nfft, Complex64::new(0.0, 0.0));
        padded.as_slice()
    } else {
        samples
    };

    let step = nfft - noverlap;
    let num_segments = (input.len() - noverlap) / step;

    let window = hann(nfft);
    let scale = 1.0 / (sample_rate * window.iter().map(|w| w * w).sum::<f64>());
    let fft = planner.plan_fft_forward(nfft);

    let mut buffer = vec![Complex64::new(0.0, 0.0); nfft];
    let mut pxx = Vec::with_capacity(num_segments);
    let mut bins = Vec::with_capacity(num_segments);

    for segment in 0..num_segments {
        let start = segment * step;
        for ((slot, &x), &w) in buffer.iter_mut().zip(&input[start..start + nfft]).zip(&window) {
            *slot = x * w;
        }
        fft.process(&mut buffer);

        let power: Vec<f64> = buffer.iter().map(|x| x.norm_sqr() * scale).collect();
        pxx.push(fftshift(&power));
        bins.push((start as f64 + nfft as f64 / 2.0) / sample_rate);
    }

    let freqs = shifted_frequencies(nfft, sample_rate)
        .into_iter()
        .map(|f| f + center_frequency)
        .collect();

    log::debug!(
        "Spectrogram: {num_segments} segments x {nfft} bins (step {step})"
    );

    Spectrogram { pxx, freqs, bins }
}
