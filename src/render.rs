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

//! PNG rendering of spectrograms, scene matrices and constellations.
//!
//! Heatmaps put time on the vertical axis (first row at the top) and
//! frequency on the horizontal axis, like a waterfall display. Time-domain
//! and spectrum views are drawn as line plots scaled to their data.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use iq_analysis::spectral::{Constellation, Spectrum, TimeDomain};
use iq_analysis::{PowerMatrix, Spectrogram};

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const AXIS: Rgb<u8> = Rgb([64, 64, 64]);
const POINT: Rgb<u8> = Rgb([0, 255, 0]);
const I_TRACE: Rgb<u8> = Rgb([0, 160, 255]);
const Q_TRACE: Rgb<u8> = Rgb([255, 128, 0]);

/// Map a dB value to a color using a blue-cyan-green-yellow-red gradient.
pub fn db_to_color(db: f64, min_db: f64, max_db: f64) -> Rgb<u8> {
    let normalized = if max_db > min_db {
        ((db - min_db) / (max_db - min_db)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let stops: [(f64, (u8, u8, u8)); 5] = [
        (0.0, (0, 0, 128)),    // Dark blue (noise floor)
        (0.25, (0, 128, 255)), // Cyan
        (0.5, (0, 255, 0)),    // Green
        (0.75, (255, 255, 0)), // Yellow
        (1.0, (255, 0, 0)),    // Red (strong signal)
    ];

    for pair in stops.windows(2) {
        let (t1, (r1, g1, b1)) = pair[0];
        let (t2, (r2, g2, b2)) = pair[1];

        if normalized >= t1 && normalized <= t2 {
            // Linear interpolation
            let t = (normalized - t1) / (t2 - t1);
            return Rgb([lerp(r1, r2, t), lerp(g1, g2, t), lerp(b1, b2, t)]);
        }
    }

    // NaN lands here
    Rgb([0, 0, 128])
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "result lies between two u8 stops"
)]
fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + t * (f64::from(b) - f64::from(a))).round() as u8
}

/// Finite min/max of `values`, widened so the range is never empty.
fn auto_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    if max > min {
        (min, max)
    } else {
        (min, min + 1.0)
    }
}

fn to_dimension(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).with_context(|| format!("{what} of {n} is too large for an image"))
}

/// Render a row-major grid of dB values as a heatmap.
fn heatmap(
    rows: usize,
    cols: usize,
    value: impl Fn(usize, usize) -> f64,
    range: Option<(f64, f64)>,
) -> Result<RgbImage> {
    let width = to_dimension(cols, "width")?;
    let height = to_dimension(rows, "height")?;
    let (min_db, max_db) = range.unwrap_or_else(|| {
        auto_range(
            (0..rows)
                .flat_map(|r| (0..cols).map(move |c| (r, c)))
                .map(|(r, c)| value(r, c)),
        )
    });
    log::debug!("Rendering {cols}x{rows} heatmap over [{min_db:.1}, {max_db:.1}] dB");

    Ok(RgbImage::from_fn(width, height, |x, y| {
        db_to_color(value(y as usize, x as usize), min_db, max_db)
    }))
}

/// Spectrogram in dB, one row per segment.
pub fn spectrogram_image(spectrogram: &Spectrogram, range: Option<(f64, f64)>) -> Result<RgbImage> {
    let db = spectrogram.to_db();
    heatmap(
        spectrogram.num_times(),
        spectrogram.num_freqs(),
        |t, f| db[t][f],
        range,
    )
}

/// Synthetic scene matrix, whose cells are already in dB.
pub fn matrix_image(matrix: &PowerMatrix, range: Option<(f64, f64)>) -> Result<RgbImage> {
    heatmap(matrix.rows(), matrix.cols(), |r, c| matrix[(r, c)], range)
}

/// Square I/Q scatter plot scaled to the largest component.
pub fn constellation_image(points: &Constellation, size: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(size, size, BACKGROUND);
    if size == 0 {
        return img;
    }

    let mid = size / 2;
    for i in 0..size {
        img.put_pixel(i, mid, AXIS);
        img.put_pixel(mid, i, AXIS);
    }

    let extent = points
        .real
        .iter()
        .chain(points.imag.iter())
        .map(|v| f64::from(v.abs()))
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if extent == 0.0 {
        return img;
    }

    let half = f64::from(size - 1) / 2.0;
    for (&re, &im) in points.real.iter().zip(&points.imag) {
        let (re, im) = (f64::from(re), f64::from(im));
        if !re.is_finite() || !im.is_finite() {
            continue;
        }
        let x = half + re / extent * half;
        let y = half - im / extent * half;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "coordinates are within [0, size)"
        )]
        let (px, py) = (x.round() as u32, y.round() as u32);
        img.put_pixel(px, py, POINT);
    }
    img
}

/// Maps data coordinates onto a plot area of `width` x `height` pixels.
struct PlotArea {
    width: u32,
    height: u32,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl PlotArea {
    fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let right = f64::from(self.width - 1);
        let bottom = f64::from(self.height - 1);
        let px = (x - self.x_range.0) / (self.x_range.1 - self.x_range.0) * right;
        let py = bottom - (y - self.y_range.0) / (self.y_range.1 - self.y_range.0) * bottom;
        (px.clamp(0.0, right), py.clamp(0.0, bottom))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "endpoints are clamped to the image"
)]
fn draw_segment(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0);
    let n = steps as u32;
    for i in 0..=n {
        let t = f64::from(i) / steps;
        let x = from.0 + t * (to.0 - from.0);
        let y = from.1 + t * (to.1 - from.1);
        img.put_pixel(x.round() as u32, y.round() as u32, color);
    }
}

/// Line plot of one or more traces sharing an x axis.
fn line_plot(
    x: &[f64],
    traces: &[(&[f64], Rgb<u8>)],
    width: u32,
    height: u32,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    if width < 2 || height < 2 || x.is_empty() {
        return img;
    }

    let area = PlotArea {
        width,
        height,
        x_range: auto_range(x.iter().copied()),
        y_range: auto_range(traces.iter().flat_map(|(y, _)| y.iter().copied())),
    };

    if area.y_range.0 < 0.0 && area.y_range.1 > 0.0 {
        let (_, zero) = area.to_pixel(area.x_range.0, 0.0);
        draw_segment(&mut img, (0.0, zero), (f64::from(width - 1), zero), AXIS);
    }

    for &(y, color) in traces {
        let points: Vec<Option<(f64, f64)>> = x
            .iter()
            .zip(y)
            .map(|(&px, &py)| (px.is_finite() && py.is_finite()).then(|| area.to_pixel(px, py)))
            .collect();
        for pair in points.windows(2) {
            match (pair[0], pair[1]) {
                (Some(a), Some(b)) => draw_segment(&mut img, a, b, color),
                (Some(a), None) => draw_segment(&mut img, a, a, color),
                _ => {}
            }
        }
        if let Some(&Some(last)) = points.last() {
            draw_segment(&mut img, last, last, color);
        }
    }
    img
}

/// I (blue) and Q (orange) traces against sample time.
pub fn time_domain_image(view: &TimeDomain, width: u32, height: u32) -> RgbImage {
    let real: Vec<f64> = view.real.iter().map(|&v| f64::from(v)).collect();
    let imag: Vec<f64> = view.imag.iter().map(|&v| f64::from(v)).collect();
    line_plot(
        &view.time,
        &[(real.as_slice(), I_TRACE), (imag.as_slice(), Q_TRACE)],
        width,
        height,
    )
}

/// Magnitude in dB against baseband frequency.
pub fn spectrum_image(spectrum: &Spectrum, width: u32, height: u32) -> RgbImage {
    line_plot(
        &spectrum.frequencies,
        &[(spectrum.magnitude_db.as_slice(), POINT)],
        width,
        height,
    )
}

/// Write an image as PNG.
pub fn save_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {} ({}x{})", path.display(), img.width(), img.height());
    Ok(())
}
