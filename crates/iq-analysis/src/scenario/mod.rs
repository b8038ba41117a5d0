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

//! Synthetic RF scene generation.
//!
//! A scene is a `rows × cols` power matrix (time × frequency bin) with a
//! Gaussian noise floor and rectangular transmitter bursts added on top.
//! Every burst is centered on the middle frequency column; the placement
//! method only decides when each transmitter is active.
//!
//! Randomness is supplied by the caller, so a seeded generator reproduces a
//! scene exactly:
//!
//! ```
//! use iq_analysis::scenario::{synthesize, ScenarioParams};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let params = ScenarioParams { rows: 200, cols: 256, bandwidth: 32, ..Default::default() };
//! let scene = synthesize(&params, &mut StdRng::seed_from_u64(1)).unwrap();
//! assert_eq!(scene.matrix.rows(), 200);
//! assert_eq!(scene.transmitters.len(), params.num_transmitters);
//! ```

mod matrix;
mod placement;

pub use matrix::{MatrixCsvError, PowerMatrix};

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected synthesis parameters.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidParameterError {
    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },

    #[error("{name} ({value}) must not exceed {limit_name} ({limit})")]
    ExceedsLimit {
        name: &'static str,
        value: usize,
        limit_name: &'static str,
        limit: usize,
    },

    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("unknown placement method '{0}' (expected 'random' or 'equally_spaced')")]
    UnknownPlacement(String),

    #[error("{num_transmitters} transmitters of {active_time} rows cannot fit without overlap in {rows} rows")]
    Infeasible {
        num_transmitters: usize,
        active_time: usize,
        rows: usize,
    },

    #[error("could not place transmitter {index} without overlap after {attempts} attempts")]
    PlacementExhausted { index: usize, attempts: usize },

    #[error("invalid distribution for {name}: {reason}")]
    Distribution { name: &'static str, reason: String },
}

/// How transmitter bursts are positioned in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMethod {
    /// Uniform random start rows, no two bursts overlapping
    Random,
    /// One burst in the upper part of the span, the rest at a fixed gap
    #[default]
    EquallySpaced,
}

impl PlacementMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::EquallySpaced => "equally_spaced",
        }
    }
}

impl fmt::Display for PlacementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementMethod {
    type Err = InvalidParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "equally_spaced" => Ok(Self::EquallySpaced),
            other => Err(InvalidParameterError::UnknownPlacement(other.to_string())),
        }
    }
}

/// Inputs to [`synthesize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    /// Time rows
    pub rows: usize,
    /// Frequency bins
    pub cols: usize,
    pub num_transmitters: usize,
    /// Mean power added inside each burst
    pub transmitter_mean: f64,
    pub transmitter_sd: f64,
    /// Mean of the noise floor
    pub noise_mean: f64,
    pub noise_sd: f64,
    /// Burst width in frequency bins
    pub bandwidth: usize,
    /// Burst length in rows
    pub active_time: usize,
    pub placement_method: PlacementMethod,
    /// Draw limit per transmitter for [`PlacementMethod::Random`]
    pub max_placement_attempts: usize,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            rows: 1000,
            cols: 1024,
            num_transmitters: 5,
            transmitter_mean: -75.0,
            transmitter_sd: 2.0,
            noise_mean: -109.0,
            noise_sd: 10.0,
            bandwidth: 200,
            active_time: 10,
            placement_method: PlacementMethod::EquallySpaced,
            max_placement_attempts: 10_000,
        }
    }
}

impl ScenarioParams {
    /// Check every precondition of [`synthesize`].
    pub fn validate(&self) -> Result<(), InvalidParameterError> {
        for (name, value) in [
            ("rows", self.rows),
            ("cols", self.cols),
            ("num_transmitters", self.num_transmitters),
            ("bandwidth", self.bandwidth),
            ("active_time", self.active_time),
            ("max_placement_attempts", self.max_placement_attempts),
        ] {
            if value < 1 {
                return Err(InvalidParameterError::TooSmall { name, min: 1, value });
            }
        }

        if self.active_time > self.rows {
            return Err(InvalidParameterError::ExceedsLimit {
                name: "active_time",
                value: self.active_time,
                limit_name: "rows",
                limit: self.rows,
            });
        }
        if self.bandwidth > self.cols {
            return Err(InvalidParameterError::ExceedsLimit {
                name: "bandwidth",
                value: self.bandwidth,
                limit_name: "cols",
                limit: self.cols,
            });
        }

        for (name, value) in [
            ("transmitter_mean", self.transmitter_mean),
            ("transmitter_sd", self.transmitter_sd),
            ("noise_mean", self.noise_mean),
            ("noise_sd", self.noise_sd),
        ] {
            if !value.is_finite() {
                return Err(InvalidParameterError::NotFinite { name, value });
            }
        }
        for (name, value) in [
            ("transmitter_sd", self.transmitter_sd),
            ("noise_sd", self.noise_sd),
        ] {
            if value < 0.0 {
                return Err(InvalidParameterError::Negative { name, value });
            }
        }

        if self.placement_method == PlacementMethod::Random
            && self.num_transmitters > self.rows / self.active_time
        {
            return Err(InvalidParameterError::Infeasible {
                num_transmitters: self.num_transmitters,
                active_time: self.active_time,
                rows: self.rows,
            });
        }

        Ok(())
    }

    /// First frequency column shared by every burst.
    #[must_use]
    pub fn start_freq(&self) -> usize {
        self.cols / 2 - self.bandwidth / 2
    }
}

/// One placed burst, covering rows `[start_time, end_time)` and columns `[start_freq, end_freq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transmitter {
    pub id: usize,
    pub start_time: usize,
    pub start_freq: usize,
    pub active_time: usize,
    pub bandwidth: usize,
}

impl Transmitter {
    #[must_use]
    pub fn end_time(&self) -> usize {
        self.start_time + self.active_time
    }

    #[must_use]
    pub fn end_freq(&self) -> usize {
        self.start_freq + self.bandwidth
    }

    /// True when the two bursts share any cell.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_time < other.end_time()
            && self.end_time() > other.start_time
            && self.start_freq < other.end_freq()
            && self.end_freq() > other.start_freq
    }

    /// True when `(row, col)` lies inside the burst.
    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.start_time..self.end_time()).contains(&row)
            && (self.start_freq..self.end_freq()).contains(&col)
    }
}

#[derive(Debug, Serialize)]
struct TransmitterRow {
    id: usize,
    start_time: usize,
    end_time: usize,
    start_freq: usize,
    end_freq: usize,
}

/// Generated power matrix with the bursts that were injected into it.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    pub matrix: PowerMatrix,
    pub transmitters: Vec<Transmitter>,
}

impl SyntheticScene {
    /// Write the matrix as row-major CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        self.matrix.write_csv(writer)
    }

    /// Write one row per transmitter: `id,start_time,end_time,start_freq,end_freq`.
    pub fn write_transmitters_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for tx in &self.transmitters {
            csv_writer.serialize(TransmitterRow {
                id: tx.id,
                start_time: tx.start_time,
                end_time: tx.end_time(),
                start_freq: tx.start_freq,
                end_freq: tx.end_freq(),
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Generate a scene.
///
/// Steps: fill every cell from `Normal(noise_mean, noise_sd)`, place the
/// transmitters, then add an independent `Normal(transmitter_mean,
/// transmitter_sd)` draw to every in-bounds cell of every burst. Cells of an
/// equally spaced layout that fall past the last row are dropped.
pub fn synthesize<R: Rng + ?Sized>(
    params: &ScenarioParams,
    rng: &mut R,
) -> Result<SyntheticScene, InvalidParameterError> {
    params.validate()?;

    let noise = Normal::new(params.noise_mean, params.noise_sd).map_err(|e| {
        InvalidParameterError::Distribution {
            name: "noise_sd",
            reason: e.to_string(),
        }
    })?;
    let burst = Normal::new(params.transmitter_mean, params.transmitter_sd).map_err(|e| {
        InvalidParameterError::Distribution {
            name: "transmitter_sd",
            reason: e.to_string(),
        }
    })?;

    log::info!(
        "Synthesizing {}x{} scene with {} transmitters ({})",
        params.rows,
        params.cols,
        params.num_transmitters,
        params.placement_method
    );

    let mut matrix = PowerMatrix::from_fn(params.rows, params.cols, |_, _| noise.sample(rng));

    let starts = match params.placement_method {
        PlacementMethod::Random => placement::random(
            params.rows,
            params.active_time,
            params.num_transmitters,
            params.max_placement_attempts,
            rng,
        )?,
        PlacementMethod::EquallySpaced => placement::equally_spaced(
            params.rows,
            params.active_time,
            params.num_transmitters,
            rng,
        ),
    };

    let start_freq = params.start_freq();
    let transmitters: Vec<Transmitter> = starts
        .into_iter()
        .enumerate()
        .map(|(id, start_time)| Transmitter {
            id,
            start_time,
            start_freq,
            active_time: params.active_time,
            bandwidth: params.bandwidth,
        })
        .collect();

    for tx in &transmitters {
        for row in tx.start_time..tx.end_time() {
            for col in tx.start_freq..tx.end_freq() {
                if let Some(cell) = matrix.get_mut(row, col) {
                    *cell += burst.sample(rng);
                }
            }
        }
        log::debug!(
            "Transmitter {}: rows {}..{}, cols {}..{}",
            tx.id,
            tx.start_time,
            tx.end_time(),
            tx.start_freq,
            tx.end_freq()
        );
    }

    Ok(SyntheticScene {
        matrix,
        transmitters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn degenerate(placement_method: PlacementMethod) -> ScenarioParams {
        ScenarioParams {
            rows: 50,
            cols: 50,
            num_transmitters: 1,
            transmitter_mean: 10.0,
            transmitter_sd: 0.0,
            noise_mean: 0.0,
            noise_sd: 0.0,
            bandwidth: 5,
            active_time: 5,
            placement_method,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_variance_scene_is_exact() {
        for seed in 0..20 {
            let scene = synthesize(
                &degenerate(PlacementMethod::Random),
                &mut StdRng::seed_from_u64(seed),
            )
            .unwrap();
            let tx = scene.transmitters[0];
            assert_eq!(tx.start_freq, 23);
            assert!(tx.end_time() <= 50);

            for r in 0..50 {
                for c in 0..50 {
                    let expected = if tx.contains(r, c) { 10.0 } else { 0.0 };
                    assert_eq!(scene.matrix[(r, c)], expected, "seed {seed} cell ({r}, {c})");
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_scene() {
        let params = ScenarioParams {
            rows: 120,
            cols: 64,
            bandwidth: 16,
            placement_method: PlacementMethod::Random,
            ..Default::default()
        };
        let a = synthesize(&params, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = synthesize(&params, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_scene_transmitters_disjoint() {
        let params = ScenarioParams {
            rows: 100,
            cols: 32,
            num_transmitters: 3,
            bandwidth: 8,
            active_time: 10,
            placement_method: PlacementMethod::Random,
            ..Default::default()
        };
        for seed in 0..50 {
            let scene = synthesize(&params, &mut StdRng::seed_from_u64(seed)).unwrap();
            for (i, a) in scene.transmitters.iter().enumerate() {
                for b in &scene.transmitters[i + 1..] {
                    assert!(!a.overlaps(b));
                }
            }
        }
    }

    #[test]
    fn test_all_transmitters_share_center_columns() {
        let params = ScenarioParams {
            rows: 300,
            cols: 101,
            num_transmitters: 4,
            bandwidth: 21,
            active_time: 20,
            ..Default::default()
        };
        let scene = synthesize(&params, &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(scene.transmitters.iter().all(|tx| tx.start_freq == 40 && tx.end_freq() == 61));
    }

    #[test]
    fn test_burst_statistics() {
        let params = ScenarioParams {
            rows: 200,
            cols: 200,
            num_transmitters: 1,
            transmitter_mean: 10.0,
            transmitter_sd: 2.0,
            noise_mean: 0.0,
            noise_sd: 0.0,
            bandwidth: 100,
            active_time: 100,
            placement_method: PlacementMethod::Random,
            ..Default::default()
        };
        let scene = synthesize(&params, &mut StdRng::seed_from_u64(11)).unwrap();
        let tx = scene.transmitters[0];

        let values: Vec<f64> = (tx.start_time..tx.end_time())
            .flat_map(|r| (tx.start_freq..tx.end_freq()).map(move |c| (r, c)))
            .map(|(r, c)| scene.matrix[(r, c)])
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

        assert!((mean - 10.0).abs() < 0.2);
        assert!((var.sqrt() - 2.0).abs() < 0.2);
    }

    #[test]
    fn test_equally_spaced_overrun_is_clipped() {
        let params = ScenarioParams {
            rows: 50,
            cols: 10,
            num_transmitters: 30,
            transmitter_mean: 1.0,
            transmitter_sd: 0.0,
            noise_mean: 0.0,
            noise_sd: 0.0,
            bandwidth: 2,
            active_time: 10,
            placement_method: PlacementMethod::EquallySpaced,
            ..Default::default()
        };
        let scene = synthesize(&params, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(scene.transmitters.len(), 30);
        assert_eq!(scene.matrix.rows(), 50);
        // columns outside the burst band are untouched
        assert!((0..50).all(|r| scene.matrix[(r, 0)] == 0.0));
    }

    #[test]
    fn test_matrix_csv_round_trip() {
        let params = ScenarioParams {
            rows: 30,
            cols: 40,
            num_transmitters: 2,
            bandwidth: 10,
            active_time: 5,
            ..Default::default()
        };
        let scene = synthesize(&params, &mut StdRng::seed_from_u64(21)).unwrap();

        let mut buf = Vec::new();
        scene.write_csv(&mut buf).unwrap();
        let parsed = PowerMatrix::read_csv(buf.as_slice()).unwrap();

        assert_eq!(parsed.rows(), 30);
        assert_eq!(parsed.cols(), 40);
        for (a, b) in scene.matrix.as_slice().iter().zip(parsed.as_slice()) {
            assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
        }
    }

    #[test]
    fn test_transmitters_csv() {
        let scene = synthesize(
            &degenerate(PlacementMethod::EquallySpaced),
            &mut StdRng::seed_from_u64(4),
        )
        .unwrap();
        let tx = scene.transmitters[0];

        let mut buf = Vec::new();
        scene.write_transmitters_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "id,start_time,end_time,start_freq,end_freq");
        assert_eq!(
            lines[1],
            format!("0,{},{},23,28", tx.start_time, tx.start_time + 5)
        );
    }

    #[test]
    fn test_validation_errors() {
        let base = degenerate(PlacementMethod::Random);

        let err = ScenarioParams { rows: 0, ..base.clone() }.validate().unwrap_err();
        assert_eq!(err, InvalidParameterError::TooSmall { name: "rows", min: 1, value: 0 });

        let err = ScenarioParams { active_time: 51, ..base.clone() }.validate().unwrap_err();
        assert!(matches!(err, InvalidParameterError::ExceedsLimit { name: "active_time", .. }));

        let err = ScenarioParams { bandwidth: 51, ..base.clone() }.validate().unwrap_err();
        assert!(matches!(err, InvalidParameterError::ExceedsLimit { name: "bandwidth", .. }));

        let err = ScenarioParams { noise_sd: -1.0, ..base.clone() }.validate().unwrap_err();
        assert!(matches!(err, InvalidParameterError::Negative { name: "noise_sd", .. }));

        let err = ScenarioParams { transmitter_mean: f64::NAN, ..base.clone() }
            .validate()
            .unwrap_err();
        assert!(matches!(err, InvalidParameterError::NotFinite { name: "transmitter_mean", .. }));

        let err = ScenarioParams { num_transmitters: 11, active_time: 5, ..base.clone() }
            .validate()
            .unwrap_err();
        assert!(matches!(err, InvalidParameterError::Infeasible { .. }));

        // the same count is allowed for equally spaced layouts, which clip instead
        assert!(ScenarioParams {
            num_transmitters: 11,
            placement_method: PlacementMethod::EquallySpaced,
            ..base
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_synthesize_rejects_invalid_params() {
        let params = ScenarioParams { cols: 0, ..Default::default() };
        let err = synthesize(&params, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, InvalidParameterError::TooSmall { name: "cols", .. }));
    }

    #[test]
    fn test_placement_method_parsing() {
        assert_eq!("random".parse::<PlacementMethod>().unwrap(), PlacementMethod::Random);
        assert_eq!(
            "equally_spaced".parse::<PlacementMethod>().unwrap(),
            PlacementMethod::EquallySpaced
        );
        assert_eq!(
            "spiral".parse::<PlacementMethod>().unwrap_err(),
            InvalidParameterError::UnknownPlacement("spiral".to_string())
        );
        assert_eq!(PlacementMethod::EquallySpaced.to_string(), "equally_spaced");
    }

    #[test]
    fn test_default_params_match_generator_form() {
        let params = ScenarioParams::default();
        assert_eq!((params.rows, params.cols), (1000, 1024));
        assert_eq!(params.num_transmitters, 5);
        assert_eq!(params.placement_method, PlacementMethod::EquallySpaced);
        assert!(params.validate().is_ok());
    }
}
