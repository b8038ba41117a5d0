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

//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use iq_analysis::{PlacementMethod, ScenarioParams};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "iqscope")]
#[command(author, version, about = "IQ recording analysis and synthetic RF scene generation", long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract time, frequency, spectrogram and constellation views from a recording
    Extract(ExtractArgs),

    /// Print a recording's metadata summary as JSON
    Metadata {
        /// Metadata file (.sigmf-meta, optionally .gz)
        meta: PathBuf,
    },

    /// Generate a synthetic scene of transmitter bursts over a noise floor
    Generate(GenerateArgs),

    /// Write a multi-tone test recording with matching metadata
    Tone(ToneArgs),

    /// Show or reset the configuration file
    Config {
        /// Print the configuration file location
        #[arg(long)]
        path: bool,

        /// Overwrite the configuration with defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Data file: raw samples, .csv (Real,Imaginary) or 16-bit stereo .wav; .gz allowed
    pub data: PathBuf,

    /// Metadata file (defaults to the .sigmf-meta next to the data file)
    #[arg(short, long)]
    pub meta: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Spectrogram segment length
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Samples shared by consecutive segments
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Lower end of the rendered dB range
    #[arg(long, allow_negative_numbers = true)]
    pub min_db: Option<f64>,

    /// Upper end of the rendered dB range
    #[arg(long, allow_negative_numbers = true)]
    pub max_db: Option<f64>,

    /// Skip the SHA-512 check even if the metadata has one
    #[arg(long)]
    pub no_verify: bool,
}

impl ExtractArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(out) = &self.out {
            config.output_dir.clone_from(out);
        }
        if let Some(n) = self.fft_size {
            config.fft_size = n;
        }
        if let Some(n) = self.overlap {
            config.fft_overlap = n;
        }
        if self.min_db.is_some() {
            config.render_min_db = self.min_db;
        }
        if self.max_db.is_some() {
            config.render_max_db = self.max_db;
        }
        if self.no_verify {
            config.verify_checksums = false;
        }
    }
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Time rows
    #[arg(long)]
    pub rows: Option<usize>,

    /// Frequency bins
    #[arg(long)]
    pub cols: Option<usize>,

    /// Number of transmitter bursts
    #[arg(short = 'n', long)]
    pub transmitters: Option<usize>,

    /// Mean burst power
    #[arg(long, allow_negative_numbers = true)]
    pub tx_mean: Option<f64>,

    /// Burst power standard deviation
    #[arg(long)]
    pub tx_sd: Option<f64>,

    /// Mean noise floor
    #[arg(long, allow_negative_numbers = true)]
    pub noise_mean: Option<f64>,

    /// Noise standard deviation
    #[arg(long)]
    pub noise_sd: Option<f64>,

    /// Burst width in frequency bins
    #[arg(long)]
    pub bandwidth: Option<usize>,

    /// Burst length in rows
    #[arg(long)]
    pub active_time: Option<usize>,

    /// Placement method (random, equally_spaced)
    #[arg(long)]
    pub placement: Option<PlacementMethod>,

    /// Draw limit per transmitter for random placement
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// RNG seed for a reproducible scene
    #[arg(long)]
    pub seed: Option<u64>,

    /// Base name of the output files (default: timestamped)
    #[arg(long)]
    pub name: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl GenerateArgs {
    /// Apply command-line overrides to the configured scenario.
    pub fn apply(&self, params: &mut ScenarioParams) {
        if let Some(v) = self.rows {
            params.rows = v;
        }
        if let Some(v) = self.cols {
            params.cols = v;
        }
        if let Some(v) = self.transmitters {
            params.num_transmitters = v;
        }
        if let Some(v) = self.tx_mean {
            params.transmitter_mean = v;
        }
        if let Some(v) = self.tx_sd {
            params.transmitter_sd = v;
        }
        if let Some(v) = self.noise_mean {
            params.noise_mean = v;
        }
        if let Some(v) = self.noise_sd {
            params.noise_sd = v;
        }
        if let Some(v) = self.bandwidth {
            params.bandwidth = v;
        }
        if let Some(v) = self.active_time {
            params.active_time = v;
        }
        if let Some(v) = self.placement {
            params.placement_method = v;
        }
        if let Some(v) = self.max_attempts {
            params.max_placement_attempts = v;
        }
    }
}

#[derive(Debug, Args)]
pub struct ToneArgs {
    /// Output base path; writes <base>.sigmf-data and <base>.sigmf-meta
    pub output: PathBuf,

    /// Sample rate in Hz
    #[arg(long, default_value = "1000000")]
    pub sample_rate: f64,

    /// Center frequency in Hz
    #[arg(long, default_value = "100000000")]
    pub center_frequency: f64,

    /// Number of samples
    #[arg(long, default_value = "65536")]
    pub samples: usize,

    /// Baseband tone offsets in Hz, comma separated
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true, default_value = "100000")]
    pub tones: Vec<f64>,

    /// Annotation bandwidth around each tone in Hz
    #[arg(long, default_value = "10000")]
    pub tone_bandwidth: f64,
}
