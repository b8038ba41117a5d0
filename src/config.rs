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

//! Application configuration management.
//!
//! Persistent settings are stored as TOML through `confy`. Every field has a
//! serde default, so an older or partial file still loads; command-line flags
//! override whatever the file says.

use std::path::PathBuf;

use iq_analysis::{ScenarioParams, SpectralConfig};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "iqscope";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Directory that receives exported CSV, JSON and PNG files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// STFT segment length for spectrograms
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,

    /// Samples shared by consecutive STFT segments
    #[serde(default = "default_fft_overlap")]
    pub fft_overlap: usize,

    /// Samples kept for the time-domain view
    #[serde(default = "default_time_domain_samples")]
    pub time_domain_samples: usize,

    /// Samples kept for the constellation view
    #[serde(default = "default_constellation_samples")]
    pub constellation_samples: usize,

    /// Lower end of the rendered dB range (auto when unset)
    #[serde(default)]
    pub render_min_db: Option<f64>,

    /// Upper end of the rendered dB range (auto when unset)
    #[serde(default)]
    pub render_max_db: Option<f64>,

    /// Check `core:sha512` against the data file when present
    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    /// Fixed RNG seed for reproducible scenes
    #[serde(default)]
    pub seed: Option<u64>,

    /// Defaults for `generate`
    #[serde(default)]
    pub scenario: ScenarioParams,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("iqscope-output")
}

fn default_fft_size() -> usize {
    256
}

fn default_fft_overlap() -> usize {
    128
}

fn default_time_domain_samples() -> usize {
    1000
}

fn default_constellation_samples() -> usize {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            output_dir: default_output_dir(),
            fft_size: default_fft_size(),
            fft_overlap: default_fft_overlap(),
            time_domain_samples: default_time_domain_samples(),
            constellation_samples: default_constellation_samples(),
            render_min_db: None,
            render_max_db: None,
            verify_checksums: true,
            seed: None,
            scenario: ScenarioParams::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        let config: AppConfig = confy::load(APP_NAME, CONFIG_NAME)?;
        log::debug!("Loaded configuration version {}", config.config_version);
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Spectral settings for the feature pipeline
    pub fn spectral_config(&self) -> SpectralConfig {
        SpectralConfig {
            nfft: self.fft_size,
            noverlap: self.fft_overlap,
            time_domain_len: self.time_domain_samples,
            constellation_len: self.constellation_samples,
        }
    }

    /// Fixed dB range for rendering, if both ends are configured
    pub fn render_range(&self) -> Option<(f64, f64)> {
        self.render_min_db.zip(self.render_max_db)
    }
}
