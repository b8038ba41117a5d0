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

//! iqscope command-line front end.
//!
//! - `extract`: recording -> CSV feature views and time, spectrum, spectrogram
//!   and constellation PNGs
//! - `metadata`: print the derived metadata summary
//! - `generate`: synthetic scene -> matrix CSV, transmitter table, heatmap PNG
//! - `tone`: write a multi-tone test recording
//! - `config`: show or reset the configuration file

mod cli;
mod config;
mod export;
mod input;
mod render;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use iq_analysis::samples;
use iq_analysis::Annotation;
use rand::rngs::StdRng;
use rand::SeedableRng;

use cli::{Cli, Commands, ExtractArgs, GenerateArgs, ToneArgs};
use config::AppConfig;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Extract(args) => cmd_extract(&args, load_config()?),
        Commands::Metadata { meta } => cmd_metadata(&meta),
        Commands::Generate(args) => cmd_generate(&args, &load_config()?),
        Commands::Tone(args) => cmd_tone(&args),
        Commands::Config { path, reset } => cmd_config(path, reset),
    }
}

fn load_config() -> Result<AppConfig> {
    AppConfig::load().context("Failed to load configuration (try `iqscope config --reset`)")
}

fn cmd_extract(args: &ExtractArgs, mut config: AppConfig) -> Result<()> {
    args.apply(&mut config);

    let meta_path = args
        .meta
        .clone()
        .unwrap_or_else(|| input::sibling_metadata_path(&args.data));
    let metadata = input::load_metadata(&meta_path)?;
    let iq = input::load_samples(&args.data, &metadata, config.verify_checksums)?;

    let features = iq_analysis::extract_with(&iq, &metadata, &config.spectral_config())
        .context("Feature extraction failed")?;
    log::info!(
        "Spectrogram: {} segments x {} bins",
        features.spectrogram.num_times(),
        features.spectrogram.num_freqs()
    );
    if let Some((freq, db)) = features.frequency_spectrum.peak() {
        log::info!("Spectrum peak: {db:.1} dB at {freq:.1} Hz offset");
    }

    let base = export::base_name(&args.data);
    let written = export::write_features(
        &config.output_dir,
        &base,
        &iq,
        &metadata,
        &features,
        config.render_range(),
    )?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_metadata(meta: &std::path::Path) -> Result<()> {
    let metadata = input::load_metadata(meta)?;
    let summary = serde_json::to_string_pretty(&metadata.summary())
        .context("Failed to serialize metadata summary")?;
    println!("{summary}");
    Ok(())
}

fn cmd_generate(args: &GenerateArgs, config: &AppConfig) -> Result<()> {
    let mut params = config.scenario.clone();
    args.apply(&mut params);

    let seed = args.seed.or(config.seed);
    let mut rng = match seed {
        Some(seed) => {
            log::info!("Using RNG seed {seed}");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let scene = iq_analysis::synthesize(&params, &mut rng).context("Scene generation failed")?;
    log::info!(
        "Placed {} transmitters ({} placement)",
        scene.transmitters.len(),
        params.placement_method
    );

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| export::scene_name(Local::now()));
    let out_dir = args.out.as_ref().unwrap_or(&config.output_dir);
    let written = export::write_scene(out_dir, &name, &scene, config.render_range())?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_tone(args: &ToneArgs) -> Result<()> {
    let iq = samples::tones(args.sample_rate, args.samples, &args.tones);
    let half_bw = args.tone_bandwidth / 2.0;
    let annotations: Vec<Annotation> = args
        .tones
        .iter()
        .map(|&offset| Annotation {
            start_sample: 0,
            sample_count: args.samples as u64,
            freq_lower_edge: Some(args.center_frequency + offset - half_bw),
            freq_upper_edge: Some(args.center_frequency + offset + half_bw),
            label: Some("tone".to_string()),
            comment: Some(format!("{offset} Hz offset")),
        })
        .collect();

    let description = format!("{} tone test recording", args.tones.len());
    let (data_path, meta_path) = export::write_sigmf(
        &args.output,
        &iq,
        &export::SigmfCapture {
            sample_rate: args.sample_rate,
            center_frequency: args.center_frequency,
            datetime: Utc::now(),
            description: &description,
            annotations: &annotations,
        },
    )?;
    println!("{}", data_path.display());
    println!("{}", meta_path.display());
    Ok(())
}

fn cmd_config(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        AppConfig::default()
            .save()
            .context("Failed to write default configuration")?;
        log::info!("Configuration reset to defaults");
    }

    let path = AppConfig::get_config_path().context("Failed to locate configuration file")?;
    if show_path {
        println!("{}", path.display());
        return Ok(());
    }

    let config = load_config()?;
    let text = serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
    println!("# {}", path.display());
    println!("{text}");
    Ok(())
}
