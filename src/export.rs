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

//! Writing analysis results to an output directory.
//!
//! Every artifact of one recording shares a base name, e.g. `capture.csv`,
//! `capture_spectrogram.png`, `capture_metadata.json`.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use iq_analysis::samples;
use iq_analysis::{Annotation, FeatureSet, Metadata, SyntheticScene};
use num_complex::Complex32;
use serde_json::{json, Map, Value};

use crate::render;

/// Edge length of the constellation PNG.
const CONSTELLATION_SIZE: u32 = 512;

/// Size of the time-domain and spectrum line plots.
const LINE_PLOT_SIZE: (u32, u32) = (1000, 400);

/// Base name shared by a recording's artifacts.
///
/// `capture.sigmf-data.gz` and `capture.wav` both become `capture`.
pub fn base_name(data_path: &Path) -> String {
    let name = data_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let stem = match name.strip_suffix(".sigmf-data") {
        Some(stem) => stem,
        None => Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name),
    };
    if stem.is_empty() {
        "recording".to_string()
    } else {
        stem.to_string()
    }
}

/// Timestamped default name for a generated scene.
pub fn scene_name(now: DateTime<Local>) -> String {
    format!("scene_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Create the output directory if needed.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write every feature view of a recording plus its metadata summary.
///
/// Returns the paths written, in order.
pub fn write_features(
    dir: &Path,
    base: &str,
    samples_in: &[Complex32],
    metadata: &Metadata,
    features: &FeatureSet,
    db_range: Option<(f64, f64)>,
) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;
    let mut written = Vec::new();

    let path = dir.join(format!("{base}.csv"));
    samples::write_csv(create(&path)?, samples_in)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);

    let path = dir.join(format!("{base}_time_domain.csv"));
    features
        .time_domain
        .write_csv(create(&path)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);

    let path = dir.join(format!("{base}_freq_domain.csv"));
    features
        .frequency_spectrum
        .write_csv(create(&path)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);

    let path = dir.join(format!("{base}_spectrogram.csv"));
    features
        .spectrogram
        .write_csv(create(&path)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);

    let path = dir.join(format!("{base}_iq.csv"));
    features
        .iq_scatter
        .write_csv(create(&path)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);

    let path = dir.join(format!("{base}_metadata.json"));
    serde_json::to_writer_pretty(create(&path)?, &metadata.summary())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);

    let (width, height) = LINE_PLOT_SIZE;
    let path = dir.join(format!("{base}_time_domain.png"));
    render::save_png(
        &render::time_domain_image(&features.time_domain, width, height),
        &path,
    )?;
    written.push(path);

    let path = dir.join(format!("{base}_freq_domain.png"));
    render::save_png(
        &render::spectrum_image(&features.frequency_spectrum, width, height),
        &path,
    )?;
    written.push(path);

    let path = dir.join(format!("{base}_spectrogram.png"));
    render::save_png(&render::spectrogram_image(&features.spectrogram, db_range)?, &path)?;
    written.push(path);

    let path = dir.join(format!("{base}_iq_plot.png"));
    render::save_png(
        &render::constellation_image(&features.iq_scatter, CONSTELLATION_SIZE),
        &path,
    )?;
    written.push(path);

    Ok(written)
}

/// Write a generated scene: matrix CSV, transmitter table and heatmap.
pub fn write_scene(
    dir: &Path,
    name: &str,
    scene: &SyntheticScene,
    db_range: Option<(f64, f64)>,
) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;

    let matrix_path = dir.join(format!("{name}.csv"));
    scene
        .write_csv(create(&matrix_path)?)
        .with_context(|| format!("Failed to write {}", matrix_path.display()))?;

    let tx_path = dir.join(format!("{name}_transmitters.csv"));
    scene
        .write_transmitters_csv(create(&tx_path)?)
        .with_context(|| format!("Failed to write {}", tx_path.display()))?;

    let png_path = dir.join(format!("{name}.png"));
    render::save_png(&render::matrix_image(&scene.matrix, db_range)?, &png_path)?;

    Ok(vec![matrix_path, tx_path, png_path])
}

/// Capture parameters for [`write_sigmf`].
#[derive(Debug, Clone)]
pub struct SigmfCapture<'a> {
    pub sample_rate: f64,
    pub center_frequency: f64,
    pub datetime: DateTime<Utc>,
    pub description: &'a str,
    pub annotations: &'a [Annotation],
}

fn annotation_json(annotation: &Annotation) -> Value {
    let mut entry = Map::new();
    entry.insert("core:sample_start".into(), json!(annotation.start_sample));
    entry.insert("core:sample_count".into(), json!(annotation.sample_count));
    if let Some(edge) = annotation.freq_lower_edge {
        entry.insert("core:freq_lower_edge".into(), json!(edge));
    }
    if let Some(edge) = annotation.freq_upper_edge {
        entry.insert("core:freq_upper_edge".into(), json!(edge));
    }
    if let Some(label) = &annotation.label {
        entry.insert("core:label".into(), json!(label));
    }
    if let Some(comment) = &annotation.comment {
        entry.insert("core:comment".into(), json!(comment));
    }
    Value::Object(entry)
}

/// Write `samples` as a `cf32_le` recording: `<base>.sigmf-data` plus a
/// `<base>.sigmf-meta` carrying the data file's SHA-512.
pub fn write_sigmf(
    base: &Path,
    samples_out: &[Complex32],
    capture: &SigmfCapture<'_>,
) -> Result<(PathBuf, PathBuf)> {
    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let file_name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let data_path = base.with_file_name(format!("{file_name}.sigmf-data"));
    let meta_path = base.with_file_name(format!("{file_name}.sigmf-meta"));

    let bytes = samples::encode_cf32_le(samples_out);
    fs::write(&data_path, &bytes)
        .with_context(|| format!("Failed to write {}", data_path.display()))?;

    let document = json!({
        "global": {
            "core:datatype": "cf32_le",
            "core:sample_rate": capture.sample_rate,
            "core:version": "1.0.0",
            "core:recorder": "iqscope",
            "core:description": capture.description,
            "core:sha512": crate::input::sha512_hex(&bytes),
        },
        "captures": [{
            "core:sample_start": 0,
            "core:frequency": capture.center_frequency,
            "core:datetime": capture.datetime.to_rfc3339(),
        }],
        "annotations": capture.annotations.iter().map(annotation_json).collect::<Vec<_>>(),
    });
    serde_json::to_writer_pretty(create(&meta_path)?, &document)
        .with_context(|| format!("Failed to write {}", meta_path.display()))?;

    log::info!(
        "Wrote {} samples to {} and {}",
        samples_out.len(),
        data_path.display(),
        meta_path.display()
    );
    Ok((data_path, meta_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use iq_analysis::{PowerMatrix, ScenarioParams};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/x/capture.sigmf-data")), "capture");
        assert_eq!(base_name(Path::new("capture.sigmf-data.gz")), "capture");
        assert_eq!(base_name(Path::new("upload.csv")), "upload");
        assert_eq!(base_name(Path::new("rec.wav.gz")), "rec");
        assert_eq!(base_name(Path::new(".sigmf-data")), "recording");
    }

    #[test]
    fn test_scene_name() {
        let now = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(scene_name(now), "scene_20250309_140507");
    }

    #[test]
    fn test_write_features() {
        let dir = TempDir::new().unwrap();
        let meta = Metadata::parse(
            br#"{"global": {"core:datatype": "cf32_le", "core:sample_rate": 1000000},
                 "captures": [{"core:sample_start": 0, "core:frequency": 1000000000}],
                 "annotations": []}"#,
        )
        .unwrap();
        let iq = samples::tones(1e6, 2048, &[100e3]);
        let features = iq_analysis::extract(&iq, &meta).unwrap();

        let written = write_features(dir.path(), "capture", &iq, &meta, &features, None).unwrap();
        assert_eq!(written.len(), 10);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }

        let csv = fs::read_to_string(dir.path().join("capture.csv")).unwrap();
        assert!(csv.starts_with("Real,Imaginary"));
        assert_eq!(csv.lines().count(), 2049);

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("capture_metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["sample_rate"], 1e6);
        assert_eq!(json["max_frequency"], 1000.5e6);

        let img = image::open(dir.path().join("capture_spectrogram.png")).unwrap();
        assert_eq!((img.width(), img.height()), (256, 15));

        for plot in ["capture_time_domain.png", "capture_freq_domain.png"] {
            let img = image::open(dir.path().join(plot)).unwrap().to_rgb8();
            assert_eq!(img.dimensions(), LINE_PLOT_SIZE);
            assert!(img.pixels().any(|p| p.0 != [0, 0, 0]), "{plot} is blank");
        }
    }

    #[test]
    fn test_write_scene() {
        let dir = TempDir::new().unwrap();
        let params = ScenarioParams {
            rows: 50,
            cols: 64,
            num_transmitters: 2,
            bandwidth: 8,
            active_time: 5,
            ..Default::default()
        };
        let scene = iq_analysis::synthesize(&params, &mut StdRng::seed_from_u64(3)).unwrap();

        let written = write_scene(dir.path(), "scene", &scene, Some((-120.0, -60.0))).unwrap();
        assert_eq!(written.len(), 3);

        let reread = PowerMatrix::read_csv(File::open(&written[0]).unwrap()).unwrap();
        assert_eq!(reread.rows(), 50);
        assert_eq!(reread.cols(), 64);

        let table = fs::read_to_string(&written[1]).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("id,start_time,end_time,start_freq,end_freq"));
        assert_eq!(lines.count(), 2);

        let img = image::open(&written[2]).unwrap();
        assert_eq!((img.width(), img.height()), (64, 50));
    }

    #[test]
    fn test_write_sigmf_reloads() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("nested").join("tone");
        let iq = samples::tones(1e6, 4096, &[100e3]);
        let annotations = [Annotation {
            start_sample: 0,
            sample_count: 4096,
            freq_lower_edge: Some(100.095e6),
            freq_upper_edge: Some(100.105e6),
            label: Some("tone".to_string()),
            comment: None,
        }];
        let capture = SigmfCapture {
            sample_rate: 1e6,
            center_frequency: 100e6,
            datetime: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            description: "test",
            annotations: &annotations,
        };

        let (data_path, meta_path) = write_sigmf(&base, &iq, &capture).unwrap();
        assert_eq!(data_path.file_name().unwrap(), "tone.sigmf-data");
        assert_eq!(crate::input::sibling_metadata_path(&data_path), meta_path);

        let meta = crate::input::load_metadata(&meta_path).unwrap();
        assert_eq!(meta.sample_rate(), 1e6);
        assert_eq!(meta.annotations(), &annotations);
        assert_eq!(meta.stats().min_frequency, 100.095e6);
        assert!(meta.datetime_utc().is_some());

        let reloaded = crate::input::load_samples(&data_path, &meta, true).unwrap();
        assert_eq!(reloaded, iq);
    }
}
