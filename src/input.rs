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

//! Loading recordings from disk.
//!
//! Data files are dispatched on extension: `.csv` holds `Real,Imaginary`
//! rows, `.wav` holds 16-bit stereo I/Q, and anything else is raw bytes in
//! the metadata's datatype. A trailing `.gz` on any of them is decompressed
//! transparently.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use hound::WavReader;
use iq_analysis::samples::{self, SampleFormat};
use iq_analysis::Metadata;
use num_complex::Complex32;
use sha2::{Digest, Sha512};

/// How the bytes of a data file are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataKind {
    Csv,
    Wav,
    Raw,
}

/// Split `path` into its data kind and whether it is gzip compressed.
fn classify(path: &Path) -> (DataKind, bool) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let (stem, gzipped) = match name.strip_suffix(".gz") {
        Some(stem) => (stem.to_string(), true),
        None => (name, false),
    };

    let kind = if stem.ends_with(".csv") {
        DataKind::Csv
    } else if stem.ends_with(".wav") {
        DataKind::Wav
    } else {
        DataKind::Raw
    };
    (kind, gzipped)
}

/// Read a file, decompressing it if the name ends in `.gz`.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !classify(path).1 {
        return Ok(raw);
    }

    let mut decoder = GzDecoder::new(&raw[..]);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .with_context(|| format!("Failed to decompress {}", path.display()))?;
    log::debug!(
        "Decompressed {} ({} -> {} bytes)",
        path.display(),
        raw.len(),
        decompressed.len()
    );
    Ok(decompressed)
}

/// Parse a `.sigmf-meta` document.
pub fn load_metadata(path: &Path) -> Result<Metadata> {
    let bytes = read_bytes(path)?;
    let metadata = Metadata::parse(&bytes)
        .with_context(|| format!("Invalid metadata in {}", path.display()))?;
    log::info!(
        "Loaded metadata: {} Hz sample rate, {} Hz center, {} annotations",
        metadata.sample_rate(),
        metadata.center_frequency(),
        metadata.annotations().len()
    );
    Ok(metadata)
}

/// The metadata file that sits next to a `.sigmf-data` file.
pub fn sibling_metadata_path(data_path: &Path) -> PathBuf {
    let name = data_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let stem = name.strip_suffix(".sigmf-data").unwrap_or_else(|| {
        Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
    });
    data_path.with_file_name(format!("{stem}.sigmf-meta"))
}

/// Lowercase hex SHA-512 digest.
pub fn sha512_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Fail if `bytes` do not hash to `expected`.
pub fn verify_sha512(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha512_hex(bytes);
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        bail!("SHA-512 mismatch: metadata says {expected}, data hashes to {actual}");
    }
    log::debug!("SHA-512 verified");
    Ok(())
}

/// Load the samples of a data file described by `metadata`.
///
/// When `verify` is set and the metadata carries `core:sha512`, the
/// (decompressed) data bytes must match it.
pub fn load_samples(path: &Path, metadata: &Metadata, verify: bool) -> Result<Vec<Complex32>> {
    let bytes = read_bytes(path)?;

    if let Some(expected) = metadata.global().sha512.as_deref() {
        if verify {
            verify_sha512(&bytes, expected)
                .with_context(|| format!("Integrity check failed for {}", path.display()))?;
        } else {
            log::debug!("Skipping checksum verification");
        }
    }

    let samples = match classify(path).0 {
        DataKind::Csv => samples::read_csv(&bytes[..])
            .with_context(|| format!("Invalid sample CSV in {}", path.display()))?,
        DataKind::Wav => decode_wav(&bytes, metadata.sample_rate())
            .with_context(|| format!("Invalid WAV file {}", path.display()))?,
        DataKind::Raw => {
            let format = SampleFormat::from_datatype(metadata.global().datatype.as_deref())?;
            samples::decode(&bytes, format)
                .with_context(|| format!("Failed to decode {} as {}", path.display(), format.as_str()))?
        }
    };

    if samples.is_empty() {
        bail!("{} contains no samples", path.display());
    }
    log::info!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Decode 16-bit stereo WAV where left is I and right is Q.
fn decode_wav(bytes: &[u8], expected_rate: f64) -> Result<Vec<Complex32>> {
    let reader = WavReader::new(Cursor::new(bytes)).context("Failed to parse WAV header")?;
    let spec = reader.spec();

    if spec.channels != 2 {
        bail!(
            "WAV file must be stereo (2 channels), found {} channels",
            spec.channels
        );
    }
    if spec.bits_per_sample != 16 {
        bail!(
            "WAV file must be 16-bit, found {} bits per sample",
            spec.bits_per_sample
        );
    }

    log::debug!(
        "WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );
    if expected_rate > 0.0 && (f64::from(spec.sample_rate) - expected_rate).abs() > 0.5 {
        log::warn!(
            "WAV header sample rate {} Hz differs from metadata {} Hz; using metadata",
            spec.sample_rate,
            expected_rate
        );
    }

    let interleaved = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read WAV samples")?;

    Ok(interleaved
        .chunks_exact(2)
        .map(|pair| {
            Complex32::new(
                f32::from(pair[0]) / 32768.0,
                f32::from(pair[1]) / 32768.0,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn metadata(datatype: &str, sha512: Option<&str>) -> Metadata {
        let sha = sha512.map_or(String::new(), |s| format!(r#", "core:sha512": "{s}""#));
        let doc = format!(
            r#"{{"global": {{"core:datatype": "{datatype}", "core:sample_rate": 48000{sha}}},
                "captures": [{{"core:sample_start": 0}}], "annotations": []}}"#
        );
        Metadata::parse(doc.as_bytes()).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a.csv")), (DataKind::Csv, false));
        assert_eq!(classify(Path::new("a.CSV.gz")), (DataKind::Csv, true));
        assert_eq!(classify(Path::new("a.wav")), (DataKind::Wav, false));
        assert_eq!(classify(Path::new("a.sigmf-data.gz")), (DataKind::Raw, true));
        assert_eq!(classify(Path::new("capture.cf32")), (DataKind::Raw, false));
    }

    #[test]
    fn test_sibling_metadata_path() {
        assert_eq!(
            sibling_metadata_path(Path::new("/data/rec.sigmf-data")),
            PathBuf::from("/data/rec.sigmf-meta")
        );
        assert_eq!(
            sibling_metadata_path(Path::new("/data/rec.sigmf-data.gz")),
            PathBuf::from("/data/rec.sigmf-meta")
        );
        assert_eq!(
            sibling_metadata_path(Path::new("rec.cf32")),
            PathBuf::from("rec.sigmf-meta")
        );
    }

    #[test]
    fn test_load_raw_with_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rec.sigmf-data");
        let bytes = samples::encode_cf32_le(&samples::tones(48000.0, 64, &[1000.0]));
        fs::write(&path, &bytes).unwrap();

        let meta = metadata("cf32_le", Some(&sha512_hex(&bytes)));
        let loaded = load_samples(&path, &meta, true).unwrap();
        assert_eq!(loaded.len(), 64);
    }

    #[test]
    fn test_checksum_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rec.sigmf-data");
        fs::write(&path, samples::encode_cf32_le(&[Complex32::new(1.0, 0.0)])).unwrap();

        let meta = metadata("cf32_le", Some("00ff"));
        let err = load_samples(&path, &meta, true).unwrap_err();
        assert!(format!("{err:#}").contains("SHA-512 mismatch"));

        // Skipped when verification is off
        assert_eq!(load_samples(&path, &meta, false).unwrap().len(), 1);
    }

    #[test]
    fn test_load_gzipped_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.csv.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"Real,Imaginary\n0.5,-0.5\n1.0,0.0\n")
            .unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let loaded = load_samples(&path, &metadata("cf32_le", None), true).unwrap();
        assert_eq!(loaded, vec![Complex32::new(0.5, -0.5), Complex32::new(1.0, 0.0)]);
    }

    #[test]
    fn test_load_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rec.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for (i, q) in [(16384_i16, -16384_i16), (0, 32767)] {
            writer.write_sample(i).unwrap();
            writer.write_sample(q).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = load_samples(&path, &metadata("cf32_le", None), true).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], Complex32::new(0.5, -0.5));
        assert!((loaded[1].im - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_wav_must_be_stereo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0_i16).unwrap();
        writer.finalize().unwrap();

        let err = load_samples(&path, &metadata("cf32_le", None), true).unwrap_err();
        assert!(format!("{err:#}").contains("stereo"));
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.sigmf-data");
        fs::write(&path, b"").unwrap();

        assert!(load_samples(&path, &metadata("cf32_le", None), false).is_err());
    }
}
