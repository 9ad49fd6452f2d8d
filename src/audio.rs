use std::path::{Path, PathBuf};

use serde::Serialize;

/// Metadata for a finite PCM recording, probed from a WAV container.
///
/// Artifacts are produced by the capture side and are immutable here; the
/// orchestrator only reads them.
#[derive(Debug, Clone, Serialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub duration_secs: f64,
    pub size_bytes: u64,
}

impl AudioArtifact {
    /// Probe a WAV file on disk. Fails on a missing, empty, or unreadable
    /// container.
    pub fn probe(path: &Path) -> Result<Self, String> {
        let meta = std::fs::metadata(path)
            .map_err(|e| format!("audio file not found: {}: {}", path.display(), e))?;
        if !meta.is_file() {
            return Err(format!("not a file: {}", path.display()));
        }
        if meta.len() == 0 {
            return Err(format!("audio file is empty: {}", path.display()));
        }

        let reader = hound::WavReader::open(path)
            .map_err(|e| format!("unreadable WAV file {}: {}", path.display(), e))?;
        let spec = reader.spec();
        let frames = reader.duration();
        let duration_secs = frames as f64 / spec.sample_rate as f64;

        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            duration_secs,
            size_bytes: meta.len(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The file stem used to derive default output names.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Load a WAV file as f32 samples, downmixed to mono and resampled to 16 kHz
/// (the rate whisper models expect). Blocking; call under `spawn_blocking`.
pub(crate) fn load_samples_16k_mono(path: &Path) -> Result<Vec<f32>, String> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| format!("failed to open audio file: {}", e))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            // Computed in i64: 1 << 31 overflows i32 for 32-bit samples.
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
    };

    let mono_samples: Vec<f32> = if channels > 1 {
        samples
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    if mono_samples.is_empty() {
        return Err("audio file contains no samples".to_string());
    }

    // Linear-interpolation resample to 16 kHz when needed.
    let final_samples = if sample_rate != 16_000 {
        let ratio = sample_rate as f64 / 16_000.0;
        let new_len = (mono_samples.len() as f64 / ratio) as usize;
        let mut resampled = Vec::with_capacity(new_len);

        for i in 0..new_len {
            let src_idx = i as f64 * ratio;
            let idx_floor = src_idx.floor() as usize;
            let idx_ceil = (idx_floor + 1).min(mono_samples.len() - 1);
            let frac = (src_idx - idx_floor as f64) as f32;

            let sample = mono_samples[idx_floor] * (1.0 - frac) + mono_samples[idx_ceil] * frac;
            resampled.push(sample);
        }

        resampled
    } else {
        mono_samples
    };

    Ok(final_samples)
}
