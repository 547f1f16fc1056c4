//! Ordered concatenation of synthesized chunk files.

use crate::config::SynthesisConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Timeout for an ffmpeg concat run.
const FFMPEG_TIMEOUT: Duration = Duration::from_secs(60);

/// Joins chunk files, in the given order, into one playable file.
#[async_trait]
pub trait AudioAssembler: Send + Sync {
    /// Writes `output` and returns any scratch files it created along the way.
    async fn assemble(&self, parts: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>, VoiceError>;
}

/// Picks the assembler configured by `synthesis.ffmpeg_binary`.
pub fn assembler_for(config: &SynthesisConfig) -> Arc<dyn AudioAssembler> {
    if config.ffmpeg_binary.trim().is_empty() {
        Arc::new(NativeConcat)
    } else {
        Arc::new(FfmpegConcat::new(config.ffmpeg_binary.trim()))
    }
}

/// Guesses a file extension from an encoded audio buffer.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        "wav"
    } else if bytes.starts_with(b"OggS") {
        "ogg"
    } else if bytes.starts_with(b"ID3")
        || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    {
        "mp3"
    } else {
        "bin"
    }
}

/// Renders a concat demuxer manifest, quoting each path.
fn concat_manifest(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let quoted = p.to_string_lossy().replace('\'', "'\\''");
            format!("file '{quoted}'\n")
        })
        .collect()
}

/// Stream-copy concatenation through `ffmpeg -f concat`.
#[derive(Debug, Clone)]
pub struct FfmpegConcat {
    binary: PathBuf,
}

impl FfmpegConcat {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, manifest: &Path, output: &Path) -> Result<(), VoiceError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(manifest)
            .arg("-c")
            .arg("copy")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| VoiceError::Assembly(format!("Failed to spawn ffmpeg: {}", e)))?;

        let out = tokio::time::timeout(FFMPEG_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Assembly(format!(
                    "ffmpeg timed out after {} seconds",
                    FFMPEG_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Assembly(format!("Failed to wait for ffmpeg: {}", e)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(VoiceError::Assembly(format!(
                "ffmpeg failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioAssembler for FfmpegConcat {
    async fn assemble(&self, parts: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>, VoiceError> {
        if parts.is_empty() {
            return Err(VoiceError::Assembly("no parts to assemble".to_string()));
        }

        let manifest = output.with_extension("concat.txt");
        tokio::fs::write(&manifest, concat_manifest(parts)).await?;

        if let Err(e) = self.run(&manifest, output).await {
            if let Err(rm) = tokio::fs::remove_file(&manifest).await {
                tracing::warn!(
                    path = %manifest.display(),
                    error = %rm,
                    "failed to remove concat manifest"
                );
            }
            return Err(e);
        }

        Ok(vec![manifest])
    }
}

/// In-process concatenation.
///
/// WAV parts sharing one format are merged into a single WAV with a correct
/// header. Other inputs are joined byte for byte, which suits frame-based
/// streams such as MP3.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConcat;

#[async_trait]
impl AudioAssembler for NativeConcat {
    async fn assemble(&self, parts: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>, VoiceError> {
        if parts.is_empty() {
            return Err(VoiceError::Assembly("no parts to assemble".to_string()));
        }

        let parts = parts.to_vec();
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || concat_blocking(&parts, &output))
            .await
            .map_err(|e| VoiceError::Assembly(format!("assembly task failed: {e}")))??;

        Ok(Vec::new())
    }
}

fn is_wav_file(path: &Path) -> Result<bool, VoiceError> {
    use std::io::Read;
    let mut header = [0u8; 12];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff_extension(&header[..filled]) == "wav")
}

fn concat_blocking(parts: &[PathBuf], output: &Path) -> Result<(), VoiceError> {
    let mut wav_flags = Vec::with_capacity(parts.len());
    for part in parts {
        wav_flags.push(is_wav_file(part)?);
    }

    if wav_flags.iter().all(|w| *w) {
        merge_wav(parts, output)
    } else if wav_flags.iter().any(|w| *w) {
        Err(VoiceError::Assembly(
            "cannot join WAV and non-WAV parts".to_string(),
        ))
    } else {
        let mut out = File::create(output)?;
        for part in parts {
            let mut input = File::open(part)?;
            std::io::copy(&mut input, &mut out)?;
        }
        out.sync_all()?;
        Ok(())
    }
}

fn wav_error(e: hound::Error) -> VoiceError {
    VoiceError::Assembly(format!("wav: {e}"))
}

fn merge_wav(parts: &[PathBuf], output: &Path) -> Result<(), VoiceError> {
    let mut readers = Vec::with_capacity(parts.len());
    for part in parts {
        readers.push(hound::WavReader::open(part).map_err(wav_error)?);
    }

    let spec = readers[0].spec();
    if let Some(other) = readers.iter().map(|r| r.spec()).find(|s| *s != spec) {
        return Err(VoiceError::Assembly(format!(
            "mismatched WAV formats: {}Hz/{}ch/{}bit vs {}Hz/{}ch/{}bit",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            other.sample_rate,
            other.channels,
            other.bits_per_sample
        )));
    }

    let mut writer = hound::WavWriter::create(output, spec).map_err(wav_error)?;
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, _) => copy_samples::<f32>(&mut readers, &mut writer)?,
        (hound::SampleFormat::Int, 8) => copy_samples::<i8>(&mut readers, &mut writer)?,
        (hound::SampleFormat::Int, 16) => copy_samples::<i16>(&mut readers, &mut writer)?,
        (hound::SampleFormat::Int, _) => copy_samples::<i32>(&mut readers, &mut writer)?,
    }
    writer.finalize().map_err(wav_error)
}

fn copy_samples<S: hound::Sample + Copy>(
    readers: &mut [hound::WavReader<BufReader<File>>],
    writer: &mut hound::WavWriter<std::io::BufWriter<File>>,
) -> Result<(), VoiceError> {
    for reader in readers.iter_mut() {
        for sample in reader.samples::<S>() {
            writer.write_sample(sample.map_err(wav_error)?).map_err(wav_error)?;
        }
    }
    Ok(())
}
