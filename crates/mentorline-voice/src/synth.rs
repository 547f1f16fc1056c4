//! Long-text speech synthesis.
//!
//! Text is split into chunks, each chunk is synthesized under its own
//! deadline on a bounded pool, and the surviving chunks are assembled in
//! their original order. Failed chunks are skipped. Chunk files are owned by
//! a guard until assembly succeeds, then handed to the cleanup task.

use crate::assemble::{sniff_extension, AudioAssembler};
use crate::chunking::split_text;
use crate::cleanup::{remove_quietly, CleanupHandle};
use crate::config::SynthesisConfig;
use crate::error::{bounded, VoiceError};
use crate::tts::SpeechSynthesizer;
use futures_util::stream::{self, StreamExt};
use mentorline_types::Language;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// An assembled audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    /// Location of the assembled file.
    pub path: PathBuf,
    /// File name inside the output directory.
    pub file_name: String,
    /// Number of chunks the text was split into.
    pub chunk_count: usize,
    /// Indices of the chunks that made it into the output, ascending.
    pub chunks_used: Vec<usize>,
}

/// Files owned by one synthesis run. Removed on drop unless released.
#[derive(Debug, Default)]
struct ChunkFiles {
    paths: Vec<PathBuf>,
}

impl ChunkFiles {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn release(mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }
}

impl Drop for ChunkFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            remove_quietly(path);
        }
    }
}

pub struct ChunkedSynthesizer {
    tts: Arc<dyn SpeechSynthesizer>,
    assembler: Arc<dyn AudioAssembler>,
    config: SynthesisConfig,
    output_dir: PathBuf,
    cleanup: CleanupHandle,
}

impl ChunkedSynthesizer {
    pub fn new(
        tts: Arc<dyn SpeechSynthesizer>,
        assembler: Arc<dyn AudioAssembler>,
        config: SynthesisConfig,
        output_dir: impl Into<PathBuf>,
        cleanup: CleanupHandle,
    ) -> Self {
        Self {
            tts,
            assembler,
            config,
            output_dir: output_dir.into(),
            cleanup,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Synthesizes `text` into one audio file under the output directory.
    ///
    /// Returns `NoAudioProduced` when the text is blank or every chunk failed.
    pub async fn synthesize(
        &self,
        text: &str,
        language: &Language,
    ) -> Result<SynthesizedAudio, VoiceError> {
        let chunks = split_text(text, self.config.chunk_size, self.config.min_chunk_size);
        let chunk_count = chunks.len();
        if chunk_count == 0 {
            return Err(VoiceError::NoAudioProduced { chunks: 0 });
        }

        let job_id = Uuid::new_v4().simple().to_string();
        let limit = self.config.chunk_timeout();

        // Each chunk future owns its inputs so the whole call stays `Send`.
        let results: Vec<(usize, Result<Vec<u8>, VoiceError>)> =
            stream::iter(chunks.into_iter().enumerate())
                .map(|(index, chunk)| {
                    let tts = Arc::clone(&self.tts);
                    let language = language.clone();
                    async move {
                        let result = bounded(limit, tts.synthesize(&chunk, &language)).await;
                        (index, result)
                    }
                })
                .buffered(self.config.concurrency.max(1))
                .collect()
                .await;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut files = ChunkFiles::default();
        let mut chunks_used = Vec::new();
        let mut extension: Option<&'static str> = None;

        for (index, result) in results {
            match result {
                Ok(bytes) if !bytes.is_empty() => {
                    let ext = *extension.get_or_insert_with(|| sniff_extension(&bytes));
                    let path = self.output_dir.join(format!("{job_id}-chunk-{index}.{ext}"));
                    files.track(path.clone());
                    tokio::fs::write(&path, &bytes).await?;
                    chunks_used.push(index);
                }
                Ok(_) => {
                    tracing::warn!(
                        job = %job_id,
                        chunk = index,
                        "no audio returned for chunk, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        job = %job_id,
                        chunk = index,
                        error = %e,
                        "chunk synthesis failed, skipping"
                    );
                }
            }
        }

        if chunks_used.is_empty() {
            return Err(VoiceError::NoAudioProduced {
                chunks: chunk_count,
            });
        }

        let file_name = format!("{job_id}.{}", extension.unwrap_or("bin"));
        let output = self.output_dir.join(&file_name);
        let parts = files.paths().to_vec();

        // Tracked so a failed or abandoned assembly leaves nothing behind.
        files.track(output.clone());
        let scratch = self.assembler.assemble(&parts, &output).await?;

        let mut leftovers = files.release();
        leftovers.retain(|p| p != &output);
        leftovers.extend(scratch);
        self.cleanup.schedule(leftovers, self.config.cleanup_delay());

        tracing::info!(
            job = %job_id,
            chunks = chunk_count,
            used = chunks_used.len(),
            file = %file_name,
            "speech synthesized"
        );

        Ok(SynthesizedAudio {
            path: output,
            file_name,
            chunk_count,
            chunks_used,
        })
    }
}
