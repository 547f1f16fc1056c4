//! Speech and language services for Mentorline.
//!
//! Wraps the hosted upstreams the platform depends on: speech-to-text,
//! career classification and the automated coach over a chat completion
//! API, translation, and text-to-speech. Each upstream sits behind a small
//! async trait so the server can swap in fakes.
//!
//! Long replies go through [`ChunkedSynthesizer`], which splits text on
//! sentence boundaries, synthesizes chunks on a bounded pool, and joins the
//! results with an [`AudioAssembler`].

pub mod assemble;
pub mod chunking;
pub mod classifier;
pub mod cleanup;
pub mod coach;
pub mod completion;
pub mod config;
pub mod error;
pub mod stt;
pub mod synth;
pub mod translate;
pub mod tts;

pub use assemble::{assembler_for, sniff_extension, AudioAssembler, FfmpegConcat, NativeConcat};
pub use chunking::split_text;
pub use classifier::{normalize_label, Classifier, CompletionClassifier, FALLBACK_LABEL};
pub use cleanup::{remove_quietly, CleanupHandle, CleanupJob, CleanupQueue};
pub use coach::{Coach, CompletionCoach};
pub use completion::{ChatTurn, CompletionClient};
pub use config::{SynthesisConfig, UpstreamConfig};
pub use error::VoiceError;
pub use stt::{AudioClip, SarvamTranscriber, Transcriber};
pub use synth::{ChunkedSynthesizer, SynthesizedAudio};
pub use translate::{SarvamTranslator, Translator};
pub use tts::{SarvamSynthesizer, SpeechSynthesizer};
