use crate::completion::{ChatTurn, CompletionClient};
use crate::error::VoiceError;
use async_trait::async_trait;

/// Label used when the completion service returns nothing usable.
pub const FALLBACK_LABEL: &str = "GENERAL";

const SYSTEM_PROMPT: &str = "You are a career classification assistant. Return only a one-word \
career like NEET, UPSC, CDS, JEE, etc. No extra words or commas or full stops";

/// Maps a transcript to a single career label.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<String, VoiceError>;
}

/// Reduces a free-form completion to one uppercase token.
///
/// The first whitespace-delimited token that still has content after
/// stripping punctuation wins. Hyphens are kept inside the token so
/// `neet-ug.` becomes `NEET-UG`.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
                .trim_matches('-')
                .to_uppercase()
        })
        .find(|token| !token.is_empty())
        .unwrap_or_else(|| FALLBACK_LABEL.to_string())
}

/// Classifier backed by a chat completion model.
#[derive(Debug, Clone)]
pub struct CompletionClassifier {
    client: CompletionClient,
}

impl CompletionClassifier {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classifier for CompletionClassifier {
    async fn classify(&self, text: &str) -> Result<String, VoiceError> {
        let messages = [
            ChatTurn::system(SYSTEM_PROMPT),
            ChatTurn::user(format!("User query: \"{text}\"")),
        ];
        let raw = self.client.complete(&messages).await?;
        let label = normalize_label(&raw);
        tracing::debug!(raw = %raw, label = %label, "classified query");
        Ok(label)
    }
}
