use crate::completion::{ChatTurn, CompletionClient};
use crate::error::VoiceError;
use async_trait::async_trait;
use mentorline_types::Language;

/// Automated mentor used when no human mentor is available.
#[async_trait]
pub trait Coach: Send + Sync {
    /// Produces the next reply given the prior turns and the new message.
    async fn reply(
        &self,
        history: &[ChatTurn],
        message: &str,
        language: &Language,
    ) -> Result<String, VoiceError>;
}

fn system_prompt(language: &Language) -> String {
    format!(
        "You are a friendly career mentor for students in India preparing for exams \
         and choosing careers. Reply in {} using plain spoken sentences without lists \
         or markdown. Keep answers under 120 words.",
        language.name
    )
}

/// Coach backed by a chat completion model.
#[derive(Debug, Clone)]
pub struct CompletionCoach {
    client: CompletionClient,
}

impl CompletionCoach {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Coach for CompletionCoach {
    async fn reply(
        &self,
        history: &[ChatTurn],
        message: &str,
        language: &Language,
    ) -> Result<String, VoiceError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn::system(system_prompt(language)));
        messages.extend(
            history
                .iter()
                .filter(|turn| turn.role == "user" || turn.role == "assistant")
                .cloned(),
        );
        messages.push(ChatTurn::user(message));

        let reply = self.client.complete(&messages).await?;
        if reply.is_empty() {
            return Err(VoiceError::UpstreamUnavailable(
                "completion returned an empty reply".to_string(),
            ));
        }
        Ok(reply)
    }
}
