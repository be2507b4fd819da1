//! Text-completion collaborator boundary.
//!
//! Free-form replies (direct mentions, interest matches, LLM-flagged
//! triggers) are delegated to an opaque completion backend. The engine
//! treats a backend error, timeout, or an explicit `should_ignore` as a
//! no-op turn; it never retries and never surfaces the failure to the
//! channel.

use async_trait::async_trait;

/// One prior exchange in the channel, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub author_name: String,
    pub user_message: String,
    pub bot_response: String,
}

/// Everything the backend needs to produce a reply in-voice.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The persona's base system prompt.
    pub system_prompt: String,
    /// Recent conversation history for the channel.
    pub history: Vec<ConversationTurn>,
    /// Known facts about the message author, pre-formatted.
    pub user_facts: String,
    /// Evolved-trait modifiers rendered for the prompt (may be empty).
    pub trait_modifiers: String,
    /// Display name of the message author.
    pub author_name: String,
    /// The message being replied to.
    pub user_message: String,
}

/// Backend reply.
#[derive(Debug, Clone)]
pub struct CompletionReply {
    /// Generated reply text.
    pub content: String,
    /// Backend judged the persona should stay quiet this turn.
    pub should_ignore: bool,
}

/// Opaque text-completion backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn generate(&self, request: &CompletionRequest)
        -> Result<CompletionReply, anyhow::Error>;
}

/// Backend double that replays queued replies. Used by handler tests.
pub struct ScriptedBackend {
    replies: parking_lot::Mutex<std::collections::VecDeque<Result<CompletionReply, String>>>,
}

impl ScriptedBackend {
    /// Queue of replies served in order; an `Err` string becomes a backend
    /// failure.
    pub fn new(replies: impl IntoIterator<Item = Result<CompletionReply, String>>) -> Self {
        Self {
            replies: parking_lot::Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Backend that always answers with the same content.
    pub fn always(content: &str) -> Self {
        let content = content.to_string();
        Self {
            replies: parking_lot::Mutex::new(
                std::iter::repeat_with(|| {
                    Ok(CompletionReply {
                        content: content.clone(),
                        should_ignore: false,
                    })
                })
                .take(64)
                .collect(),
            ),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn generate(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionReply, anyhow::Error> {
        match self.replies.lock().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
            None => Err(anyhow::anyhow!("scripted backend exhausted")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_backend_replays_in_order() {
        let backend = ScriptedBackend::new([
            Ok(CompletionReply {
                content: "first".into(),
                should_ignore: false,
            }),
            Err("backend down".into()),
        ]);

        let request = CompletionRequest {
            system_prompt: String::new(),
            history: Vec::new(),
            user_facts: String::new(),
            trait_modifiers: String::new(),
            author_name: "user".into(),
            user_message: "hi".into(),
        };

        let first = backend.generate(&request).await.unwrap();
        assert_eq!(first.content, "first");
        assert!(backend.generate(&request).await.is_err());
    }
}
