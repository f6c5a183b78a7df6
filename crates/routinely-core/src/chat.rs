//! Conversation history and the requests built from it.
//!
//! A request is split in two halves so that a UI can run the network call
//! elsewhere: `begin_*` records the user side and returns the payload,
//! [`Conversation::finish`] records the reply. The `generate_routine` and
//! `submit_follow_up` helpers do both halves inline.

use tracing::{error, info};
use crate::product::Product;
use crate::relay::CompletionBackend;
use crate::state::ChatMessage;

pub const ROUTINE_DISPLAY_MESSAGE: &str = "Make me a beauty routine with the selected products.";
pub const ROUTINE_ERROR_MESSAGE: &str = "*Error generating routine. Please try again.*";
pub const FOLLOW_UP_ERROR_MESSAGE: &str = "*Error. Please try again.*";

const ROUTINE_INSTRUCTION: &str = "Please try to stay as brief and concise as possible, \
act like a simple instruction guide you'd find on the back of a boxed dinner or something, \
with only a very short explanation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Routine,
    FollowUp,
}

impl RequestKind {
    pub fn error_message(&self) -> &'static str {
        match self {
            RequestKind::Routine => ROUTINE_ERROR_MESSAGE,
            RequestKind::FollowUp => FOLLOW_UP_ERROR_MESSAGE,
        }
    }

    /// Transient text shown while the request is outstanding
    pub fn pending_label(&self) -> &'static str {
        match self {
            RequestKind::Routine => "Generating your routine",
            RequestKind::FollowUp => "Thinking",
        }
    }
}

/// Messages to send for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub kind: RequestKind,
    pub messages: Vec<ChatMessage>,
}

/// The hidden prompt sent in place of the routine display message. Each
/// product entry carries the brevity instruction.
pub fn build_routine_prompt(products: &[Product]) -> String {
    let listed: Vec<String> = products
        .iter()
        .map(|p| format!("{}, {}. {}", p.name, p.description, ROUTINE_INSTRUCTION))
        .collect();

    format!(
        "Make me a detailed beauty routine using these products: {}.",
        listed.join("; ")
    )
}

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Records the display message. The synthesized prompt only goes into
    /// the returned payload, never into the history.
    pub fn begin_routine(&mut self, products: &[Product]) -> PendingRequest {
        self.history.push(ChatMessage::user(ROUTINE_DISPLAY_MESSAGE));

        let mut messages = self.history.clone();
        messages.push(ChatMessage::user(build_routine_prompt(products)));

        PendingRequest {
            kind: RequestKind::Routine,
            messages,
        }
    }

    /// Returns `None` for empty input, leaving the history untouched.
    /// Whitespace is sent as typed.
    pub fn begin_follow_up(&mut self, text: &str) -> Option<PendingRequest> {
        if text.is_empty() {
            return None;
        }

        self.history.push(ChatMessage::user(text));
        Some(PendingRequest {
            kind: RequestKind::FollowUp,
            messages: self.history.clone(),
        })
    }

    /// Appends exactly one assistant message: the reply or the fixed error
    pub fn finish<E: std::fmt::Display>(&mut self, kind: RequestKind, result: Result<String, E>) {
        match result {
            Ok(reply) => {
                info!(?kind, chars = reply.len(), "assistant reply received");
                self.history.push(ChatMessage::assistant(reply));
            }
            Err(e) => {
                error!(?kind, error = %e, "chat request failed");
                self.history.push(ChatMessage::assistant(kind.error_message()));
            }
        }
    }

    pub async fn generate_routine(&mut self, backend: &dyn CompletionBackend, products: &[Product]) {
        let request = self.begin_routine(products);
        let result = backend.complete(&request.messages).await;
        self.finish(request.kind, result);
    }

    pub async fn submit_follow_up(&mut self, backend: &dyn CompletionBackend, text: &str) {
        if let Some(request) = self.begin_follow_up(text) {
            let result = backend.complete(&request.messages).await;
            self.finish(request.kind, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::product;
    use crate::relay::RelayError;
    use crate::state::ChatRole;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a numbered echo and records every payload
    #[derive(Default)]
    struct EchoBackend {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RelayError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            Ok(format!("reply {}", calls.len()))
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, RelayError> {
            Err(RelayError::EmptyResponse)
        }
    }

    #[test]
    fn test_routine_prompt_lists_every_product() {
        let prompt = build_routine_prompt(&[
            product("Serum", "skincare", "Vitamin C"),
            product("Lipstick", "makeup", "Matte red"),
        ]);
        assert_eq!(
            prompt,
            format!(
                "Make me a detailed beauty routine using these products: \
                 Serum, Vitamin C. {instruction}; Lipstick, Matte red. {instruction}.",
                instruction = ROUTINE_INSTRUCTION
            )
        );
        assert_eq!(prompt.matches(ROUTINE_INSTRUCTION).count(), 2);
    }

    #[tokio::test]
    async fn test_follow_up_round_trips() {
        let backend = EchoBackend::default();
        let mut conversation = Conversation::new();

        conversation.submit_follow_up(&backend, "hi").await;
        conversation.submit_follow_up(&backend, "how?").await;

        let history = conversation.history();
        assert_eq!(
            history,
            [
                ChatMessage::user("hi"),
                ChatMessage::assistant("reply 1"),
                ChatMessage::user("how?"),
                ChatMessage::assistant("reply 2"),
            ]
        );

        // The follow-up carries the full history
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[1], history[..3]);
    }

    #[tokio::test]
    async fn test_routine_keeps_synthesized_prompt_out_of_history() {
        let backend = EchoBackend::default();
        let mut conversation = Conversation::new();
        let products = [product("Serum", "skincare", "Vitamin C")];

        conversation.generate_routine(&backend, &products).await;

        assert_eq!(
            conversation.history(),
            [
                ChatMessage::user(ROUTINE_DISPLAY_MESSAGE),
                ChatMessage::assistant("reply 1"),
            ]
        );

        let calls = backend.calls.lock().unwrap();
        let sent = &calls[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], ChatMessage::user(ROUTINE_DISPLAY_MESSAGE));
        assert_eq!(sent[1].role, ChatRole::User);
        assert!(sent[1].content.contains("Serum, Vitamin C"));
    }

    #[tokio::test]
    async fn test_failure_appends_single_error_entry() {
        let mut conversation = Conversation::new();
        conversation.submit_follow_up(&EchoBackend::default(), "hi").await;
        let before = conversation.history().to_vec();

        conversation.submit_follow_up(&FailingBackend, "again").await;

        let history = conversation.history();
        assert_eq!(history.len(), before.len() + 2);
        assert_eq!(history[..before.len()], before[..]);
        assert_eq!(history.last(), Some(&ChatMessage::assistant(FOLLOW_UP_ERROR_MESSAGE)));
        assert_eq!(
            history.iter().filter(|m| m.content == FOLLOW_UP_ERROR_MESSAGE).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_routine_failure_uses_routine_error_text() {
        let mut conversation = Conversation::new();
        conversation.generate_routine(&FailingBackend, &[]).await;
        assert_eq!(
            conversation.history().last(),
            Some(&ChatMessage::assistant(ROUTINE_ERROR_MESSAGE))
        );
    }

    #[tokio::test]
    async fn test_only_empty_follow_up_is_ignored() {
        let backend = EchoBackend::default();
        let mut conversation = Conversation::new();
        conversation.submit_follow_up(&backend, "").await;
        assert!(conversation.is_empty());
        assert!(backend.calls.lock().unwrap().is_empty());

        conversation.submit_follow_up(&backend, "   ").await;
        assert_eq!(
            conversation.history(),
            [ChatMessage::user("   "), ChatMessage::assistant("reply 1")]
        );
    }
}
