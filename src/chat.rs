//! Chat transcript with optimistic user turns.
//!
//! A submission appends the user turn immediately; the reply, success or
//! failure, is appended as a second independent entry. Entries are never
//! edited or removed.

use tracing::{info, warn};

use crate::api::{ApiError, Backend, ChatRequest, ChatResponse};
use crate::citations::with_sources;
use crate::config::{Config, DEFAULT_TOP_K};
use crate::model::Model;
use crate::state::ChatMessage;

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub input: String,
    messages: Vec<ChatMessage>,
    loading: bool,
    pub top_k: usize,
    pub show_citations: bool,
    pub route_model: bool,
    pub model: Model,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self {
            input: String::new(),
            messages: Vec::new(),
            loading: false,
            top_k: DEFAULT_TOP_K,
            show_citations: true,
            route_model: false,
            model: Model::default(),
        }
    }
}

impl ChatSession {
    pub fn from_config(config: &Config, model: Model) -> Self {
        Self {
            top_k: config.top_k,
            show_citations: config.show_citations,
            route_model: config.send_model,
            model,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Start an exchange from the current input.
    ///
    /// Blank input and submissions while a reply is pending change nothing.
    pub fn submit(&mut self) -> Option<ChatRequest> {
        let query = self.input.trim();
        if query.is_empty() || self.loading {
            return None;
        }
        let query = query.to_string();

        self.messages.push(ChatMessage::user(query.clone()));
        self.loading = true;
        info!(k = self.top_k, "submitting chat query");

        Some(ChatRequest {
            query,
            k: self.top_k,
            model: self.route_model.then(|| self.model.as_str().to_string()),
        })
    }

    /// Append the assistant turn for a settled exchange and reset the input.
    pub fn resolve(&mut self, result: Result<ChatResponse, ApiError>) {
        let content = match result {
            Ok(response) => {
                info!(citations = response.citations.len(), "chat answer received");
                if self.show_citations {
                    with_sources(&response.answer, &response.citations)
                } else {
                    response.answer.trim().to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "chat request failed");
                format!("Request failed: {}", e.user_message())
            }
        };

        self.messages.push(ChatMessage::assistant(content));
        self.input.clear();
        self.loading = false;
    }

    /// Run one full exchange against `backend`. Returns false when the input
    /// was not submittable.
    pub async fn ask<B>(&mut self, backend: &B) -> bool
    where
        B: Backend + ?Sized,
    {
        let Some(request) = self.submit() else {
            return false;
        };
        let result = backend.chat(&request).await;
        self.resolve(result);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::citations::Citation;
    use crate::state::ChatRole;

    fn cite(filename: &str, chunk_id: &str) -> Citation {
        Citation {
            filename: filename.to_string(),
            chunk_id: chunk_id.to_string(),
            score: 0.5,
        }
    }

    #[tokio::test]
    async fn test_experience_question_without_sources() {
        let backend = FakeBackend::new().replying(|_| {
            Ok(ChatResponse {
                answer: "5 years".to_string(),
                citations: Vec::new(),
            })
        });
        let mut chat = ChatSession::default();
        chat.input = "What is my experience?".to_string();

        assert!(chat.ask(&backend).await);

        assert_eq!(
            chat.messages(),
            [
                ChatMessage::user("What is my experience?"),
                ChatMessage::assistant("5 years"),
            ]
        );
        assert!(chat.input.is_empty());
        assert!(!chat.is_loading());
    }

    #[tokio::test]
    async fn test_request_carries_trimmed_query_and_k() {
        let backend = FakeBackend::new();
        let mut chat = ChatSession::default();
        chat.top_k = 10;
        chat.input = "  skills?  ".to_string();

        chat.ask(&backend).await;

        let requests = backend.chat_requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            [ChatRequest {
                query: "skills?".to_string(),
                k: 10,
                model: None,
            }]
        );
        assert_eq!(chat.messages()[0].content, "skills?");
    }

    #[tokio::test]
    async fn test_blank_input_does_nothing() {
        let backend = FakeBackend::new();
        let mut chat = ChatSession::default();

        for input in ["", "   ", "\t\n"] {
            chat.input = input.to_string();
            assert!(!chat.ask(&backend).await);
        }

        assert!(backend.calls().is_empty());
        assert!(chat.messages().is_empty());
        assert!(!chat.is_loading());
    }

    #[tokio::test]
    async fn test_citations_are_deduplicated() {
        let backend = FakeBackend::new().replying(|_| {
            Ok(ChatResponse {
                answer: "Strong Rust background.".to_string(),
                citations: vec![cite("a.pdf", "1"), cite("a.pdf", "1"), cite("b.pdf", "2")],
            })
        });
        let mut chat = ChatSession::default();
        chat.input = "Summarize".to_string();

        chat.ask(&backend).await;

        let reply = &chat.messages()[1].content;
        assert_eq!(reply, "Strong Rust background.\n\nSources: [a.pdf#1], [b.pdf#2]");
    }

    #[tokio::test]
    async fn test_citations_can_be_hidden() {
        let backend = FakeBackend::new().replying(|_| {
            Ok(ChatResponse {
                answer: "Yes.".to_string(),
                citations: vec![cite("a.pdf", "1")],
            })
        });
        let mut chat = ChatSession::default();
        chat.show_citations = false;
        chat.input = "Any Python?".to_string();

        chat.ask(&backend).await;

        assert_eq!(chat.messages()[1].content, "Yes.");
    }

    #[tokio::test]
    async fn test_failure_appends_one_assistant_turn() {
        let backend = FakeBackend::new().replying(|_| {
            Err(ApiError::Status {
                status: 500,
                body: r#"{"detail": "index is empty"}"#.to_string(),
            })
        });
        let mut chat = ChatSession::default();
        chat.input = "Hello".to_string();

        chat.ask(&backend).await;

        assert_eq!(chat.messages().len(), 2);
        assert_eq!(chat.messages()[0], ChatMessage::user("Hello"));
        assert_eq!(chat.messages()[1].role, ChatRole::Assistant);
        assert_eq!(chat.messages()[1].content, "Request failed: 500 index is empty");
        assert!(chat.input.is_empty());
        assert!(!chat.is_loading());
    }

    #[tokio::test]
    async fn test_transcript_grows_by_two_per_exchange() {
        let backend = FakeBackend::new().replying(|request| {
            if request.query.contains("fail") {
                Err(ApiError::Task("connection reset".to_string()))
            } else {
                Ok(ChatResponse {
                    answer: format!("re: {}", request.query),
                    citations: Vec::new(),
                })
            }
        });
        let mut chat = ChatSession::default();

        for (i, query) in ["one", "please fail", "three"].iter().enumerate() {
            chat.input = query.to_string();
            chat.ask(&backend).await;
            assert_eq!(chat.messages().len(), 2 * (i + 1));
        }

        let roles: Vec<ChatRole> = chat.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
            ]
        );
        assert_eq!(
            chat.messages()[3].content,
            "Request failed: Background task failed: connection reset"
        );
    }

    #[test]
    fn test_submit_is_guarded_while_loading() {
        let mut chat = ChatSession::default();
        chat.input = "first".to_string();
        assert!(chat.submit().is_some());
        assert!(chat.is_loading());

        chat.input = "second".to_string();
        assert!(chat.submit().is_none());
        assert_eq!(chat.messages(), [ChatMessage::user("first")]);
    }

    #[test]
    fn test_model_routing_is_opt_in() {
        let mut config = Config::new();
        let mut chat = ChatSession::from_config(&config, Model::Grok);
        chat.input = "q".to_string();
        assert_eq!(chat.submit().unwrap().model, None);

        config.send_model = true;
        let mut chat = ChatSession::from_config(&config, Model::Grok);
        chat.input = "q".to_string();
        assert_eq!(chat.submit().unwrap().model.as_deref(), Some("grok"));
    }
}
