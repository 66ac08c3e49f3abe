//! Tutor request assembly and history commit.

use super::{Level, TutorSession};
use crate::provider::{
    ChatRequest, ContentPart, FileAttachment, Message, MessageContent, Plugin, Provider,
};
use crate::store::SessionStore;
use arena_common::config::TutorConfig;
use arena_common::util::{short_id, truncate_with_ellipsis};
use arena_common::{Error, Result};
use std::sync::Arc;

const DEFAULT_FILENAME: &str = "document.pdf";

/// One chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub prompt: String,
    pub level: Option<Level>,
    pub document_prompt: bool,
    /// Base64 data URL of an uploaded PDF
    pub pdf_data: Option<String>,
    pub file_name: Option<String>,
    /// Absent means an ephemeral chat with no stored history
    pub session_id: Option<String>,
    pub referer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub has_annotations: bool,
}

/// How the current message relates to the session's document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentMode {
    /// A new (or renamed) PDF is attached and must be parsed
    Upload { file_name: String, data: String },
    /// A question about the already parsed PDF
    FollowUp { file_name: String },
    Plain,
}

impl DocumentMode {
    pub fn resolve(input: &ChatInput, session: &TutorSession) -> Self {
        if !input.document_prompt {
            return Self::Plain;
        }
        let current = session.current_document.as_deref().unwrap_or(DEFAULT_FILENAME);
        match &input.pdf_data {
            Some(data) if !data.is_empty() => {
                let file_name = input
                    .file_name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(DEFAULT_FILENAME);
                let same_document = session.current_document.as_deref() == Some(file_name);
                if session.annotations.is_none() || !same_document {
                    Self::Upload {
                        file_name: file_name.to_string(),
                        data: data.clone(),
                    }
                } else {
                    Self::FollowUp {
                        file_name: current.to_string(),
                    }
                }
            }
            _ if session.annotations.is_some() => Self::FollowUp {
                file_name: current.to_string(),
            },
            _ => Self::Plain,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::FollowUp { .. } => "follow_up",
            Self::Plain => "plain",
        }
    }

    /// Text stored in history for the user's message.
    fn history_text(&self, prompt: &str) -> String {
        match self {
            Self::Upload { file_name, .. } => format!("[Uploaded PDF: {file_name}] {prompt}"),
            Self::FollowUp { file_name } => format!("[Referring to PDF: {file_name}] {prompt}"),
            Self::Plain => prompt.to_string(),
        }
    }
}

/// Runs tutoring chats against a [`SessionStore`] of [`TutorSession`]s.
pub struct TutorEngine {
    store: Arc<dyn SessionStore<TutorSession>>,
    provider: Arc<dyn Provider>,
    model: String,
    config: TutorConfig,
}

impl TutorEngine {
    pub fn new(
        store: Arc<dyn SessionStore<TutorSession>>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        config: TutorConfig,
    ) -> Self {
        Self {
            store,
            provider,
            model: model.into(),
            config,
        }
    }

    /// Build the completion request for `input` against a session snapshot.
    pub fn build_request(
        &self,
        input: &ChatInput,
        level: Level,
        session: &TutorSession,
        mode: &DocumentMode,
    ) -> ChatRequest {
        let recent = session.recent(self.config.context_window);
        let replays_annotations = recent.iter().any(|m| m.annotations.is_some());

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(Message::system(level.system_prompt()));
        messages.extend_from_slice(recent);

        let user = match mode {
            DocumentMode::Upload { file_name, data } => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: input.prompt.clone(),
                },
                ContentPart::File {
                    file: FileAttachment {
                        filename: file_name.clone(),
                        file_data: data.clone(),
                    },
                },
            ]),
            _ => MessageContent::Text(input.prompt.clone()),
        };
        messages.push(Message::user(user));

        let mut request = ChatRequest::new(self.model.clone(), messages, self.config.max_tokens);
        let needs_parser = matches!(mode, DocumentMode::Upload { .. })
            || replays_annotations
            || (input.document_prompt && session.annotations.is_some());
        if needs_parser {
            request.plugins.push(Plugin::file_parser(self.config.pdf_engine.as_str()));
        }
        request.referer = input.referer.clone();
        request
    }

    /// Answer one tutoring message.
    ///
    /// With a session id the exchange is committed to that session (created
    /// lazily); without one nothing is stored. A failed remote call commits
    /// nothing.
    pub async fn chat(&self, input: ChatInput) -> Result<ChatReply> {
        let level = match input.level {
            Some(level) if !input.prompt.trim().is_empty() => level,
            _ => return Err(Error::InvalidInput("Prompt and level are required".into())),
        };

        let (session, existed) = match input.session_id.as_deref() {
            Some(id) if !id.is_empty() => match self.store.get(id).await {
                Ok(session) => (session, true),
                Err(e) if e.is_not_found() => (TutorSession::new(id), false),
                Err(e) => return Err(e),
            },
            _ => (TutorSession::new(String::new()), false),
        };
        let persistent = !session.id.is_empty();

        let mode = DocumentMode::resolve(&input, &session);
        let log_id = if persistent {
            short_id(&session.id)
        } else {
            "ephemeral".to_string()
        };
        tracing::info!(
            session = %log_id,
            level = %level,
            history = session.history.len(),
            mode = mode.label(),
            prompt = %truncate_with_ellipsis(&input.prompt, 50),
            "Tutor chat"
        );

        let request = self.build_request(&input, level, &session, &mode);
        let response = self.provider.chat(request).await?;
        let has_annotations = response.annotations.is_some();

        if persistent {
            let seen = session.updated_at;
            let mut updated = session;
            if let DocumentMode::Upload { file_name, .. } = &mode {
                updated.current_document = Some(file_name.clone());
                updated.annotations = None;
            }
            if let Some(annotations) = &response.annotations {
                updated.annotations = Some(annotations.clone());
            }

            let mut assistant = Message::assistant(response.content.clone());
            assistant.annotations = response.annotations;
            updated.push_exchange(
                Message::user(mode.history_text(&input.prompt)),
                assistant,
                self.config.history_limit,
            );

            if existed {
                let unchanged = move |current: &TutorSession| current.updated_at == seen;
                self.store.compare_and_update(updated, &unchanged).await?;
            } else {
                self.store.insert_new(updated).await?;
            }
        }

        Ok(ChatReply {
            response: response.content,
            has_annotations,
        })
    }

    /// Drop a session's history and document state. Returns whether it existed.
    pub async fn clear(&self, session_id: &str) -> Result<bool> {
        if session_id.is_empty() {
            return Err(Error::InvalidInput("Session ID is required".into()));
        }
        let existed = self.store.delete(session_id).await;
        if existed {
            tracing::info!(session = %short_id(session_id), "Tutor session cleared");
        } else {
            tracing::debug!(session = %short_id(session_id), "Tutor session not found for clearing");
        }
        Ok(existed)
    }

    pub async fn count(&self) -> usize {
        self.store.len().await
    }

    pub async fn list(&self) -> Vec<TutorSession> {
        self.store.list().await
    }

    /// Drop idle sessions, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }
}
