//! Debate personas and the prompt builder.

use super::{DebateSession, PersonaId};
use crate::provider::{ChatRequest, Message};
use arena_common::config::{DebateConfig, ReplyContext};

const SHARED_RULES: &str = "answer in the language of the first user message \
and keep using it for the whole debate, no matter what the other side does. \
write everything in lowercase, even names and the start of sentences. \
talk like a regular person arguing with a friend: casual, blunt, everyday words, \
no jargon, no lists, no headings. you are stubborn and you never concede. \
keep it short, a few sentences, and make your points interesting instead of obvious.";

/// Which side of the theme a persona argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    For,
    Against,
}

/// A scripted debater.
#[derive(Debug, Clone)]
pub struct Persona {
    pub id: PersonaId,
    pub name: String,
    pub stance: Stance,
    pub system_prompt: String,
}

impl Persona {
    /// Opens the debate and defends the theme.
    pub fn ai1() -> Self {
        Self {
            id: PersonaId::Ai1,
            name: "ai warrior 1".into(),
            stance: Stance::For,
            system_prompt: format!(
                "you are ai warrior 1 in a debate. {SHARED_RULES} \
                 on your first turn take a strong position in favour of the topic. \
                 on every later turn go after what ai warrior 2 just said and tear their argument apart."
            ),
        }
    }

    /// Always takes the opposite side of whatever ai1 just said.
    pub fn ai2() -> Self {
        Self {
            id: PersonaId::Ai2,
            name: "ai warrior 2".into(),
            stance: Stance::Against,
            system_prompt: format!(
                "you are ai warrior 2 in a debate. {SHARED_RULES} \
                 you always take the opposite position of whatever ai warrior 1 just said. \
                 if they call something good, you call it terrible. if they defend it, you attack it."
            ),
        }
    }
}

/// Builds the completion request for a persona's turn. Never mutates the
/// session.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    max_tokens: u32,
    reply_context: ReplyContext,
}

impl PromptBuilder {
    pub fn new(model: impl Into<String>, max_tokens: u32, reply_context: ReplyContext) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            reply_context,
        }
    }

    pub fn from_config(model: impl Into<String>, config: &DebateConfig) -> Self {
        Self::new(model, config.max_tokens, config.reply_context)
    }

    /// `[system, user]` request for `persona` speaking next in `session`.
    pub fn build(&self, persona: &Persona, session: &DebateSession) -> ChatRequest {
        let user = self.user_message(persona, session);
        ChatRequest::new(
            self.model.clone(),
            vec![Message::system(persona.system_prompt.as_str()), Message::user(user)],
            self.max_tokens,
        )
    }

    fn user_message(&self, persona: &Persona, session: &DebateSession) -> String {
        if session.transcript.is_empty() {
            return session.theme.clone();
        }

        match self.reply_context {
            ReplyContext::LastUtterance => {
                let opponent = persona.id.opponent();
                let last = session
                    .transcript
                    .iter()
                    .rev()
                    .find(|u| u.speaker == opponent)
                    .or_else(|| session.transcript.last());
                match last {
                    Some(utterance) => format!(
                        "debate topic: {}\n\nyour opponent just said:\n{}",
                        session.theme, utterance.text
                    ),
                    None => session.theme.clone(),
                }
            }
            ReplyContext::FullTranscript => {
                let mut prompt = format!("debate topic: {}\n\ndebate so far:\n", session.theme);
                for utterance in &session.transcript {
                    let label = if utterance.speaker == persona.id {
                        "you"
                    } else {
                        "opponent"
                    };
                    prompt.push_str(&format!("{label}: {}\n", utterance.text));
                }
                prompt.push_str("\nyour turn.");
                prompt
            }
        }
    }
}
