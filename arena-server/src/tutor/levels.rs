//! Explanation levels and their system instructions.

use arena_common::{Error, Result};
use serde_json::Value;
use std::fmt;

const PREAMBLE: &str = "You have at most 2000 tokens, so fit your answer to that limit. \
CRITICAL: reply in the language the user wrote their first message in. \
IMPORTANT: you can see the conversation history. Use it to stay coherent, \
remember what the user told you, and build on earlier explanations.";

/// Depth of explanation, from 1 (young children) to 5 (doctoral).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Child,
    School,
    Undergraduate,
    Graduate,
    Researcher,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Child,
        Level::School,
        Level::Undergraduate,
        Level::Graduate,
        Level::Researcher,
    ];

    pub fn number(self) -> u8 {
        match self {
            Self::Child => 1,
            Self::School => 2,
            Self::Undergraduate => 3,
            Self::Graduate => 4,
            Self::Researcher => 5,
        }
    }

    /// Parse the `level` field of a chat request: a number or a numeric
    /// string between 1 and 5.
    pub fn from_json(value: &Value) -> Result<Self> {
        let number = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        number
            .and_then(|n| u8::try_from(n).ok())
            .and_then(|n| Self::try_from(n).ok())
            .ok_or_else(|| Error::InvalidInput(format!("Invalid level: {value}")))
    }

    /// Full system instruction for this level.
    pub fn system_prompt(self) -> String {
        let persona = match self {
            Self::Child => {
                "Act as a very kind and patient teacher of small children. Explain the \
                 concept with very simple words, short sentences and analogies a child \
                 of 5 to 8 understands. Avoid technical or scientific terms entirely. \
                 Use examples about games, animals or toys to keep it fun and clear."
            }
            Self::School => {
                "You are a school tutor for students aged 12 to 15. Explain the concept \
                 clearly and directly in easy language. You may introduce one or two key \
                 technical terms as long as you explain them in context. Use practical \
                 examples or slightly richer analogies."
            }
            Self::Undergraduate => {
                "You are a research assistant explaining concepts to a first-year \
                 university student. Give a structured explanation someone just out of \
                 high school can follow. Include the simplest formal definitions, the \
                 fundamental principles and the key steps of the process. Use the \
                 proper terminology, give a complete overview and explain the basics \
                 when needed."
            }
            Self::Graduate => {
                "You are an expert in the subject explaining it to a colleague who is \
                 about to graduate and already knows the field well. Use intermediate \
                 terminology without defining it, unless a term is truly advanced. Go \
                 straight to the details: mechanisms, pathways, exceptions and \
                 components. Skip analogies and basic summaries."
            }
            Self::Researcher => {
                "You are a senior researcher explaining the concept at a doctoral level. \
                 Do not cover the fundamentals. Focus on open controversies, current \
                 challenges, new research directions, advanced theoretical models and \
                 the relevance of recent literature. Refer to the relevant models or \
                 equations."
            }
        };
        format!("{PREAMBLE} {persona}")
    }
}

impl TryFrom<u8> for Level {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Child),
            2 => Ok(Self::School),
            3 => Ok(Self::Undergraduate),
            4 => Ok(Self::Graduate),
            5 => Ok(Self::Researcher),
            other => Err(Error::InvalidInput(format!("Invalid level: {other}"))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}
