use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::email::EmailRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Categorization,
    ActionExtraction,
    AutoReply,
    Summarization,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [
        PromptKind::Categorization,
        PromptKind::ActionExtraction,
        PromptKind::AutoReply,
        PromptKind::Summarization,
    ];

    /// Key used in the prompts file and the HTTP API.
    pub fn key(self) -> &'static str {
        match self {
            PromptKind::Categorization => "categorization",
            PromptKind::ActionExtraction => "action_extraction",
            PromptKind::AutoReply => "auto_reply",
            PromptKind::Summarization => "summarization",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub template: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    UnknownPlaceholder(String),
    UnbalancedBrace(usize),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownPlaceholder(name) => write!(f, "unknown placeholder {{{name}}}"),
            RenderError::UnbalancedBrace(at) => write!(f, "unbalanced brace at byte {at}"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Fill `{from_sender}`, `{subject}` and `{body}` from `email`.
///
/// `{{` and `}}` produce literal braces.
pub fn render(template: &str, email: &EmailRecord) -> Result<String, RenderError> {
    let sender = if email.sender.is_empty() {
        "Unknown"
    } else {
        email.sender.as_str()
    };
    let subject = if email.subject.is_empty() {
        "No Subject"
    } else {
        email.subject.as_str()
    };

    let mut out = String::with_capacity(template.len() + email.body.len());
    let mut chars = template.char_indices().peekable();

    while let Some((at, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(RenderError::UnbalancedBrace(at)),
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(RenderError::UnbalancedBrace(at));
                }
                match name.as_str() {
                    "from_sender" => out.push_str(sender),
                    "subject" => out.push_str(subject),
                    "body" => out.push_str(&email.body),
                    _ => return Err(RenderError::UnknownPlaceholder(name)),
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
