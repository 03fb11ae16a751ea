pub mod client;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::agent::client::{CompletionBackend, Sampling};
use crate::domain::email::{ActionItem, Category, EmailRecord};
use crate::domain::prompt::render;

const CATEGORIZE: Sampling = Sampling {
    temperature: 0.0,
    max_tokens: 50,
    top_p: None,
};
const EXTRACT: Sampling = Sampling {
    temperature: 0.0,
    max_tokens: 300,
    top_p: None,
};
const REPLY: Sampling = Sampling {
    temperature: 0.7,
    max_tokens: 500,
    top_p: Some(1.0),
};
const SUMMARIZE: Sampling = Sampling {
    temperature: 0.3,
    max_tokens: 300,
    top_p: Some(1.0),
};
const CHAT: Sampling = Sampling {
    temperature: 0.7,
    max_tokens: 400,
    top_p: None,
};

/// Runs prompt templates against the model and interprets the answers.
///
/// None of these calls fail: every error is logged and replaced by a
/// fallback (a default label, an empty list, or an error string shown in
/// place of the answer).
pub struct EmailAgent {
    backend: Box<dyn CompletionBackend>,
}

impl EmailAgent {
    pub fn new(backend: impl CompletionBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    fn run(&self, template: &str, email: &EmailRecord, sampling: Sampling) -> Result<String> {
        let prompt = render(template, email).map_err(|e| anyhow!("bad template: {e}"))?;
        let text = self.backend.complete(&prompt, sampling)?;
        Ok(text.trim().to_string())
    }

    pub fn categorize(&self, email: &EmailRecord, template: &str) -> Category {
        match self.run(template, email, CATEGORIZE) {
            Ok(text) => Category::from_model_output(&text),
            Err(e) => {
                log::warn!("categorization error for email {}: {e:#}", email.id);
                Category::FALLBACK
            }
        }
    }

    pub fn extract_actions(&self, email: &EmailRecord, template: &str) -> Vec<ActionItem> {
        let parsed = self
            .run(template, email, EXTRACT)
            .and_then(|text| parse_action_items(&text));
        match parsed {
            Ok(items) => items,
            Err(e) => {
                log::warn!("action extraction error for email {}: {e:#}", email.id);
                Vec::new()
            }
        }
    }

    pub fn generate_reply(&self, email: &EmailRecord, template: &str) -> String {
        self.run(template, email, REPLY).unwrap_or_else(|e| {
            log::warn!("reply generation error for email {}: {e:#}", email.id);
            format!("Reply generation error: {e:#}")
        })
    }

    pub fn summarize(&self, email: &EmailRecord, template: &str) -> String {
        self.run(template, email, SUMMARIZE).unwrap_or_else(|e| {
            log::warn!("summarization error for email {}: {e:#}", email.id);
            format!("Summarization error: {e:#}")
        })
    }

    pub fn chat(&self, query: &str, context: &str) -> String {
        let prompt = format!(
            "Context:\n{context}\n\nUser Question: {query}\n\nProvide a helpful answer based on the context."
        );
        match self.backend.complete(&prompt, CHAT) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                log::warn!("chat error: {e:#}");
                format!("Chat error: {e:#}")
            }
        }
    }
}

/// Pull a JSON array of tasks out of model output that may wrap it in prose
/// or code fences. Entries without a string `task` are dropped.
pub fn parse_action_items(text: &str) -> Result<Vec<ActionItem>> {
    let text = text.trim();
    let candidate = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };

    let value: Value = serde_json::from_str(candidate)?;
    let Value::Array(entries) = value else {
        return Ok(Vec::new());
    };

    Ok(entries
        .into_iter()
        .filter_map(ActionItem::from_json)
        .collect())
}
