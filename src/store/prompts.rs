use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::prompt::{PromptKind, PromptTemplate};

/// Editable prompt templates keyed by operation (`categorization`, ...).
///
/// Serialized as a plain JSON object so the prompts file stays hand-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptCatalog {
    entries: BTreeMap<String, PromptTemplate>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        let entries = PromptKind::ALL
            .into_iter()
            .map(|kind| (kind.key().to_string(), default_prompt(kind)))
            .collect();
        Self { entries }
    }
}

pub fn default_prompt(kind: PromptKind) -> PromptTemplate {
    match kind {
        PromptKind::Categorization => PromptTemplate::new(
            "Email Categorization",
            "Categorize as Important, Newsletter, Spam, or To-Do.\nFrom: {from_sender}\nSubject: {subject}\nBody: {body}\nOne word only:",
        ),
        PromptKind::ActionExtraction => PromptTemplate::new(
            "Action Item Extraction",
            "Extract tasks.\nFrom: {from_sender}\nBody: {body}\nJSON array or []:",
        ),
        PromptKind::AutoReply => PromptTemplate::new(
            "Auto-Reply Draft",
            "Write professional reply.\nFrom: {from_sender}\nSubject: {subject}\nBody: {body}\nReply:",
        ),
        PromptKind::Summarization => PromptTemplate::new(
            "Email Summarization",
            "Summarize in 2 sentences.\nFrom: {from_sender}\nSubject: {subject}\nBody: {body}\nSummary:",
        ),
    }
}

impl PromptCatalog {
    pub fn get(&self, key: &str) -> Option<&PromptTemplate> {
        self.entries.get(key)
    }

    /// Template for `kind`, falling back to the built-in one when the file
    /// doesn't carry it.
    pub fn template(&self, kind: PromptKind) -> String {
        match self.entries.get(kind.key()) {
            Some(p) => p.template.clone(),
            None => default_prompt(kind).template,
        }
    }

    /// Replace the template of an existing entry. Unknown keys are ignored.
    pub fn update_template(&mut self, key: &str, template: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.template != template => {
                entry.template = template.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PromptTemplate)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_kind() {
        let catalog = PromptCatalog::default();
        assert_eq!(catalog.len(), PromptKind::ALL.len());
        for kind in PromptKind::ALL {
            assert!(catalog.contains(kind.key()));
        }
        assert_eq!(
            catalog.get("categorization").map(|p| p.name.as_str()),
            Some("Email Categorization")
        );
    }

    #[test]
    fn missing_entry_falls_back_to_default() {
        let catalog: PromptCatalog =
            serde_json::from_str(r#"{"summarization": {"name": "S", "template": "tl;dr {body}"}}"#)
                .unwrap();
        assert_eq!(catalog.template(PromptKind::Summarization), "tl;dr {body}");
        assert_eq!(
            catalog.template(PromptKind::AutoReply),
            default_prompt(PromptKind::AutoReply).template
        );
    }

    #[test]
    fn update_ignores_unknown_keys() {
        let mut catalog = PromptCatalog::default();
        assert!(catalog.update_template("auto_reply", "Be brief. {body}"));
        assert!(!catalog.update_template("auto_reply", "Be brief. {body}"));
        assert!(!catalog.update_template("translation", "x"));
        assert!(!catalog.contains("translation"));
        assert_eq!(catalog.template(PromptKind::AutoReply), "Be brief. {body}");
        // the label is untouched
        assert_eq!(catalog.get("auto_reply").unwrap().name, "Auto-Reply Draft");
    }

    #[test]
    fn serializes_as_plain_object() {
        let v = serde_json::to_value(PromptCatalog::default()).unwrap();
        assert_eq!(v["action_extraction"]["name"], "Action Item Extraction");
        assert!(v["categorization"]["template"].as_str().unwrap().contains("{from_sender}"));
    }
}
