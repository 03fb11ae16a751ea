use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type EmailId = i64;

/// Fixed label set the classifier maps model output onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Important,
    Newsletter,
    Spam,
    #[serde(rename = "To-Do")]
    ToDo,
}

impl Category {
    /// Label order matters: the first label contained in model output wins.
    pub const ALL: [Category; 4] = [
        Category::Important,
        Category::Newsletter,
        Category::Spam,
        Category::ToDo,
    ];

    /// Used whenever the model answer can't be mapped onto a label.
    pub const FALLBACK: Category = Category::Important;

    pub fn label(self) -> &'static str {
        match self {
            Category::Important => "Important",
            Category::Newsletter => "Newsletter",
            Category::Spam => "Spam",
            Category::ToDo => "To-Do",
        }
    }

    /// Exact label match (case-insensitive).
    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s))
    }

    /// Containment match against free-form model output.
    pub fn from_model_output(text: &str) -> Self {
        let lowered = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| lowered.contains(&c.label().to_lowercase()))
            .unwrap_or(Self::FALLBACK)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stored labels are hand-editable; anything we don't recognise loads as
/// "uncategorized" instead of failing the whole document.
fn lenient_category<'de, D>(de: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(de)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            let parsed = Category::from_label(&s);
            if parsed.is_none() {
                log::warn!("ignoring unknown stored category {s:?}");
            }
            parsed
        }
        _ => None,
    })
}

/// Text fields written by hand may be `null` or a number; neither should
/// cost the record.
fn lenient_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(de)?;
    Ok(match raw {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// Keeps the usable items; entries without a string `task` are dropped.
fn lenient_action_items<'de, D>(de: D) -> Result<Vec<ActionItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(de)?;
    Ok(match raw {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|v| {
                let item = ActionItem::from_json(v.clone());
                if item.is_none() {
                    log::warn!("dropping stored action item without a task: {v}");
                }
                item
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            log::warn!("ignoring stored action_items that aren't a list: {other}");
            Vec::new()
        }
    })
}

fn lenient_draft<'de, D>(de: D) -> Result<Option<DraftReply>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(de)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(v) => match serde_json::from_value(v) {
            Ok(draft) => Some(draft),
            Err(e) => {
                log::warn!("ignoring unreadable stored draft: {e}");
                None
            }
        },
    })
}

/// A task pulled out of an email. The model decides what else goes with it
/// (`deadline`, `priority`, ...), so everything besides `task` is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub task: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionItem {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            extra: Map::new(),
        }
    }

    /// Accepts only objects carrying a string `task`.
    pub fn from_json(value: Value) -> Option<Self> {
        if !value.get("task").is_some_and(Value::is_string) {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    pub fn deadline(&self) -> Option<&str> {
        self.extra.get("deadline").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: EmailId,
    #[serde(rename = "from", default, deserialize_with = "lenient_string")]
    pub sender: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: String,
    /// ISO-8601, compared as a plain string.
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "lenient_action_items")]
    pub action_items: Vec<ActionItem>,
    #[serde(default, deserialize_with = "lenient_draft")]
    pub draft_reply: Option<DraftReply>,
    /// Fields we don't model (e.g. `read`) ride along untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmailRecord {
    pub fn new(
        id: EmailId,
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id,
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            timestamp: timestamp.into(),
            category: None,
            action_items: Vec::new(),
            draft_reply: None,
            extra: Map::new(),
        }
    }

    /// Drop everything the agent derived from the message.
    pub fn clear_derived(&mut self) {
        self.category = None;
        self.action_items.clear();
        self.draft_reply = None;
    }

    pub fn apply(&mut self, patch: EmailPatch) {
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(items) = patch.action_items {
            self.action_items = items;
        }
        if let Some(draft) = patch.draft_reply {
            self.draft_reply = draft;
        }
    }
}

/// Field-level update: `None` leaves a field alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailPatch {
    pub category: Option<Option<Category>>,
    pub action_items: Option<Vec<ActionItem>>,
    pub draft_reply: Option<Option<DraftReply>>,
}

impl EmailPatch {
    pub fn category(mut self, category: Option<Category>) -> Self {
        self.category = Some(category);
        self
    }

    pub fn action_items(mut self, items: Vec<ActionItem>) -> Self {
        self.action_items = Some(items);
        self
    }

    pub fn draft_reply(mut self, draft: Option<DraftReply>) -> Self {
        self.draft_reply = Some(draft);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Uncategorized,
    Only(Category),
    /// A label outside the fixed set; matches nothing.
    Unknown,
}

impl CategoryFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("All") => CategoryFilter::All,
            Some("Uncategorized") => CategoryFilter::Uncategorized,
            Some(label) => Category::ALL
                .into_iter()
                .find(|c| c.label() == label)
                .map(CategoryFilter::Only)
                .unwrap_or(CategoryFilter::Unknown),
        }
    }

    pub fn matches(&self, email: &EmailRecord) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Uncategorized => email.category.is_none(),
            CategoryFilter::Only(c) => email.category == Some(*c),
            CategoryFilter::Unknown => false,
        }
    }
}
