use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::email::{EmailId, EmailPatch, EmailRecord};
use crate::store::prompts::PromptCatalog;
use crate::store::repo::InboxRepository;

/// On-disk shape of the inbox file.
#[derive(Deserialize)]
struct InboxDocument {
    #[serde(default)]
    emails: Vec<Value>,
}

/// Records as read from disk. Entries that don't form an email (no usable
/// `id`, not an object) are kept verbatim so a rewrite doesn't lose them.
#[derive(Default)]
struct LoadedInbox {
    emails: Vec<EmailRecord>,
    unreadable: Vec<Value>,
}

/// Two JSON files held wholesale in memory and rewritten on every change.
pub struct JsonStore {
    inbox_path: PathBuf,
    prompts_path: PathBuf,
    emails: Vec<EmailRecord>,
    unreadable: Vec<Value>,
    prompts: PromptCatalog,
}

impl JsonStore {
    /// Never fails: unreadable files degrade to an empty inbox and the
    /// built-in prompts.
    pub fn open(inbox_path: impl Into<PathBuf>, prompts_path: impl Into<PathBuf>) -> Self {
        let inbox_path = inbox_path.into();
        let prompts_path = prompts_path.into();

        let loaded = match load_emails(&inbox_path) {
            Ok(Some(loaded)) => {
                log::info!(
                    "loaded {} emails from {}",
                    loaded.emails.len(),
                    inbox_path.display()
                );
                loaded
            }
            Ok(None) => {
                log::info!("no inbox at {}, starting empty", inbox_path.display());
                LoadedInbox::default()
            }
            Err(e) => {
                log::error!("error loading emails: {e:#}");
                LoadedInbox::default()
            }
        };

        let prompts = match load_prompts(&prompts_path) {
            Ok(Some(p)) => p,
            Ok(None) => PromptCatalog::default(),
            Err(e) => {
                log::error!("error loading prompts: {e:#}");
                PromptCatalog::default()
            }
        };

        Self {
            inbox_path,
            prompts_path,
            emails: loaded.emails,
            unreadable: loaded.unreadable,
            prompts,
        }
    }

    pub fn inbox_path(&self) -> &Path {
        &self.inbox_path
    }

    pub fn prompts_path(&self) -> &Path {
        &self.prompts_path
    }

    fn save_emails(&self) {
        let emails: Vec<StoredEmail<'_>> = self
            .emails
            .iter()
            .map(StoredEmail::Parsed)
            .chain(self.unreadable.iter().map(StoredEmail::Raw))
            .collect();
        let doc = InboxDocumentRef { emails: &emails };
        if let Err(e) = write_json(&self.inbox_path, &doc) {
            log::error!("error saving emails: {e:#}");
        }
    }

    fn save_prompts(&self) {
        if let Err(e) = write_json(&self.prompts_path, &self.prompts) {
            log::error!("error saving prompts: {e:#}");
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum StoredEmail<'a> {
    Parsed(&'a EmailRecord),
    Raw(&'a Value),
}

#[derive(Serialize)]
struct InboxDocumentRef<'a> {
    emails: &'a [StoredEmail<'a>],
}

fn load_emails(path: &Path) -> Result<Option<LoadedInbox>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: InboxDocument =
        serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;

    let mut loaded = LoadedInbox::default();
    for (index, raw) in doc.emails.into_iter().enumerate() {
        match EmailRecord::deserialize(&raw) {
            Ok(email) => loaded.emails.push(email),
            Err(e) => {
                log::warn!("skipping unreadable email #{index} in {}: {e}", path.display());
                loaded.unreadable.push(raw);
            }
        }
    }
    Ok(Some(loaded))
}

fn load_prompts(path: &Path) -> Result<Option<PromptCatalog>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let catalog =
        serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(catalog))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

impl InboxRepository for JsonStore {
    fn emails(&self) -> &[EmailRecord] {
        &self.emails
    }

    fn get_email(&self, id: EmailId) -> Option<&EmailRecord> {
        self.emails.iter().find(|e| e.id == id)
    }

    fn update_email(&mut self, id: EmailId, patch: EmailPatch) -> bool {
        let Some(email) = self.emails.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        email.apply(patch);
        self.save_emails();
        true
    }

    fn reset_inbox(&mut self) {
        for email in &mut self.emails {
            email.clear_derived();
        }
        self.save_emails();
    }

    fn prompts(&self) -> &PromptCatalog {
        &self.prompts
    }

    fn update_prompt(&mut self, key: &str, template: &str) -> bool {
        let changed = self.prompts.update_template(key, template);
        if changed {
            self.save_prompts();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email::{ActionItem, Category, CategoryFilter, DraftReply};
    use crate::domain::prompt::PromptKind;
    use crate::store::prompts::default_prompt;
    use serde_json::Value;

    const INBOX: &str = r#"{
      "emails": [
        {"id": 1, "from": "boss@corp.com", "subject": "Deck", "body": "Send the deck.",
         "timestamp": "2024-05-01T09:00:00", "read": false},
        {"id": 2, "from": "news@techly.io", "subject": "Weekly", "body": "News.",
         "timestamp": "2024-05-03T08:00:00", "category": "Newsletter"},
        {"id": 3, "from": "friend@mail.com", "subject": "Lunch?", "body": "Noon?",
         "timestamp": "2024-05-02T12:30:00", "category": ""}
      ]
    }"#;

    fn store_with_inbox() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("mock_inbox.json");
        fs::write(&inbox, INBOX).unwrap();
        let store = JsonStore::open(inbox, dir.path().join("prompts.json"));
        (dir, store)
    }

    fn reload(store: &JsonStore) -> JsonStore {
        JsonStore::open(store.inbox_path(), store.prompts_path())
    }

    #[test]
    fn missing_files_give_empty_inbox_and_default_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("nope.json"), dir.path().join("nope2.json"));
        assert!(store.emails().is_empty());
        assert_eq!(store.prompts(), &PromptCatalog::default());
        // nothing is written until something changes
        assert!(!dir.path().join("nope.json").exists());
    }

    #[test]
    fn malformed_files_degrade_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox.json");
        let prompts = dir.path().join("prompts.json");
        fs::write(&inbox, "{ not json").unwrap();
        fs::write(&prompts, "[1, 2").unwrap();
        let store = JsonStore::open(&inbox, &prompts);
        assert!(store.emails().is_empty());
        assert_eq!(store.prompts(), &PromptCatalog::default());
    }

    #[test]
    fn load_fills_defaults() {
        let (_dir, store) = store_with_inbox();
        assert_eq!(store.emails().len(), 3);
        for e in store.emails() {
            assert!(e.action_items.is_empty());
            assert!(e.draft_reply.is_none());
        }
        assert_eq!(store.get_email(2).unwrap().category, Some(Category::Newsletter));
        assert_eq!(store.get_email(3).unwrap().category, None);
        assert!(store.get_email(42).is_none());
    }

    #[test]
    fn uncategorized_filter_and_sorting() {
        let (_dir, store) = store_with_inbox();

        let ids = |f: CategoryFilter| -> Vec<EmailId> {
            store.emails_by_category(f).iter().map(|e| e.id).collect()
        };
        assert_eq!(ids(CategoryFilter::All), vec![2, 3, 1]);
        assert_eq!(ids(CategoryFilter::Uncategorized), vec![3, 1]);
        assert_eq!(ids(CategoryFilter::Only(Category::Newsletter)), vec![2]);
        assert_eq!(ids(CategoryFilter::Only(Category::Spam)), Vec::<EmailId>::new());
        assert_eq!(ids(CategoryFilter::Unknown), Vec::<EmailId>::new());

        // equal timestamps keep file order
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox.json");
        fs::write(
            &inbox,
            r#"{"emails": [
                {"id": 10, "timestamp": "2024-05-01T09:00:00"},
                {"id": 11, "timestamp": "2024-05-02T09:00:00"},
                {"id": 12, "timestamp": "2024-05-01T09:00:00"},
                {"id": 13, "timestamp": "2024-05-01T09:00:00"}
            ]}"#,
        )
        .unwrap();
        let store = JsonStore::open(inbox, dir.path().join("prompts.json"));
        let ids: Vec<EmailId> = store
            .emails_by_category(CategoryFilter::All)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![11, 10, 12, 13]);
    }

    #[test]
    fn update_persists_merge_without_touching_others() {
        let (_dir, mut store) = store_with_inbox();
        let before_other = store.get_email(2).unwrap().clone();

        let patch = EmailPatch::default()
            .category(Some(Category::ToDo))
            .action_items(vec![ActionItem::new("send deck")]);
        assert!(store.update_email(1, patch));
        assert!(!store.update_email(99, EmailPatch::default().category(None)));

        let reloaded = reload(&store);
        let e1 = reloaded.get_email(1).unwrap();
        assert_eq!(e1.category, Some(Category::ToDo));
        assert_eq!(e1.action_items, vec![ActionItem::new("send deck")]);
        assert_eq!(e1.subject, "Deck");
        assert_eq!(e1.extra.get("read"), Some(&Value::Bool(false)));
        assert_eq!(reloaded.get_email(2).unwrap(), &before_other);
    }

    #[test]
    fn drafts_save_and_delete() {
        let (_dir, mut store) = store_with_inbox();
        let draft = DraftReply {
            body: Some("Sure, noon works.".into()),
            ..Default::default()
        };
        assert!(store.set_draft(3, draft.clone()));
        assert_eq!(reload(&store).get_email(3).unwrap().draft_reply, Some(draft));

        assert!(store.clear_draft(3));
        assert_eq!(reload(&store).get_email(3).unwrap().draft_reply, None);
    }

    #[test]
    fn reset_clears_only_derived_fields() {
        let (_dir, mut store) = store_with_inbox();
        store.update_email(
            1,
            EmailPatch::default()
                .category(Some(Category::Important))
                .action_items(vec![ActionItem::new("x")])
                .draft_reply(Some(DraftReply::default())),
        );
        let originals: Vec<_> = store
            .emails()
            .iter()
            .map(|e| (e.id, e.sender.clone(), e.subject.clone(), e.body.clone(), e.timestamp.clone()))
            .collect();

        store.reset_inbox();

        let reloaded = reload(&store);
        for e in reloaded.emails() {
            assert_eq!(e.category, None);
            assert!(e.action_items.is_empty());
            assert_eq!(e.draft_reply, None);
        }
        let after: Vec<_> = reloaded
            .emails()
            .iter()
            .map(|e| (e.id, e.sender.clone(), e.subject.clone(), e.body.clone(), e.timestamp.clone()))
            .collect();
        assert_eq!(originals, after);
    }

    #[test]
    fn one_bad_record_does_not_cost_the_inbox() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox.json");
        fs::write(
            &inbox,
            r#"{"emails": [
                {"id": 1, "from": "a@b.c", "subject": "Hi", "body": "x", "timestamp": "2024-05-01"},
                {"id": 2, "from": "d@e.f", "subject": null, "body": "y", "timestamp": "2024-05-02",
                 "category": "Spam", "action_items": [{"title": "old"}, {"task": "new"}]},
                {"subject": "no id at all"}
            ]}"#,
        )
        .unwrap();

        let mut store = JsonStore::open(&inbox, dir.path().join("prompts.json"));
        assert_eq!(store.emails().len(), 2);
        let second = store.get_email(2).unwrap();
        assert_eq!(second.subject, "");
        assert_eq!(second.action_items, vec![ActionItem::new("new")]);

        store.reset_inbox();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&inbox).unwrap()).unwrap();
        let emails = raw["emails"].as_array().unwrap();
        assert_eq!(emails.len(), 3);
        assert_eq!(emails[1]["from"], "d@e.f");
        assert!(emails[1]["category"].is_null());
        assert_eq!(emails[2], serde_json::json!({"subject": "no id at all"}));

        let reloaded = reload(&store);
        assert_eq!(reloaded.emails().len(), 2);
    }

    #[test]
    fn prompt_updates_persist() {
        let (_dir, mut store) = store_with_inbox();
        assert!(store.update_prompt("summarization", "One line: {body}"));
        assert!(!store.update_prompt("nonsense", "x"));

        let reloaded = reload(&store);
        assert_eq!(reloaded.prompt_template(PromptKind::Summarization), "One line: {body}");
        assert_eq!(
            reloaded.prompt_template(PromptKind::Categorization),
            default_prompt(PromptKind::Categorization).template
        );
    }

    #[test]
    fn written_document_keeps_unicode() {
        let (_dir, mut store) = store_with_inbox();
        store.set_draft(
            1,
            DraftReply {
                body: Some("Grüße".into()),
                ..Default::default()
            },
        );
        let raw = fs::read_to_string(store.inbox_path()).unwrap();
        assert!(raw.contains("Grüße"));
        assert!(raw.starts_with("{\n  \"emails\""));
    }
}
