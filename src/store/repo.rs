use crate::domain::email::{CategoryFilter, DraftReply, EmailId, EmailPatch, EmailRecord};
use crate::domain::prompt::PromptKind;
use crate::store::prompts::PromptCatalog;

/// Everything the web layer needs from persistence.
///
/// Mutations persist immediately; write failures are logged by the
/// implementation, never surfaced. Methods taking an id return `false`
/// when no such email exists.
pub trait InboxRepository {
    fn emails(&self) -> &[EmailRecord];
    fn get_email(&self, id: EmailId) -> Option<&EmailRecord>;
    fn update_email(&mut self, id: EmailId, patch: EmailPatch) -> bool;

    /// Matching emails, newest timestamp first.
    fn emails_by_category(&self, filter: CategoryFilter) -> Vec<EmailRecord> {
        let mut out: Vec<EmailRecord> = self
            .emails()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    fn set_draft(&mut self, id: EmailId, draft: DraftReply) -> bool {
        self.update_email(id, EmailPatch::default().draft_reply(Some(draft)))
    }

    fn clear_draft(&mut self, id: EmailId) -> bool {
        self.update_email(id, EmailPatch::default().draft_reply(None))
    }

    fn reset_inbox(&mut self);

    fn prompts(&self) -> &PromptCatalog;

    fn prompt_template(&self, kind: PromptKind) -> String {
        self.prompts().template(kind)
    }

    fn update_prompt(&mut self, key: &str, template: &str) -> bool;
}
