use crate::agent::EmailAgent;
use crate::domain::email::{EmailId, EmailPatch};
use crate::domain::prompt::PromptKind;
use crate::store::repo::InboxRepository;

/// Categorize every email and extract its action items, persisting each
/// result as it arrives. Returns the number of emails processed.
pub fn process_inbox(repo: &mut dyn InboxRepository, agent: &EmailAgent) -> usize {
    let ids: Vec<EmailId> = repo.emails().iter().map(|e| e.id).collect();
    let mut count = 0;

    for id in ids {
        let Some(email) = repo.get_email(id).cloned() else {
            continue;
        };

        let category = agent.categorize(&email, &repo.prompt_template(PromptKind::Categorization));
        let actions =
            agent.extract_actions(&email, &repo.prompt_template(PromptKind::ActionExtraction));
        log::debug!(
            "email {id}: {category}, {} action item(s)",
            actions.len()
        );

        repo.update_email(
            id,
            EmailPatch::default()
                .category(Some(category))
                .action_items(actions),
        );
        count += 1;
    }

    log::info!("processed {count} emails");
    count
}
