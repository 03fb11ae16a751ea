//! `/api/*` request handling, independent of the socket layer.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tiny_http::Method;

use crate::agent::EmailAgent;
use crate::domain::email::{CategoryFilter, DraftReply, EmailId, EmailRecord};
use crate::domain::prompt::PromptKind;
use crate::process::process_inbox;
use crate::store::repo::InboxRepository;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn message(msg: impl Into<String>) -> Self {
        Self::ok(json!({ "message": msg.into() }))
    }

    fn error(status: u16, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": msg.into() }),
        }
    }

    fn not_found() -> Self {
        Self::error(404, "Email not found")
    }

    fn unavailable() -> Self {
        Self::error(503, "Agent not initialized")
    }
}

#[derive(Deserialize)]
struct EmailIdBody {
    email_id: Option<EmailId>,
}

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    query: String,
    #[serde(default)]
    context: String,
}

#[derive(Deserialize)]
struct DraftBody {
    email_id: Option<EmailId>,
    /// Absent is an error; `null` clears the stored draft.
    #[serde(default, deserialize_with = "present")]
    draft: Option<Option<DraftReply>>,
}

fn present<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(de).map(Some)
}

/// Store plus the optional inference agent; `agent` is `None` when no API
/// key was configured.
pub struct App {
    pub repo: Box<dyn InboxRepository>,
    pub agent: Option<EmailAgent>,
}

impl App {
    pub fn new(repo: impl InboxRepository + 'static, agent: Option<EmailAgent>) -> Self {
        Self {
            repo: Box::new(repo),
            agent,
        }
    }

    /// `path` is the URL path (`/api/...`), `query` the raw query string.
    pub fn handle(
        &mut self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: &[u8],
    ) -> ApiResponse {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (Method::Get, ["api", "emails"]) => self.list_emails(query),
            (Method::Get, ["api", "emails", id]) => match id.parse::<EmailId>() {
                Ok(id) => self.get_email(id),
                Err(_) => ApiResponse::error(404, "Not found"),
            },
            (Method::Post, ["api", "process"]) => self.process(),
            (Method::Post, ["api", "generate_reply"]) => self.generate_reply(body),
            (Method::Post, ["api", "summarize"]) => self.summarize(body),
            (Method::Post, ["api", "chat"]) => self.chat(body),
            (Method::Post, ["api", "drafts"]) => self.save_draft(body),
            (Method::Delete, ["api", "delete_draft", id]) => match id.parse::<EmailId>() {
                Ok(id) => self.delete_draft(id),
                Err(_) => ApiResponse::error(404, "Not found"),
            },
            (Method::Get, ["api", "prompts"]) => self.get_prompts(),
            (Method::Post, ["api", "prompts"]) => self.update_prompts(body),
            (Method::Post, ["api", "reset"]) => self.reset(),
            (_, segs) if is_known_route(segs) => ApiResponse::error(405, "Method not allowed"),
            _ => ApiResponse::error(404, "Not found"),
        }
    }

    fn list_emails(&self, query: Option<&str>) -> ApiResponse {
        let category = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "category")
                .map(|(_, v)| v.into_owned())
        });
        let filter = CategoryFilter::parse(category.as_deref());
        to_response(&self.repo.emails_by_category(filter))
    }

    fn get_email(&self, id: EmailId) -> ApiResponse {
        match self.repo.get_email(id) {
            Some(email) => to_response(email),
            None => ApiResponse::not_found(),
        }
    }

    fn process(&mut self) -> ApiResponse {
        let Some(agent) = &self.agent else {
            return ApiResponse::unavailable();
        };
        let count = process_inbox(self.repo.as_mut(), agent);
        ApiResponse::message(format!("Processed {count} emails"))
    }

    fn generate_reply(&self, body: &[u8]) -> ApiResponse {
        self.with_email(body, PromptKind::AutoReply, |agent, email, template| {
            json!({ "reply": agent.generate_reply(email, template) })
        })
    }

    fn summarize(&self, body: &[u8]) -> ApiResponse {
        self.with_email(body, PromptKind::Summarization, |agent, email, template| {
            json!({ "summary": agent.summarize(email, template) })
        })
    }

    /// Shared shape of the single-email inference endpoints.
    fn with_email(
        &self,
        body: &[u8],
        kind: PromptKind,
        f: impl FnOnce(&EmailAgent, &EmailRecord, &str) -> Value,
    ) -> ApiResponse {
        let Some(agent) = &self.agent else {
            return ApiResponse::unavailable();
        };
        let req: EmailIdBody = match parse_body(body) {
            Ok(r) => r,
            Err(resp) => return resp,
        };
        let Some(id) = req.email_id else {
            return ApiResponse::error(400, "email_id is required");
        };
        let Some(email) = self.repo.get_email(id) else {
            return ApiResponse::not_found();
        };
        let template = self.repo.prompt_template(kind);
        ApiResponse::ok(f(agent, email, &template))
    }

    fn chat(&self, body: &[u8]) -> ApiResponse {
        let Some(agent) = &self.agent else {
            return ApiResponse::unavailable();
        };
        let req: ChatBody = match parse_body(body) {
            Ok(r) => r,
            Err(resp) => return resp,
        };
        ApiResponse::ok(json!({ "response": agent.chat(&req.query, &req.context) }))
    }

    fn save_draft(&mut self, body: &[u8]) -> ApiResponse {
        let req: DraftBody = match parse_body(body) {
            Ok(r) => r,
            Err(resp) => return resp,
        };
        let (Some(id), Some(draft)) = (req.email_id, req.draft) else {
            return ApiResponse::error(400, "email_id and draft are required");
        };
        let saved = match draft {
            Some(draft) => self.repo.set_draft(id, draft),
            None => self.repo.clear_draft(id),
        };
        if saved {
            ApiResponse::message("Draft saved")
        } else {
            ApiResponse::not_found()
        }
    }

    fn delete_draft(&mut self, id: EmailId) -> ApiResponse {
        if self.repo.clear_draft(id) {
            ApiResponse::message("Draft deleted")
        } else {
            ApiResponse::not_found()
        }
    }

    fn get_prompts(&self) -> ApiResponse {
        to_response(self.repo.prompts())
    }

    fn update_prompts(&mut self, body: &[u8]) -> ApiResponse {
        let updates: Map<String, Value> = match parse_body(body) {
            Ok(r) => r,
            Err(resp) => return resp,
        };
        for (key, value) in &updates {
            if let Some(template) = value.get("template").and_then(Value::as_str) {
                self.repo.update_prompt(key, template);
            }
        }
        ApiResponse::message("Prompts updated")
    }

    fn reset(&mut self) -> ApiResponse {
        self.repo.reset_inbox();
        ApiResponse::message("Inbox reset successfully")
    }
}

fn is_known_route(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["api", "emails"]
            | ["api", "emails", _]
            | ["api", "process"]
            | ["api", "generate_reply"]
            | ["api", "summarize"]
            | ["api", "chat"]
            | ["api", "drafts"]
            | ["api", "delete_draft", _]
            | ["api", "prompts"]
            | ["api", "reset"]
    )
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiResponse> {
    serde_json::from_slice(body).map_err(|e| ApiResponse::error(400, format!("invalid JSON body: {e}")))
}

fn to_response<T: serde::Serialize + ?Sized>(value: &T) -> ApiResponse {
    match serde_json::to_value(value) {
        Ok(v) => ApiResponse::ok(v),
        Err(e) => {
            log::error!("failed to serialize response: {e}");
            ApiResponse::error(500, "Internal error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::json::JsonStore;

    fn empty_app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("i.json"), dir.path().join("p.json"));
        (dir, App::new(store, None))
    }

    #[test]
    fn unknown_routes_and_methods() {
        let (_dir, mut app) = empty_app();
        assert_eq!(app.handle(&Method::Get, "/api/nothing", None, b"").status, 404);
        assert_eq!(app.handle(&Method::Get, "/api/emails/abc", None, b"").status, 404);
        assert_eq!(app.handle(&Method::Delete, "/api/emails", None, b"").status, 405);
        assert_eq!(app.handle(&Method::Get, "/api/process", None, b"").status, 405);
    }

    #[test]
    fn inference_routes_need_an_agent() {
        let (_dir, mut app) = empty_app();
        for path in ["/api/process", "/api/generate_reply", "/api/summarize", "/api/chat"] {
            let resp = app.handle(&Method::Post, path, None, br#"{"email_id": 1}"#);
            assert_eq!(resp.status, 503, "{path}");
            assert_eq!(resp.body["error"], "Agent not initialized");
        }
    }

    #[test]
    fn bad_bodies_are_rejected() {
        let (_dir, mut app) = empty_app();
        assert_eq!(app.handle(&Method::Post, "/api/drafts", None, b"nope").status, 400);
        assert_eq!(app.handle(&Method::Post, "/api/drafts", None, b"{}").status, 400);
        assert_eq!(app.handle(&Method::Post, "/api/prompts", None, b"[]").status, 400);
        assert_eq!(
            app.handle(&Method::Post, "/api/drafts", None, br#"{"email_id": 1}"#).status,
            400
        );
    }
}
