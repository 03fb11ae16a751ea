pub mod routes;
pub mod static_files;

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;

use crate::server::routes::{ApiResponse, App};

pub struct ServerConfig {
    pub bind: String,
    pub static_dir: PathBuf,
    pub open_browser: bool,
}

/// Serve until Ctrl-C. One request at a time: a slow model call holds up
/// everything behind it.
pub fn run_server(app: &mut App, cfg: &ServerConfig) -> Result<()> {
    let server = Server::http(cfg.bind.as_str())
        .map_err(|e| anyhow!("Failed to bind web server on {}: {e}", cfg.bind))?;
    log::info!("listening on http://{}", cfg.bind);

    // only after binding, so the first page load can't race the listener
    if cfg.open_browser {
        let url = format!("http://{}/", cfg.bind);
        // best-effort: don't fail if browser can't be opened
        if let Err(e) = open::that(&url) {
            eprintln!("Warning: could not open browser automatically: {e}");
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };

        let Some(request) = maybe_request else {
            continue;
        };

        if let Err(e) = handle_request(app, cfg, request) {
            log::warn!("failed to answer request: {e:#}");
        }
    }

    log::info!("shutting down");
    Ok(())
}

fn handle_request(app: &mut App, cfg: &ServerConfig, mut request: Request) -> Result<()> {
    let method = request.method().clone();

    // request.url() is a path+query like "/api/emails?category=Spam"
    let full = format!("http://localhost{}", request.url());
    let Ok(parsed) = Url::parse(&full) else {
        let status = 400;
        log::info!("{method} {} -> {status}", request.url());
        request.respond(json_response(&ApiResponse {
            status,
            body: serde_json::json!({ "error": "Bad request" }),
        }))?;
        return Ok(());
    };
    let path = parsed.path().to_string();

    if path == "/api" || path.starts_with("/api/") {
        let mut body = Vec::new();
        request.as_reader().read_to_end(&mut body)?;

        let resp = app.handle(&method, &path, parsed.query(), &body);
        log::info!("{method} {path} -> {}", resp.status);
        request.respond(json_response(&resp))?;
        return Ok(());
    }

    if method != Method::Get && method != Method::Head {
        log::info!("{method} {path} -> 405");
        request.respond(Response::from_string("Method not allowed").with_status_code(405))?;
        return Ok(());
    }

    match static_files::load(&cfg.static_dir, &path) {
        Some((bytes, content_type)) => {
            log::info!("{method} {path} -> 200");
            let mut resp = Response::from_data(bytes);
            if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
                resp.add_header(h);
            }
            request.respond(resp)?;
        }
        None => {
            log::info!("{method} {path} -> 404");
            request.respond(Response::from_string("Not found").with_status_code(404))?;
        }
    }
    Ok(())
}

fn json_response(resp: &ApiResponse) -> Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_vec(&resp.body).unwrap_or_default();
    let mut out = Response::from_data(body).with_status_code(resp.status);
    if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        out.add_header(h);
    }
    out
}
