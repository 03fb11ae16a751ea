use percent_encoding::percent_decode_str;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Map a request path onto a file under `root`. `/` serves `index.html`;
/// anything that would climb out of `root` is refused. `url_path` is still
/// percent-encoded.
pub fn resolve(root: &Path, url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    let rel = decoded.trim_start_matches('/');
    let rel = if rel.is_empty() { "index.html" } else { rel };

    let rel = Path::new(rel);
    if !rel
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(rel))
}

pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Read a static asset, `None` when it doesn't exist or isn't a file.
pub fn load(root: &Path, url_path: &str) -> Option<(Vec<u8>, &'static str)> {
    let path = resolve(root, url_path)?;
    if !path.is_file() {
        return None;
    }
    match fs::read(&path) {
        Ok(bytes) => Some((bytes, content_type(&path))),
        Err(e) => {
            log::warn!("failed to read {}: {e}", path.display());
            None
        }
    }
}
