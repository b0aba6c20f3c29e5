//! HTTP response handlers.

use std::{
    borrow::Cow,
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::mime::{self, types};
use super::reload;

/// Characters escaped in listing hrefs.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'<')
    .add(b'>')
    .add(b'?');

/// Respond with a file from the output tree. HTML gets the reload script
/// when `live_reload` is on.
pub fn respond_file(request: Request, path: &Path, live_reload: bool) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let body = maybe_inject(body, content_type, live_reload);
    send_body(request, 200, content_type, body)
}

/// Respond with a generated index of a directory that has no `index.html`.
pub fn respond_listing(request: Request, dir: &Path, url: &str, live_reload: bool) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 200, types::HTML);
    }

    let body = render_listing(dir, url)?;
    let body = maybe_inject(body.into_bytes(), types::HTML, live_reload);
    send_body(request, 200, types::HTML, body)
}

/// Respond with 404, using the site's own `404.html` when it has one.
pub fn respond_not_found(request: Request, serve_root: &Path, live_reload: bool) -> Result<()> {
    let custom_404 = serve_root.join("404.html");
    let has_custom = custom_404.is_file();

    if is_head_request(&request) {
        let mime = if has_custom { types::HTML } else { types::PLAIN };
        return send_head(request, 404, mime);
    }

    if has_custom && let Ok(body) = fs::read(&custom_404) {
        let body = maybe_inject(body, types::HTML, live_reload);
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Redirect a directory URL to its slash-terminated form.
pub fn respond_redirect(request: Request, location: &str) -> Result<()> {
    let location = Header::from_bytes("Location", location)
        .map_err(|()| anyhow::anyhow!("invalid redirect location `{location}`"))?;
    let response = Response::empty(StatusCode(301)).with_header(location);
    request.respond(response)?;
    Ok(())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

/// Respond with 405 for anything other than GET/HEAD.
pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    let response = Response::from_data(b"405 Method Not Allowed".to_vec())
        .with_status_code(StatusCode(405))
        .with_header(make_header("Content-Type", types::PLAIN))
        .with_header(make_header("Allow", "GET, HEAD"));
    request.respond(response)?;
    Ok(())
}

/// Respond with the current revision number for the reload script.
pub fn respond_revision(request: Request, revision: u64) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 200, types::PLAIN);
    }
    let response = Response::from_string(revision.to_string())
        .with_header(make_header("Content-Type", types::PLAIN))
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

fn maybe_inject(body: Vec<u8>, content_type: &str, live_reload: bool) -> Vec<u8> {
    if live_reload && content_type.starts_with("text/html") {
        reload::inject_script(&body)
    } else {
        body
    }
}

/// Render a plain HTML index of `dir`. Directories first, then files,
/// each group sorted by name.
pub(super) fn render_listing(dir: &Path, url: &str) -> Result<String> {
    let mut entries: Vec<(bool, String)> = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(Result::ok)
        .map(|e| {
            let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
            (is_dir, e.file_name().to_string_lossy().into_owned())
        })
        .filter(|(_, name)| !name.starts_with('.'))
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let title = escape(url);
    let mut items = String::new();
    if url != "/" {
        items.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for (is_dir, name) in &entries {
        let slash = if *is_dir { "/" } else { "" };
        items.push_str(&format!(
            "<li><a href=\"{}{slash}\">{}{slash}</a></li>\n",
            utf8_percent_encode(name, HREF),
            escape(name),
        ));
    }

    Ok(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n\
         <body><h1>Index of {title}</h1>\n<ul>\n{items}</ul></body></html>\n"
    ))
}

fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

pub(super) fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

pub(super) fn is_get_or_head(request: &Request) -> bool {
    matches!(request.method(), Method::Get | Method::Head)
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-cache"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_listing_orders_dirs_first_and_escapes() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("zeta")).unwrap();
        fs::write(temp.path().join("a &b.pdf"), "x").unwrap();
        fs::write(temp.path().join("b.txt"), "x").unwrap();
        fs::write(temp.path().join(".hidden"), "x").unwrap();

        let html = render_listing(temp.path(), "/pubs/").unwrap();
        assert!(html.contains("<title>Index of /pubs/</title>"));
        assert!(html.contains("href=\"../\""));

        let zeta = html.find("zeta/").unwrap();
        let a = html.find(">a &amp;b.pdf<").unwrap();
        let b = html.find("b.txt").unwrap();
        assert!(zeta < a && a < b);
        assert!(html.contains("href=\"a%20%26b.pdf\""));
        assert!(!html.contains(".hidden"));
    }

    #[test]
    fn test_root_listing_has_no_parent_link() {
        let temp = TempDir::new().unwrap();
        let html = render_listing(temp.path(), "/").unwrap();
        assert!(!html.contains("../"));
    }

    #[test]
    fn test_inject_only_html_when_enabled() {
        let page = b"<body></body>".to_vec();
        assert_eq!(maybe_inject(page.clone(), types::CSS, true), page);
        assert_eq!(maybe_inject(page.clone(), types::HTML, false), page);
        assert_ne!(maybe_inject(page.clone(), types::HTML, true), page);
    }
}
