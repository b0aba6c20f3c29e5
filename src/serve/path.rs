//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

/// What a request URL points at inside the serve root.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    /// A directory without `index.html`; `url` ends with `/`.
    Directory { dir: PathBuf, url: String },
    /// A directory requested without its trailing slash.
    Redirect(String),
}

/// Resolve a URL against `serve_root`.
///
/// `/` and directories map to their `index.html`. A directory URL without
/// the trailing slash redirects, so relative links keep working. Anything
/// that escapes the root, including through symlinks, resolves to `None`.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<Resolved> {
    let raw = url.split(['?', '#']).next().unwrap_or(url);
    let clean = normalize_url(raw);

    if clean.split('/').any(|part| part == "..") {
        return None;
    }

    let canonical = serve_root.join(&clean).canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(Resolved::File(canonical));
    }

    if canonical.is_dir() {
        if !raw.ends_with('/') {
            return Some(Resolved::Redirect(format!("{raw}/")));
        }
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(Resolved::File(index));
        }
        let url = if clean.is_empty() {
            "/".to_owned()
        } else {
            format!("/{clean}/")
        };
        return Some(Resolved::Directory {
            dir: canonical,
            url,
        });
    }

    None
}

/// Decode and trim slashes.
fn normalize_url(path: &str) -> String {
    use percent_encoding::percent_decode_str;

    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.replace('\\', "/").trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_root() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("html");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join("pubs")).unwrap();
        fs::write(root.join("index.html"), "home").unwrap();
        fs::write(root.join("sub").join("index.html"), "sub").unwrap();
        fs::write(root.join("pubs").join("paper one.pdf"), "%PDF").unwrap();
        fs::write(temp.path().join("secret.txt"), "no").unwrap();
        let root = root.canonicalize().unwrap();
        (temp, root)
    }

    #[test]
    fn test_root_maps_to_index() {
        let (_temp, root) = make_root();
        assert_eq!(
            resolve_path("/", &root),
            Some(Resolved::File(root.join("index.html")))
        );
        assert_eq!(
            resolve_path("/sub/?v=2", &root),
            Some(Resolved::File(root.join("sub").join("index.html")))
        );
    }

    #[test]
    fn test_directory_without_slash_redirects() {
        let (_temp, root) = make_root();
        assert_eq!(
            resolve_path("/sub?x=1", &root),
            Some(Resolved::Redirect("/sub/".into()))
        );
        assert_eq!(resolve_path("", &root), Some(Resolved::Redirect("/".into())));
    }

    #[test]
    fn test_percent_decoding() {
        let (_temp, root) = make_root();
        assert_eq!(
            resolve_path("/pubs/paper%20one.pdf", &root),
            Some(Resolved::File(root.join("pubs").join("paper one.pdf")))
        );
    }

    #[test]
    fn test_directory_without_index() {
        let (_temp, root) = make_root();
        assert_eq!(
            resolve_path("/pubs", &root),
            Some(Resolved::Redirect("/pubs/".into()))
        );
        assert_eq!(
            resolve_path("/pubs/", &root),
            Some(Resolved::Directory {
                dir: root.join("pubs"),
                url: "/pubs/".into()
            })
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let (_temp, root) = make_root();
        assert_eq!(resolve_path("/../secret.txt", &root), None);
        assert_eq!(resolve_path("/sub/%2e%2e/%2e%2e/secret.txt", &root), None);
        assert_eq!(resolve_path("/..%5csecret.txt", &root), None);
    }

    #[test]
    fn test_missing_is_none() {
        let (_temp, root) = make_root();
        assert_eq!(resolve_path("/nope.html", &root), None);
    }
}
