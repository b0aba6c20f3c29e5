//! Polling live reload.
//!
//! Every mutation of the output tree bumps a [`Revision`]. HTML pages get a
//! small script that polls [`REVISION_PATH`] and reloads the page once the
//! number it sees changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Endpoint answering with the current revision as plain text.
pub const REVISION_PATH: &str = "/__autoreload/revision";

const POLL_INTERVAL_MS: u32 = 1000;

/// Shared counter of output tree changes.
#[derive(Debug, Clone, Default)]
pub struct Revision(Arc<AtomicU64>);

impl Revision {
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn script() -> String {
    format!(
        r#"<script>
(function(){{
    var seen = null;
    var poll = function() {{
        fetch("{REVISION_PATH}", {{ cache: "no-store" }})
            .then(function(r) {{ return r.ok ? r.text() : null; }})
            .then(function(rev) {{
                if (rev === null) return;
                if (seen !== null && rev !== seen) location.reload();
                seen = rev;
            }})
            .catch(function() {{}});
    }};
    poll();
    setInterval(poll, {POLL_INTERVAL_MS});
}})();
</script>"#
    )
}

/// Insert the polling script before the last `</body>`, or append it.
pub fn inject_script(content: &[u8]) -> Vec<u8> {
    let script = script();
    let script_bytes = script.as_bytes();

    const PATTERN: &[u8] = b"</body>";

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script_bytes.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script_bytes);
    result.extend_from_slice(&content[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_is_shared() {
        let revision = Revision::default();
        let clone = revision.clone();
        assert_eq!(clone.bump(), 1);
        assert_eq!(revision.bump(), 2);
        assert_eq!(clone.current(), 2);
    }

    #[test]
    fn test_inject_before_last_body() {
        let page = b"<html><body><pre></body></pre></BODY></html>";
        let out = String::from_utf8(inject_script(page)).unwrap();
        let script_at = out.find("<script>").unwrap();
        assert!(out[script_at..].contains("</script></BODY></html>"));
        assert!(out.contains(REVISION_PATH));
        // the earlier </body> is left alone
        assert!(out[..script_at].contains("<pre></body></pre>"));
    }

    #[test]
    fn test_inject_appends_without_body() {
        let out = String::from_utf8(inject_script(b"<p>fragment</p>")).unwrap();
        assert!(out.starts_with("<p>fragment</p><script>"));
        assert!(out.ends_with("</script>"));
    }
}
