//! URL detection, validation, and safety filtering for inbound chat text.
//!
//! Pure text processing: nothing here performs network I/O, so it is safe to
//! call synchronously on the request path before any ingestion is spawned.

use std::sync::LazyLock;

use regex::Regex;
use url::{Host, Url};

/// Permissive URL-token pattern; matches `http`/`https` tokens only.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[A-Za-z0-9$\-_@.&+!*(),%/:~#=?\[\]]+").expect("url pattern compiles")
});

/// Prefix heuristic for RFC-1918 private ranges.
static PRIVATE_172_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^172\.(1[6-9]|2[0-9]|3[01])\.").expect("172 pattern compiles"));

/// Hosts that are never fetched, whatever the rest of the URL looks like.
const BLOCKED_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.0", "::1"];

/// Maximum accepted URL length.
const MAX_URL_LEN: usize = 2000;

/// One URL token found in a piece of text, with its vetting verdicts.
///
/// `is_valid` and `is_blocked` are independent so callers can distinguish a
/// malformed link from a forbidden one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedUrl {
    pub url: String,
    pub domain: String,
    pub scheme: String,
    pub is_valid: bool,
    pub is_blocked: bool,
}

/// Extract every URL token from `text`, parsed and vetted.
///
/// Empty text yields an empty vector, not an error.
pub fn extract_urls(text: &str) -> Vec<DetectedUrl> {
    if text.is_empty() {
        return Vec::new();
    }

    URL_PATTERN
        .find_iter(text)
        .map(|token| {
            let raw = token.as_str();
            match Url::parse(raw) {
                Ok(parsed) => {
                    let host = normalized_host(&parsed);
                    DetectedUrl {
                        url: raw.to_string(),
                        domain: host.clone().unwrap_or_default(),
                        scheme: parsed.scheme().to_string(),
                        is_valid: validate(raw, &parsed, host.as_deref()),
                        is_blocked: host.as_deref().is_some_and(is_blocked_host),
                    }
                }
                Err(_) => DetectedUrl {
                    url: raw.to_string(),
                    domain: String::new(),
                    scheme: String::new(),
                    is_valid: false,
                    is_blocked: false,
                },
            }
        })
        .collect()
}

/// Whether a single URL passes the safety checks applied during extraction.
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = normalized_host(&parsed);
            validate(url, &parsed, host.as_deref())
        }
        Err(_) => false,
    }
}

/// Whether the URL's host sits on the fixed denylist.
pub fn is_blocked_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| normalized_host(&parsed))
        .is_some_and(|host| is_blocked_host(&host))
}

/// Replace every URL token in `text` with `replacement`.
///
/// Used when persisting chat messages that should not retain raw links.
pub fn clean_text(text: &str, replacement: &str) -> String {
    URL_PATTERN.replace_all(text, replacement).into_owned()
}

/// Number of URL tokens in `text`.
pub fn count_urls(text: &str) -> usize {
    URL_PATTERN.find_iter(text).count()
}

fn validate(raw: &str, parsed: &Url, host: Option<&str>) -> bool {
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = host else {
        return false;
    };
    if host.is_empty() || is_blocked_host(host) {
        return false;
    }
    if raw.len() > MAX_URL_LEN {
        return false;
    }
    !is_private_host(host)
}

fn normalized_host(parsed: &Url) -> Option<String> {
    match parsed.host() {
        Some(Host::Domain(domain)) => Some(domain.to_ascii_lowercase()),
        Some(Host::Ipv4(addr)) => Some(addr.to_string()),
        Some(Host::Ipv6(addr)) => Some(addr.to_string()),
        None => None,
    }
}

fn is_blocked_host(host: &str) -> bool {
    BLOCKED_HOSTS.contains(&host)
}

/// Prefix heuristic for private-network hosts.
///
/// Known gap: this is string matching, not CIDR math. Link-local
/// (`169.254.*`) and IPv6 private ranges are not rejected; a DNS name that
/// resolves to a private address passes. Treat it as a best-effort SSRF
/// guard, not a complete one.
fn is_private_host(host: &str) -> bool {
    host.starts_with("10.") || host.starts_with("192.168.") || PRIVATE_172_PATTERN.is_match(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_urls() {
        assert!(extract_urls("").is_empty());
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn extracts_multiple_urls_with_verdicts() {
        let found = extract_urls("see https://example.com/page and http://localhost/x");
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].domain, "example.com");
        assert_eq!(found[0].scheme, "https");
        assert!(found[0].is_valid);
        assert!(!found[0].is_blocked);

        assert_eq!(found[1].domain, "localhost");
        assert!(!found[1].is_valid);
        assert!(found[1].is_blocked);
    }

    #[test]
    fn private_ranges_are_invalid() {
        assert!(!is_valid_url("https://192.168.1.5/"));
        assert!(!is_valid_url("http://10.0.0.8/internal"));
        assert!(!is_valid_url("http://172.20.1.1/"));
        // 172.32.* is outside the private block
        assert!(is_valid_url("http://172.32.0.1/"));
    }

    #[test]
    fn loopback_hosts_are_blocked_and_invalid() {
        for url in [
            "http://localhost/x",
            "http://127.0.0.1:8080/",
            "http://0.0.0.0/",
            "http://[::1]/",
        ] {
            assert!(!is_valid_url(url), "{url} should be invalid");
            assert!(is_blocked_url(url), "{url} should be blocked");
        }
    }

    #[test]
    fn overlong_urls_are_rejected() {
        let url = format!("https://example.com/{}", "a".repeat(2500));
        assert!(!is_valid_url(&url));
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("file:///etc/passwd"));
    }

    #[test]
    fn clean_text_replaces_tokens() {
        let cleaned = clean_text("read https://example.com/a now", "[URL]");
        assert_eq!(cleaned, "read [URL] now");
        assert_eq!(count_urls("https://a.com http://b.com"), 2);
    }
}
