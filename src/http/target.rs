use std::collections::BTreeMap;
use url::{Url, form_urlencoded};

/// A request-target split into the parts the reflector reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub path: String,
    pub query: Option<String>,
    /// Authority from an absolute-form target, without port
    pub host: Option<String>,
}

impl RequestTarget {
    /// Splits origin-form, absolute-form and asterisk-form targets.
    ///
    /// Returns `None` for anything else (authority-form included).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.starts_with('/') {
            let (path, query) = split_path_and_query(raw);
            return Some(Self {
                path,
                query,
                host: None,
            });
        }

        if raw == "*" {
            return Some(Self {
                path: "*".to_string(),
                query: None,
                host: None,
            });
        }

        // the URL parser only supplies the host; path and query stay as sent
        let url = Url::parse(raw).ok()?;
        if url.cannot_be_a_base() {
            return None;
        }
        let (_, after_scheme) = raw.split_once("://")?;
        let (path, query) = match after_scheme.find(['/', '?', '#']) {
            Some(start) if after_scheme[start..].starts_with('/') => {
                split_path_and_query(&after_scheme[start..])
            }
            Some(start) => {
                let (_, query) = split_path_and_query(&after_scheme[start..]);
                ("/".to_string(), query)
            }
            None => ("/".to_string(), None),
        };
        Some(Self {
            path,
            query,
            host: url.host_str().map(str::to_string),
        })
    }

    /// Decoded query parameters; the first occurrence of a name wins
    pub fn queries(&self) -> BTreeMap<String, String> {
        self.query.as_deref().map(parse_query).unwrap_or_default()
    }
}

/// Splits `path?query#fragment` without normalizing the path
fn split_path_and_query(raw: &str) -> (String, Option<String>) {
    let without_fragment = raw.split('#').next().unwrap_or(raw);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (without_fragment.to_string(), None),
    }
}

/// Decodes an `application/x-www-form-urlencoded` query string
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    let mut queries = BTreeMap::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        queries
            .entry(name.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    queries
}

/// Strips a trailing `:port` from a `Host` value.
///
/// Bracketed IPv6 literals keep their brackets.
pub fn host_without_port(host: &str) -> &str {
    let host = host.trim();
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_form() {
        let target = RequestTarget::parse("/hello?x=1&y=two").unwrap();
        assert_eq!(target.path, "/hello");
        assert_eq!(target.query.as_deref(), Some("x=1&y=two"));
        assert_eq!(target.host, None);

        let queries = target.queries();
        assert_eq!(queries["x"], "1");
        assert_eq!(queries["y"], "two");
    }

    #[test]
    fn test_root_without_query() {
        let target = RequestTarget::parse("/").unwrap();
        assert_eq!(target.path, "/");
        assert!(target.queries().is_empty());
    }

    #[test]
    fn test_absolute_form() {
        let target = RequestTarget::parse("http://example.com:8080/a/b?k=v").unwrap();
        assert_eq!(target.path, "/a/b");
        assert_eq!(target.host.as_deref(), Some("example.com"));
        assert_eq!(target.queries()["k"], "v");
    }

    #[test]
    fn test_absolute_form_path_is_not_normalized() {
        let target = RequestTarget::parse("http://h/a/../b%7e?x=1").unwrap();
        assert_eq!(target.path, "/a/../b%7e");
        assert_eq!(target.host.as_deref(), Some("h"));
        assert_eq!(target.queries()["x"], "1");

        let origin = RequestTarget::parse("/a/../b%7e?x=1").unwrap();
        assert_eq!(origin.path, target.path);
        assert_eq!(origin.query, target.query);
    }

    #[test]
    fn test_absolute_form_without_path() {
        let bare = RequestTarget::parse("http://example.com").unwrap();
        assert_eq!(bare.path, "/");
        assert_eq!(bare.query, None);

        let query_only = RequestTarget::parse("http://example.com:81?k=v").unwrap();
        assert_eq!(query_only.path, "/");
        assert_eq!(query_only.queries()["k"], "v");
        assert_eq!(query_only.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_asterisk_form() {
        let target = RequestTarget::parse("*").unwrap();
        assert_eq!(target.path, "*");
        assert_eq!(target.query, None);
    }

    #[test]
    fn test_rejects_authority_form() {
        assert_eq!(RequestTarget::parse("example.com:443"), None);
        assert_eq!(RequestTarget::parse(""), None);
    }

    #[test]
    fn test_query_decoding() {
        let queries = parse_query("a=1&a=2&b=hello+world&c=%2F%26&flag");
        assert_eq!(queries["a"], "1");
        assert_eq!(queries["b"], "hello world");
        assert_eq!(queries["c"], "/&");
        assert_eq!(queries["flag"], "");
    }

    #[test]
    fn test_host_without_port() {
        assert_eq!(host_without_port("localhost:3003"), "localhost");
        assert_eq!(host_without_port("example.com"), "example.com");
        assert_eq!(host_without_port("[::1]:8080"), "[::1]");
        assert_eq!(host_without_port("[::1]"), "[::1]");
        assert_eq!(host_without_port("127.0.0.1:80"), "127.0.0.1");
        assert_eq!(host_without_port(""), "");
    }
}
