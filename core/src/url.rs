//! Candidate URL composition.
//!
//! # Design
//! `resolve` is a pure function: the same endpoints, target and query
//! fragments always yield the same ordered list of URLs. Targets are split the
//! way a generic URI splitter does (scheme, `//`-introduced network location,
//! path, query, fragment) rather than through a strict URL parser, because
//! relative targets such as `users` or `api/v1/users?x=1` are the common case
//! and have no meaning on their own.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ApiError;

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_HOST: &str = "localhost";

/// Bytes left untouched by `escape_query`: unreserved characters and `/`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// The five components of a split URI reference. Absent components are empty.
#[derive(Debug, Default, PartialEq, Eq)]
struct Parts<'a> {
    scheme: &'a str,
    /// `None` when the reference has no `//` authority marker at all.
    netloc: Option<&'a str>,
    path: &'a str,
    query: &'a str,
}

fn split(input: &str) -> Parts<'_> {
    let mut parts = Parts::default();
    let mut rest = input;

    if let Some(idx) = rest.find(':') {
        let candidate = &rest[..idx];
        let valid = candidate
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphabetic())
            && candidate
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
        if valid {
            parts.scheme = candidate;
            rest = &rest[idx + 1..];
        }
    }

    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        parts.netloc = Some(&after[..end]);
        rest = &after[end..];
    }

    if let Some(idx) = rest.find('#') {
        rest = &rest[..idx];
    }
    if let Some(idx) = rest.find('?') {
        parts.query = &rest[idx + 1..];
        rest = &rest[..idx];
    }
    parts.path = rest;
    parts
}

fn origin(parts: &Parts<'_>) -> String {
    let scheme = if parts.scheme.is_empty() {
        DEFAULT_SCHEME.to_string()
    } else {
        parts.scheme.to_ascii_lowercase()
    };
    let host = match parts.netloc {
        Some(netloc) if !netloc.is_empty() => netloc,
        _ => DEFAULT_HOST,
    };
    format!("{scheme}://{host}")
}

fn push_query(url: &mut String, query: &str) {
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
}

/// Percent-encode the key and value of one `key=value` fragment independently.
pub fn escape_query(fragment: &str) -> Result<String, ApiError> {
    let mut pieces = fragment.split('=');
    let (Some(key), Some(value), None) = (pieces.next(), pieces.next(), pieces.next()) else {
        return Err(ApiError::InvalidArgument(format!(
            "query must be in key=value form: {fragment:?}"
        )));
    };
    Ok(format!(
        "{}={}",
        utf8_percent_encode(key, QUERY_COMPONENT),
        utf8_percent_encode(value, QUERY_COMPONENT)
    ))
}

/// The target's own query followed by every escaped fragment, `&`-joined.
fn merged_query(own: &str, queries: &[String]) -> Result<String, ApiError> {
    let mut pieces = Vec::with_capacity(queries.len() + 1);
    if !own.is_empty() {
        pieces.push(own.to_string());
    }
    for fragment in queries {
        pieces.push(escape_query(fragment)?);
    }
    Ok(pieces.join("&"))
}

/// Build the ordered candidate URLs for `target`.
///
/// An absolute target (one with a `//` network location) ignores `endpoints`
/// and yields exactly one URL. A relative target yields one URL per endpoint,
/// in endpoint order.
pub fn resolve(
    endpoints: &[String],
    target: &str,
    queries: &[String],
) -> Result<Vec<String>, ApiError> {
    let target = split(target);
    let query = merged_query(target.query, queries)?;

    if target.netloc.is_some() {
        let mut url = origin(&target);
        if !target.path.is_empty() {
            url.push('/');
            url.push_str(target.path.trim_start_matches('/'));
        }
        push_query(&mut url, &query);
        return Ok(vec![url]);
    }

    let urls = endpoints
        .iter()
        .map(|endpoint| {
            let base = split(endpoint);
            let mut url = origin(&base);
            let prefix = base.path.trim_end_matches('/');
            if !prefix.is_empty() && !prefix.starts_with('/') {
                url.push('/');
            }
            url.push_str(prefix);
            url.push('/');
            url.push_str(target.path.trim_start_matches('/'));
            push_query(&mut url, &query);
            url
        })
        .collect();
    Ok(urls)
}

/// Apply the scheme and host defaults to a bare endpoint without touching its
/// path. Fragments are dropped.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let parts = split(endpoint);
    let mut url = origin(&parts);
    if !parts.path.is_empty() && !parts.path.starts_with('/') {
        url.push('/');
    }
    url.push_str(parts.path);
    push_query(&mut url, parts.query);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn queries(list: &[&str]) -> Vec<String> {
        endpoints(list)
    }

    #[test]
    fn url_and_relative_path() {
        let urls = resolve(&endpoints(&["http://example.com:8000/api/v1"]), "users", &[]).unwrap();
        assert_eq!(urls, vec!["http://example.com:8000/api/v1/users"]);
    }

    #[test]
    fn domain_and_path() {
        let urls = resolve(&endpoints(&["http://example.com"]), "api/v1/users", &[]).unwrap();
        assert_eq!(urls, vec!["http://example.com/api/v1/users"]);
    }

    #[test]
    fn https_endpoint_is_kept() {
        let urls = resolve(&endpoints(&["https://example.com"]), "api/v1/users", &[]).unwrap();
        assert_eq!(urls, vec!["https://example.com/api/v1/users"]);
    }

    #[test]
    fn absolute_target_ignores_endpoints() {
        let urls = resolve(
            &endpoints(&["http://example.com:8000", "http://other:1"]),
            "https://localhost:3333",
            &[],
        )
        .unwrap();
        assert_eq!(urls, vec!["https://localhost:3333"]);
    }

    #[test]
    fn scheme_relative_target_defaults_to_http() {
        let urls = resolve(&endpoints(&["https://example.com"]), "//api.test/v1/items", &[]).unwrap();
        assert_eq!(urls, vec!["http://api.test/v1/items"]);
    }

    #[test]
    fn empty_host_with_authority_marker_defaults_to_localhost() {
        let urls = resolve(&endpoints(&["https://example.com"]), "https:///status", &[]).unwrap();
        assert_eq!(urls, vec!["https://localhost/status"]);
    }

    #[test]
    fn absolute_target_merges_queries_and_drops_fragment() {
        let urls = resolve(
            &[],
            "http://h.test/search?lang=en#top",
            &queries(&["q=two words"]),
        )
        .unwrap();
        assert_eq!(urls, vec!["http://h.test/search?lang=en&q=two%20words"]);
    }

    #[test]
    fn one_url_per_endpoint_in_order_without_double_slashes() {
        let list = endpoints(&[
            "http://localhost:8000",
            "http://localhost:8080/",
            "https://b.test/api/",
            "http://a.test/api",
        ]);
        let urls = resolve(&list, "/users", &[]).unwrap();
        assert_eq!(
            urls,
            vec![
                "http://localhost:8000/users",
                "http://localhost:8080/users",
                "https://b.test/api/users",
                "http://a.test/api/users",
            ]
        );
    }

    #[test]
    fn duplicate_endpoints_are_not_collapsed() {
        let list = endpoints(&["http://a.test", "http://a.test"]);
        let urls = resolve(&list, "x", &[]).unwrap();
        assert_eq!(urls, vec!["http://a.test/x", "http://a.test/x"]);
    }

    #[test]
    fn endpoint_without_scheme_or_host_gets_defaults() {
        let urls = resolve(&endpoints(&["/prefix"]), "users", &[]).unwrap();
        assert_eq!(urls, vec!["http://localhost/prefix/users"]);
    }

    #[test]
    fn bare_endpoint_path_is_separated_from_default_host() {
        let urls = resolve(&endpoints(&["api", "api/v1/"]), "users", &[]).unwrap();
        assert_eq!(
            urls,
            vec!["http://localhost/api/users", "http://localhost/api/v1/users"]
        );
    }

    #[test]
    fn relative_target_query_precedes_fragments() {
        let urls = resolve(
            &endpoints(&["http://a.test"]),
            "items?page=2#frag",
            &queries(&["sort=name", "filter=a b"]),
        )
        .unwrap();
        assert_eq!(urls, vec!["http://a.test/items?page=2&sort=name&filter=a%20b"]);
    }

    #[test]
    fn no_leading_ampersand_without_own_query() {
        let urls = resolve(&endpoints(&["http://a.test"]), "items", &queries(&["k=v"])).unwrap();
        assert_eq!(urls, vec!["http://a.test/items?k=v"]);
    }

    #[test]
    fn empty_endpoint_list_yields_nothing_for_relative_target() {
        assert!(resolve(&[], "users", &[]).unwrap().is_empty());
    }

    #[test]
    fn escape_query_encodes_key_and_value() {
        assert_eq!(escape_query("a b=value").unwrap(), "a%20b=value");
        assert_eq!(escape_query("name=a b").unwrap(), "name=a%20b");
        assert_eq!(escape_query("path=/a/b").unwrap(), "path=/a/b");
        assert_eq!(escape_query("q=a&b").unwrap(), "q=a%26b");
        assert_eq!(escape_query("k=").unwrap(), "k=");
    }

    #[test]
    fn escape_query_encodes_utf8_bytes() {
        assert_eq!(escape_query("name=日本").unwrap(), "name=%E6%97%A5%E6%9C%AC");
    }

    #[test]
    fn fragment_without_equals_is_rejected() {
        let err = resolve(&endpoints(&["http://a.test"]), "x", &queries(&["novalue"])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn fragment_with_two_equals_is_rejected() {
        assert!(matches!(escape_query("a=b=c"), Err(ApiError::InvalidArgument(_))));
    }

    #[test]
    fn normalize_endpoint_keeps_path() {
        assert_eq!(normalize_endpoint("http://a.test/rpc"), "http://a.test/rpc");
        assert_eq!(normalize_endpoint("//a.test:9000"), "http://a.test:9000");
        assert_eq!(normalize_endpoint("https://a.test/rpc#x"), "https://a.test/rpc");
        assert_eq!(normalize_endpoint("rpc"), "http://localhost/rpc");
    }

    #[test]
    fn split_recognizes_components() {
        let parts = split("HTTPS://h.test:1/p/q?x=1#f");
        assert_eq!(parts.scheme, "HTTPS");
        assert_eq!(parts.netloc, Some("h.test:1"));
        assert_eq!(parts.path, "/p/q");
        assert_eq!(parts.query, "x=1");
    }
}
