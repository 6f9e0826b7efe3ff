//! Query-string encoding and URL composition.

use serde_json::Value;
use url::form_urlencoded;

/// An ordered map of query parameters.
///
/// Values are JSON values so nested structures can be handed to a custom
/// [`QuerySerializer`].
pub type QueryMap = serde_json::Map<String, Value>;

/// Encodes and decodes query strings.
///
/// Implement this to use a different encoding scheme, e.g. bracketed nested
/// keys.
///
/// # Examples
///
/// ```
/// use hookfetch::query::{QueryMap, QuerySerializer};
///
/// struct Semicolons;
///
/// impl QuerySerializer for Semicolons {
///     fn stringify(&self, query: &QueryMap) -> String {
///         query
///             .iter()
///             .map(|(k, v)| format!("{}={}", k, v.as_str().unwrap_or_default()))
///             .collect::<Vec<_>>()
///             .join(";")
///     }
///
///     fn parse(&self, query: &str) -> QueryMap {
///         query
///             .split(';')
///             .filter_map(|pair| pair.split_once('='))
///             .map(|(k, v)| (k.to_string(), v.into()))
///             .collect()
///     }
/// }
/// ```
pub trait QuerySerializer: Send + Sync {
    /// Encodes a map into a query string without the leading `?`.
    fn stringify(&self, query: &QueryMap) -> String;

    /// Decodes a query string without the leading `?`.
    fn parse(&self, query: &str) -> QueryMap;
}

/// The default `application/x-www-form-urlencoded` codec.
///
/// Arrays become repeated keys, nested objects are encoded as JSON text and
/// `null` values are dropped. Parsing collects repeated keys into arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlQuery;

impl QuerySerializer for UrlQuery {
    fn stringify(&self, query: &QueryMap) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in query {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar_text(item) {
                            serializer.append_pair(key, &text);
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        serializer.append_pair(key, &text);
                    }
                }
            }
        }
        serializer.finish()
    }

    fn parse(&self, query: &str) -> QueryMap {
        let mut map = QueryMap::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = Value::String(value.into_owned());
            match map.get_mut(key.as_ref()) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(key.into_owned(), value);
                }
            }
        }
        map
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Overlays `overrides` on `base` key by key, keeping the position of keys
/// `base` already has.
pub(crate) fn merge_maps(base: &QueryMap, overrides: &QueryMap) -> QueryMap {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn has_protocol(input: &str) -> bool {
    match input.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Joins `base` and `input` with exactly one `/` between them.
pub fn join_url(base: &str, input: &str) -> String {
    if input.is_empty() || input == "/" {
        return base.to_string();
    }
    if base.is_empty() || base == "/" {
        return input.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        input.trim_start_matches('/')
    )
}

/// Prefixes `input` with `base` unless it is absolute or already prefixed.
///
/// ```
/// use hookfetch::query::with_base;
///
/// assert_eq!(with_base("/x?foo=123", "http://localhost/url"), "http://localhost/url/x?foo=123");
/// assert_eq!(with_base("", "http://localhost/404"), "http://localhost/404");
/// assert_eq!(with_base("https://other.host/a", "http://localhost"), "https://other.host/a");
/// ```
pub fn with_base(input: &str, base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() || has_protocol(input) || input.starts_with(base) {
        return input.to_string();
    }
    join_url(base, input)
}

/// Merges `query` into the query string of `input`.
///
/// Existing parameters of `input` are kept unless `query` overrides them.
/// The fragment, if any, is preserved.
pub fn with_query(input: &str, query: &QueryMap, serializer: &dyn QuerySerializer) -> String {
    if query.is_empty() {
        return input.to_string();
    }

    let (without_fragment, fragment) = match input.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (input, None),
    };
    let (path, existing) = match without_fragment.split_once('?') {
        Some((path, existing)) => (path, serializer.parse(existing)),
        None => (without_fragment, QueryMap::new()),
    };

    let merged = merge_maps(&existing, query);
    let encoded = serializer.stringify(&merged);

    let mut url = path.to_string();
    if !encoded.is_empty() {
        url.push('?');
        url.push_str(&encoded);
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}
