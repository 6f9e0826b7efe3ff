//! Response-type detection from the `content-type` header.

/// How a response body should be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Decode as JSON, falling back to text when the body is not valid JSON.
    Json,
    /// Decode as UTF-8 text.
    Text,
    /// Keep raw bytes together with the content type.
    Blob,
    /// Keep raw bytes.
    ArrayBuffer,
    /// Hand the undecoded body stream to the caller.
    Stream,
}

/// Maps a `content-type` header to a [`ResponseType`].
///
/// The defaults treat a missing header as JSON, `text/*` and a few structured
/// text types as text, the JSON media-type family as JSON, and anything else
/// as a binary blob. Each of these is adjustable.
///
/// # Examples
///
/// ```
/// use hookfetch::{ResponseType, ResponseTypeDetector};
///
/// let detector = ResponseTypeDetector::default();
/// assert_eq!(detector.detect(None), ResponseType::Json);
/// assert_eq!(detector.detect(Some("application/vnd.api+json; charset=utf-8")), ResponseType::Json);
/// assert_eq!(detector.detect(Some("text/html")), ResponseType::Text);
/// assert_eq!(detector.detect(Some("application/octet-stream")), ResponseType::Blob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTypeDetector {
    /// Used when the header is absent or empty.
    pub missing: ResponseType,
    /// Used when nothing else matches.
    pub fallback: ResponseType,
    /// Media types (without parameters) decoded as text in addition to `text/*`.
    pub text_types: Vec<String>,
}

impl Default for ResponseTypeDetector {
    fn default() -> Self {
        Self {
            missing: ResponseType::Json,
            fallback: ResponseType::Blob,
            text_types: [
                "image/svg",
                "application/xml",
                "application/xhtml",
                "application/html",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ResponseTypeDetector {
    /// Picks the explicit hint when given, otherwise detects from the header.
    pub fn resolve(&self, hint: Option<ResponseType>, content_type: Option<&str>) -> ResponseType {
        hint.unwrap_or_else(|| self.detect(content_type))
    }

    /// Detects the response type from a `content-type` header value.
    pub fn detect(&self, content_type: Option<&str>) -> ResponseType {
        let essence = content_type
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .unwrap_or_default();

        if essence.is_empty() {
            return self.missing;
        }

        if is_json_media_type(essence) {
            return ResponseType::Json;
        }

        let lowered = essence.to_ascii_lowercase();
        if lowered.starts_with("text/") || self.text_types.iter().any(|t| t.eq_ignore_ascii_case(&lowered)) {
            return ResponseType::Text;
        }

        self.fallback
    }
}

/// Matches `application/json` and structured-syntax suffixes such as
/// `application/problem+json`, case-insensitively. Mirrors the pattern
/// `` ^application/(?:[\w!#$%&*.^`~-]*\+)?json(;.+)?$ ``.
fn is_json_media_type(essence: &str) -> bool {
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    if !kind.eq_ignore_ascii_case("application") {
        return false;
    }

    let prefix = match subtype.len().checked_sub(4) {
        Some(split) if subtype.is_char_boundary(split) && subtype[split..].eq_ignore_ascii_case("json") => {
            &subtype[..split]
        }
        _ => return false,
    };

    match prefix.strip_suffix('+') {
        None => prefix.is_empty(),
        Some(name) => name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_!#$%&*.^`~-".contains(c)),
    }
}
