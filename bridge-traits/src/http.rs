//! HTTP data model shared by the transport and the execution bridge
//!
//! Requests and responses are plain data here. Headers are kept as an ordered
//! list so duplicates and the original order survive the trip through the
//! transport.

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Trace,
    Options,
    /// Any other verb, kept verbatim.
    Extension(String),
}

impl HttpMethod {
    /// Map a method name onto a variant. Standard names are matched exactly
    /// (HTTP methods are case-sensitive); everything else is an extension.
    pub fn from_name(name: &str) -> Self {
        match name {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "TRACE" => Self::Trace,
            "OPTIONS" => Self::Options,
            other => Self::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Trace => "TRACE",
            Self::Options => "OPTIONS",
            Self::Extension(name) => name,
        }
    }

    /// Whether a request with this method may carry an entity body.
    pub fn permits_content(&self) -> bool {
        matches!(
            self,
            Self::Post | Self::Put | Self::Patch | Self::Extension(_)
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered list of header name/value pairs.
///
/// Lookups are case-insensitive on the name; duplicates are allowed and kept
/// in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Remove all values of `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// First value of `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// Source of a request body.
///
/// `write_to` may be called once per attempt, so implementations must be
/// able to produce the same bytes more than once.
pub trait StreamingContent: Send + Sync {
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// In-memory request body.
#[derive(Debug, Clone)]
pub struct ByteArrayContent(pub Bytes);

impl StreamingContent for ByteArrayContent {
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.0)
    }
}

/// Request body serialized to JSON while it is being written.
#[derive(Debug, Clone)]
pub struct JsonContent<T>(pub T);

impl<T: Serialize + Send + Sync> StreamingContent for JsonContent<T> {
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(out, &self.0).map_err(io::Error::other)
    }
}

/// A request body together with its declared framing.
#[derive(Clone)]
pub struct HttpContent {
    pub content: Arc<dyn StreamingContent>,
    /// Known length in bytes; `None` means the body is sent chunked.
    pub length: Option<u64>,
    pub content_type: Option<String>,
}

impl HttpContent {
    pub fn new(content: Arc<dyn StreamingContent>) -> Self {
        Self {
            content,
            length: None,
            content_type: None,
        }
    }

    /// Fixed-length body from bytes.
    pub fn bytes(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            length: Some(body.len() as u64),
            content: Arc::new(ByteArrayContent(body)),
            content_type: Some(content_type.into()),
        }
    }

    /// Chunked JSON body.
    pub fn json<T: Serialize + Send + Sync + 'static>(value: T) -> Self {
        Self {
            content: Arc::new(JsonContent(value)),
            length: None,
            content_type: Some("application/json; charset=UTF-8".to_string()),
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

impl fmt::Debug for HttpContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContent")
            .field("length", &self.length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// HTTP request as handed to the transport for one attempt.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderList,
    pub content: Option<HttpContent>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderList::new(),
            content: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.headers
            .set("Authorization", format!("Bearer {}", token.as_ref()));
        self
    }

    pub fn content(mut self, content: HttpContent) -> Self {
        self.content = Some(content);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Body stream of a realized response.
///
/// Dropping the value closes the stream and releases the underlying
/// connection resource, so ownership guarantees it is closed exactly once.
pub struct ResponseContent {
    reader: Box<dyn Read + Send>,
}

impl ResponseContent {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    /// Close the stream without reading the rest of it.
    pub fn close(self) {
        drop(self);
    }

    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }
}

impl Read for ResponseContent {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for ResponseContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseContent { .. }")
    }
}

/// A realized response.
#[derive(Debug)]
pub struct ResponseEnvelope {
    status: u16,
    reason: Option<String>,
    headers: HeaderList,
    content: Option<ResponseContent>,
}

impl ResponseEnvelope {
    pub fn new(status: u16, headers: HeaderList, content: ResponseContent) -> Self {
        Self {
            status,
            reason: None,
            headers,
            content: Some(content),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.headers.get("Content-Encoding")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// `charset` parameter of the declared content type.
    pub fn charset(&self) -> Option<&str> {
        self.content_type().and_then(charset_of)
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Take ownership of the body stream. Returns `None` once taken.
    pub fn take_content(&mut self) -> Option<ResponseContent> {
        self.content.take()
    }

    /// Close the body stream if it has not been taken yet.
    pub fn close_content(&mut self) {
        if let Some(content) = self.content.take() {
            content.close();
        }
    }

    /// Read the whole body into memory. Meant for small bodies and tests.
    pub fn read_to_bytes(mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        if let Some(mut content) = self.take_content() {
            content.read_to_end(&mut buf).map_err(BridgeError::Io)?;
        }
        Ok(Bytes::from(buf))
    }
}

/// Extract the `charset` parameter from a content type value.
pub fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .header("User-Agent", "test")
            .bearer_token("secret")
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("user-agent"), Some("test"));
        assert_eq!(request.headers.get("Authorization"), Some("Bearer secret"));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_bearer_token_replaces_previous() {
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .bearer_token("old")
            .bearer_token("new");

        assert_eq!(request.headers.get_all("authorization").count(), 1);
        assert_eq!(request.headers.get("Authorization"), Some("Bearer new"));
    }

    #[test]
    fn test_header_list_keeps_duplicates_in_order() {
        let mut headers = HeaderList::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("Content-Type", "text/plain");
        headers.append("set-cookie", "b=2");

        let cookies: Vec<_> = headers.get_all("SET-COOKIE").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Set-Cookie", "Content-Type", "set-cookie"]);

        assert_eq!(headers.remove("set-cookie"), 2);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(HttpMethod::from_name("GET"), HttpMethod::Get);
        assert_eq!(HttpMethod::from_name("OPTIONS"), HttpMethod::Options);
        assert_eq!(
            HttpMethod::from_name("PROPFIND"),
            HttpMethod::Extension("PROPFIND".to_string())
        );
        assert_eq!(HttpMethod::Extension("MOVE".to_string()).as_str(), "MOVE");
        assert!(HttpMethod::Post.permits_content());
        assert!(!HttpMethod::Get.permits_content());
        assert!(!HttpMethod::Head.permits_content());
    }

    #[test]
    fn test_charset_extraction() {
        assert_eq!(charset_of("application/json; charset=UTF-8"), Some("UTF-8"));
        assert_eq!(charset_of("text/html;Charset=\"iso-8859-1\""), Some("iso-8859-1"));
        assert_eq!(charset_of("application/json"), None);
    }

    #[test]
    fn test_envelope_accessors() {
        let headers: HeaderList = vec![
            ("Content-Type", "application/json; charset=utf-8"),
            ("Content-Encoding", "gzip"),
            ("Content-Length", "42"),
        ]
        .into_iter()
        .collect();
        let envelope = ResponseEnvelope::new(200, headers, ResponseContent::empty())
            .with_reason("OK");

        assert!(envelope.is_success());
        assert_eq!(envelope.reason_phrase(), Some("OK"));
        assert_eq!(envelope.charset(), Some("utf-8"));
        assert_eq!(envelope.content_encoding(), Some("gzip"));
        assert_eq!(envelope.content_length(), Some(42));
    }

    #[test]
    fn test_take_content_once() {
        let mut envelope = ResponseEnvelope::new(
            200,
            HeaderList::new(),
            ResponseContent::new(io::Cursor::new(b"hello".to_vec())),
        );
        assert!(envelope.take_content().is_some());
        assert!(envelope.take_content().is_none());
    }

    #[test]
    fn test_read_to_bytes() {
        let envelope = ResponseEnvelope::new(
            404,
            HeaderList::new(),
            ResponseContent::new(io::Cursor::new(b"missing".to_vec())),
        );
        assert!(!envelope.is_success());
        assert_eq!(envelope.read_to_bytes().unwrap(), Bytes::from_static(b"missing"));
    }

    #[test]
    fn test_json_content_writes_serialized_value() {
        let content = HttpContent::json(serde_json::json!({ "name": "a" }));
        let mut out = Vec::new();
        content.content.write_to(&mut out).unwrap();
        assert_eq!(out, br#"{"name":"a"}"#);
        assert!(content.length.is_none());
    }

    #[test]
    fn test_byte_content_has_length() {
        let content = HttpContent::bytes(&b"abc"[..], "text/plain");
        assert_eq!(content.length, Some(3));
        assert_eq!(content.content_type.as_deref(), Some("text/plain"));
    }
}
