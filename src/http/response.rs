use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use serde::Serialize;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// An HTTP response ready to be framed onto a connection
///
/// Header names keep the case they were inserted with. `Content-Length` and
/// `Connection` are owned by [`HttpResponse::encode`] and should not be set
/// by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// 200 response carrying `value` as a JSON document
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::OK)
            .with_header("Content-Type", JSON_CONTENT_TYPE)
            .with_body(body))
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// Short plain-text response used by the listener for protocol failures
    pub fn error(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("Error");
        Self::new(status)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(format!("{} {}\n", status.as_u16(), reason))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Inserts a header, replacing any existing value with the same name
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Serializes the response as HTTP/1.1.
    ///
    /// With `head_only` the body is left off the wire while `Content-Length`
    /// still describes it, which is what a `HEAD` response needs.
    pub fn encode(&self, head_only: bool, keep_alive: bool) -> BytesMut {
        let mut out = BytesMut::with_capacity(256 + self.body.len());
        let reason = self.status.canonical_reason().unwrap_or("");
        out.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason).as_bytes());

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            put_header(&mut out, name, value);
        }

        if self.status != StatusCode::NO_CONTENT && !self.status.is_informational() {
            put_header(&mut out, "Content-Length", &self.body.len().to_string());
        }
        put_header(
            &mut out,
            "Connection",
            if keep_alive { "keep-alive" } else { "close" },
        );
        out.put_slice(b"\r\n");

        if !head_only && self.status != StatusCode::NO_CONTENT {
            out.put_slice(&self.body);
        }
        out
    }
}

fn put_header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(b"\r\n");
}
