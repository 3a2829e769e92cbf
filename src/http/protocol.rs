use super::config::HttpConfig;
use super::response::HttpResponse;
use super::target::{RequestTarget, host_without_port};
use crate::echo::{HeaderMultimap, InboundRequest};
use crate::security::{SizeError, SizeValidator};
use bytes::{Buf, Bytes, BytesMut};
use http::{StatusCode, Version};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum number of header lines accepted in a request head
pub const MAX_HEADERS: usize = 100;

const READ_CHUNK: usize = 8 * 1024;
const MAX_LINE_LENGTH: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Incomplete request")]
    IncompleteRequest,
    #[error("Request head exceeds the configured limit")]
    HeadersTooLarge,
    #[error(transparent)]
    BodyTooLarge(#[from] SizeError),
    #[error("Unsupported transfer encoding: {0}")]
    UnsupportedTransferEncoding(String),
    #[error("Timed out reading request")]
    Timeout,
}

impl HttpProtocolError {
    /// Status to answer with before closing, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpProtocolError::Io(_) => None,
            HttpProtocolError::HttpParse(_)
            | HttpProtocolError::InvalidRequest(_)
            | HttpProtocolError::IncompleteRequest => Some(StatusCode::BAD_REQUEST),
            HttpProtocolError::HeadersTooLarge => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            HttpProtocolError::BodyTooLarge(_) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            HttpProtocolError::UnsupportedTransferEncoding(_) => Some(StatusCode::NOT_IMPLEMENTED),
            HttpProtocolError::Timeout => Some(StatusCode::REQUEST_TIMEOUT),
        }
    }
}

type Result<T> = std::result::Result<T, HttpProtocolError>;

/// A request read off the wire plus what it asked of the connection
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub request: InboundRequest,
    pub keep_alive: bool,
}

#[derive(Debug)]
struct RequestHead {
    method: String,
    target: String,
    version: Version,
    headers: HeaderMultimap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    Empty,
    Length(u64),
    Chunked,
}

impl BodyFraming {
    fn from_headers(headers: &HeaderMultimap) -> Result<Self> {
        let codings: Vec<String> = headers
            .get_all("transfer-encoding")
            .iter()
            .flat_map(|value| value.split(','))
            .map(|coding| coding.trim().to_ascii_lowercase())
            .filter(|coding| !coding.is_empty())
            .collect();
        if !codings.is_empty() {
            // Content-Length is ignored when a transfer coding is present
            if codings.iter().any(|coding| coding != "chunked") {
                return Err(HttpProtocolError::UnsupportedTransferEncoding(codings.join(", ")));
            }
            return Ok(BodyFraming::Chunked);
        }

        let mut length: Option<u64> = None;
        for raw in headers
            .get_all("content-length")
            .iter()
            .flat_map(|value| value.split(','))
        {
            let raw = raw.trim();
            if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(HttpProtocolError::InvalidRequest(format!(
                    "Invalid Content-Length {raw:?}"
                )));
            }
            let parsed: u64 = raw.parse().map_err(|_| {
                HttpProtocolError::InvalidRequest(format!("Invalid Content-Length {raw:?}"))
            })?;
            match length {
                Some(existing) if existing != parsed => {
                    return Err(HttpProtocolError::InvalidRequest(
                        "Conflicting Content-Length values".to_string(),
                    ));
                }
                _ => length = Some(parsed),
            }
        }

        Ok(match length {
            Some(0) | None => BodyFraming::Empty,
            Some(n) => BodyFraming::Length(n),
        })
    }
}

/// HTTP/1.1 framing over a byte stream
///
/// Owns the read buffer so that pipelined bytes belonging to the next request
/// are kept between calls to [`HttpConnection::read_request`].
pub struct HttpConnection<S> {
    stream: S,
    buffer: BytesMut,
    max_header_size: usize,
    body_limit: SizeValidator,
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: &HttpConfig) -> Self {
        Self::with_limits(stream, config.max_header_size, config.max_body_size)
    }

    pub fn with_limits(stream: S, max_header_size: usize, max_body_size: usize) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            max_header_size,
            body_limit: SizeValidator::new(max_body_size),
        }
    }

    /// True when bytes of a not yet parsed request are buffered
    pub fn has_buffered_data(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Waits until at least one byte is buffered.
    ///
    /// Returns `false` when the peer closed the connection first. Safe to
    /// cancel: no bytes are lost if the future is dropped.
    pub async fn fill(&mut self) -> Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        Ok(self.read_more().await? > 0)
    }

    /// Reads the next complete request, or `None` on a clean close between requests
    pub async fn read_request(&mut self) -> Result<Option<ParsedRequest>> {
        let Some(head) = self.read_head().await? else {
            return Ok(None);
        };

        let target = RequestTarget::parse(&head.target).ok_or_else(|| {
            HttpProtocolError::InvalidRequest(format!("Unsupported request target {:?}", head.target))
        })?;

        let framing = BodyFraming::from_headers(&head.headers)?;
        if let BodyFraming::Length(len) = framing {
            self.body_limit.validate_size(len)?;
        }

        if framing != BodyFraming::Empty
            && head.version == Version::HTTP_11
            && expects_continue(&head.headers)
            && self.buffer.is_empty()
        {
            self.write_raw(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        }

        let body = match framing {
            BodyFraming::Empty => Bytes::new(),
            BodyFraming::Length(len) => self.read_exact(len as usize).await?,
            BodyFraming::Chunked => self.read_chunked().await?,
        };

        let host = head
            .headers
            .get("host")
            .map(host_without_port)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .or_else(|| target.host.clone())
            .unwrap_or_default();
        let keep_alive = wants_keep_alive(head.version, &head.headers);

        let request = InboundRequest {
            method: head.method,
            host,
            queries: target.queries(),
            path: target.path,
            headers: head.headers,
            body,
            version: head.version,
        };
        Ok(Some(ParsedRequest {
            request,
            keep_alive,
        }))
    }

    /// Writes and flushes one response
    pub async fn write_response(
        &mut self,
        response: &HttpResponse,
        head_only: bool,
        keep_alive: bool,
    ) -> Result<()> {
        let encoded = response.encode(head_only, keep_alive);
        self.write_raw(&encoded).await
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_more(&mut self) -> Result<usize> {
        self.buffer.reserve(READ_CHUNK);
        Ok(self.stream.read_buf(&mut self.buffer).await?)
    }

    async fn read_head(&mut self) -> Result<Option<RequestHead>> {
        loop {
            if !self.buffer.is_empty() {
                if let Some(head) = self.parse_head()? {
                    return Ok(Some(head));
                }
                if self.buffer.len() > self.max_header_size {
                    return Err(HttpProtocolError::HeadersTooLarge);
                }
            }
            if self.read_more().await? == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(HttpProtocolError::IncompleteRequest)
                };
            }
        }
    }

    fn parse_head(&mut self) -> Result<Option<RequestHead>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_len = match req.parse(&self.buffer) {
            Ok(httparse::Status::Complete(parsed_len)) => parsed_len,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(httparse::Error::TooManyHeaders) => return Err(HttpProtocolError::HeadersTooLarge),
            Err(e) => {
                return Err(HttpProtocolError::HttpParse(format!(
                    "Failed to parse request head: {e}"
                )));
            }
        };
        if parsed_len > self.max_header_size {
            return Err(HttpProtocolError::HeadersTooLarge);
        }

        let head = RequestHead {
            method: req.method.unwrap_or_default().to_ascii_uppercase(),
            target: req.path.unwrap_or_default().to_string(),
            version: match req.version {
                Some(0) => Version::HTTP_10,
                _ => Version::HTTP_11,
            },
            headers: req
                .headers
                .iter()
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                .collect(),
        };

        self.buffer.advance(parsed_len);
        Ok(Some(head))
    }

    async fn read_exact(&mut self, len: usize) -> Result<Bytes> {
        while self.buffer.len() < len {
            if self.read_more().await? == 0 {
                return Err(HttpProtocolError::IncompleteRequest);
            }
        }
        Ok(self.buffer.split_to(len).freeze())
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buffer.windows(2).position(|w| w == b"\r\n") {
                let line = self.buffer.split_to(pos + 2);
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }
            if self.buffer.len() > MAX_LINE_LENGTH {
                return Err(HttpProtocolError::InvalidRequest(
                    "Chunk line too long".to_string(),
                ));
            }
            if self.read_more().await? == 0 {
                return Err(HttpProtocolError::IncompleteRequest);
            }
        }
    }

    async fn read_chunked(&mut self) -> Result<Bytes> {
        let mut body = BytesMut::new();
        loop {
            let line = self.read_line().await?;
            let size_field = line.split(';').next().unwrap_or_default().trim();
            if size_field.is_empty() || !size_field.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(HttpProtocolError::InvalidRequest(format!(
                    "Invalid chunk size {size_field:?}"
                )));
            }
            let size = u64::from_str_radix(size_field, 16).map_err(|_| {
                HttpProtocolError::InvalidRequest(format!("Invalid chunk size {size_field:?}"))
            })?;

            if size == 0 {
                self.skip_trailers().await?;
                return Ok(body.freeze());
            }

            self.body_limit
                .validate_size((body.len() as u64).saturating_add(size))?;
            let chunk = self.read_exact(size as usize).await?;
            body.extend_from_slice(&chunk);

            if !self.read_line().await?.is_empty() {
                return Err(HttpProtocolError::InvalidRequest(
                    "Missing CRLF after chunk data".to_string(),
                ));
            }
        }
    }

    async fn skip_trailers(&mut self) -> Result<()> {
        for _ in 0..=MAX_HEADERS {
            if self.read_line().await?.is_empty() {
                return Ok(());
            }
        }
        Err(HttpProtocolError::HeadersTooLarge)
    }
}

fn header_tokens<'a>(headers: &'a HeaderMultimap, name: &str) -> impl Iterator<Item = &'a str> {
    headers
        .get_all(name)
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
}

fn expects_continue(headers: &HeaderMultimap) -> bool {
    header_tokens(headers, "expect").any(|token| token.eq_ignore_ascii_case("100-continue"))
}

/// HTTP/1.1 persists unless told to close; HTTP/1.0 closes unless asked to persist
fn wants_keep_alive(version: Version, headers: &HeaderMultimap) -> bool {
    let mut tokens = header_tokens(headers, "connection");
    if version == Version::HTTP_10 {
        tokens.any(|token| token.eq_ignore_ascii_case("keep-alive"))
    } else {
        !tokens.any(|token| token.eq_ignore_ascii_case("close"))
    }
}
