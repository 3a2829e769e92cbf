use super::headers::HeaderMultimap;
use bytes::Bytes;
use http::Version;
use std::collections::BTreeMap;

/// A fully received request, as handed from the listener to a handler
///
/// Lives for the duration of one request/response exchange.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Uppercase HTTP verb
    pub method: String,
    /// Host the request was addressed to, without port
    pub host: String,
    /// Request-target path with the query string removed
    pub path: String,
    /// Decoded query parameters, first occurrence of each name
    pub queries: BTreeMap<String, String>,
    pub headers: HeaderMultimap,
    pub body: Bytes,
    pub version: Version,
}

impl InboundRequest {
    /// Creates a bodiless HTTP/1.1 request for `method` and `path`
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            host: String::new(),
            path: path.into(),
            queries: BTreeMap::new(),
            headers: HeaderMultimap::new(),
            body: Bytes::new(),
            version: Version::HTTP_11,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Adds a query parameter unless the name is already present
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn is_method(&self, method: &http::Method) -> bool {
        self.method == method.as_str()
    }
}
