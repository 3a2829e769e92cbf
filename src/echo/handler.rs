use super::body::{BodyType, classify_body};
use super::headers::flatten_headers;
use super::request::InboundRequest;
use crate::common::RequestHandler;
use crate::http::HttpResponse;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// The JSON document sent back for every handled request
///
/// Maps are ordered so that identical requests render to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub method: String,
    pub host: String,
    pub path: String,
    pub queries: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub body_type: BodyType,
}

impl EchoResponse {
    pub fn from_request(request: &InboundRequest) -> Self {
        let (body, body_type) = classify_body(&request.body);
        Self {
            method: request.method.to_ascii_uppercase(),
            host: request.host.clone(),
            path: request.path.clone(),
            queries: request.queries.clone(),
            headers: flatten_headers(&request.headers),
            body,
            body_type,
        }
    }
}

/// Answers every method on every path with an [`EchoResponse`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl EchoHandler {
    pub fn new() -> Self {
        Self
    }
}

impl RequestHandler for EchoHandler {
    fn handle(&self, request: &InboundRequest) -> HttpResponse {
        let document = EchoResponse::from_request(request);
        debug!(
            method = %document.method,
            path = %document.path,
            body_type = document.body_type.as_str(),
            size = request.body.len(),
            "Reflecting request"
        );

        match HttpResponse::json(&document) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Failed to serialize echo document");
                HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::JSON_CONTENT_TYPE;

    fn render(request: &InboundRequest) -> (HttpResponse, EchoResponse) {
        let response = EchoHandler::new().handle(request);
        let document = serde_json::from_slice(&response.body).unwrap();
        (response, document)
    }

    #[test]
    fn test_get_with_queries_and_header() {
        let request = InboundRequest::new("GET", "/hello")
            .with_host("localhost")
            .with_query("x", "1")
            .with_query("y", "two")
            .with_header("X-Test", "abc");

        let (response, document) = render(&request);

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("Content-Type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(document.method, "GET");
        assert_eq!(document.host, "localhost");
        assert_eq!(document.path, "/hello");
        assert_eq!(document.queries["x"], "1");
        assert_eq!(document.queries["y"], "two");
        assert_eq!(document.headers["X-Test"], "abc");
        assert_eq!(document.body, "");
        assert_eq!(document.body_type, BodyType::Text);
    }

    #[test]
    fn test_wire_field_names() {
        let request = InboundRequest::new("post", "/").with_body(vec![0xFFu8]);
        let response = EchoHandler.handle(&request);
        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();

        let object = value.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["body", "bodyType", "headers", "host", "method", "path", "queries"]
        );
        assert_eq!(value["method"], "POST");
        assert_eq!(value["body"], "/w==");
        assert_eq!(value["bodyType"], "base64");
        assert_eq!(value["queries"], serde_json::json!({}));
    }

    #[test]
    fn test_binary_body() {
        let request = InboundRequest::new("POST", "/bin").with_body(vec![0x00u8, 0xFF, 0x10]);
        let (_, document) = render(&request);

        assert_eq!(document.body, "AP8Q");
        assert_eq!(document.body_type, BodyType::Base64);
    }

    #[test]
    fn test_repeated_header_keeps_first() {
        let request = InboundRequest::new("PUT", "/a/b/c")
            .with_header("Accept", "text/html")
            .with_header("Accept", "application/json");
        let (_, document) = render(&request);

        assert_eq!(document.path, "/a/b/c");
        assert_eq!(document.headers["Accept"], "text/html");
    }

    #[test]
    fn test_identical_requests_render_identically() {
        let request = InboundRequest::new("PATCH", "/same")
            .with_header("B", "2")
            .with_header("A", "1")
            .with_query("z", "26")
            .with_query("a", "1")
            .with_body("payload");

        let first = EchoHandler.handle(&request);
        let second = EchoHandler.handle(&request);
        assert_eq!(first.body, second.body);
    }
}
