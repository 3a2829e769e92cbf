//! Permissive cross-origin policy
//!
//! Every response gets CORS headers. Preflights are answered directly with
//! `204 No Content` and never reach the wrapped handler.

use crate::common::RequestHandler;
use crate::echo::InboundRequest;
use crate::http::HttpResponse;
use http::Method;
use http::header::{ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY};
use std::time::Duration;
use tracing::debug;

/// Header names as sent on the wire
mod wire {
    pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
    pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
    pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
    pub const EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";
    pub const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";
    pub const MAX_AGE: &str = "Access-Control-Max-Age";
    pub const VARY: &str = "Vary";
}

/// Cross-origin policy applied to every response
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    /// Methods advertised in `Access-Control-Allow-Methods`
    pub allow_methods: Vec<Method>,
    /// Sent as `Access-Control-Allow-Credentials: true` when an origin is echoed
    pub allow_credentials: bool,
    /// Preflight cache lifetime
    pub max_age: Option<Duration>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl CorsPolicy {
    /// Allows any origin, any header and all common methods, with credentials
    pub fn permissive() -> Self {
        Self {
            allow_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::HEAD,
                Method::OPTIONS,
            ],
            allow_credentials: true,
            max_age: Some(Duration::from_secs(86400)),
        }
    }

    /// `OPTIONS` carrying `Access-Control-Request-Method`
    pub fn is_preflight(request: &InboundRequest) -> bool {
        request.is_method(&Method::OPTIONS)
            && request.headers.contains(ACCESS_CONTROL_REQUEST_METHOD.as_str())
    }

    /// Writes the CORS headers for `request` onto `response`
    pub fn apply(&self, request: &InboundRequest, response: &mut HttpResponse, preflight: bool) {
        match request.header(ORIGIN.as_str()).filter(|origin| !origin.is_empty()) {
            Some(origin) => {
                response.set_header(wire::ALLOW_ORIGIN, origin);
                if self.allow_credentials {
                    response.set_header(wire::ALLOW_CREDENTIALS, "true");
                }
                add_vary_origin(response);
            }
            // browsers refuse a wildcard origin combined with credentials
            None => response.set_header(wire::ALLOW_ORIGIN, "*"),
        }

        response.set_header(wire::ALLOW_METHODS, self.allow_methods_for(request));

        let allow_headers = request
            .header(ACCESS_CONTROL_REQUEST_HEADERS.as_str())
            .filter(|requested| !requested.trim().is_empty())
            .unwrap_or("*");
        response.set_header(wire::ALLOW_HEADERS, allow_headers);
        response.set_header(wire::EXPOSE_HEADERS, "*");

        if preflight {
            if let Some(max_age) = self.max_age {
                response.set_header(wire::MAX_AGE, max_age.as_secs().to_string());
            }
        }
    }

    fn allow_methods_for(&self, request: &InboundRequest) -> String {
        let mut methods: Vec<&str> = self.allow_methods.iter().map(Method::as_str).collect();
        if let Some(requested) = request
            .header(ACCESS_CONTROL_REQUEST_METHOD.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty())
        {
            if !methods.iter().any(|m| m.eq_ignore_ascii_case(requested)) {
                methods.push(requested);
            }
        }
        methods.join(", ")
    }
}

fn add_vary_origin(response: &mut HttpResponse) {
    let vary = match response.header(VARY.as_str()) {
        Some(existing) if existing.split(',').any(|v| v.trim().eq_ignore_ascii_case("origin")) => {
            return;
        }
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, Origin"),
        _ => "Origin".to_string(),
    };
    response.set_header(wire::VARY, vary);
}

/// Wraps a handler with a [`CorsPolicy`]
#[derive(Debug, Clone)]
pub struct Cors<H> {
    inner: H,
    policy: CorsPolicy,
}

impl<H: RequestHandler> Cors<H> {
    pub fn new(inner: H, policy: CorsPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn permissive(inner: H) -> Self {
        Self::new(inner, CorsPolicy::permissive())
    }
}

impl<H: RequestHandler> RequestHandler for Cors<H> {
    fn handle(&self, request: &InboundRequest) -> HttpResponse {
        if CorsPolicy::is_preflight(request) {
            debug!(path = %request.path, "Answering CORS preflight");
            let mut response = HttpResponse::no_content();
            self.policy.apply(request, &mut response, true);
            return response;
        }

        let mut response = self.inner.handle(request);
        self.policy.apply(request, &mut response, false);
        response
    }
}
