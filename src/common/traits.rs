use crate::Result;
use crate::echo::InboundRequest;
use crate::http::HttpResponse;
use std::sync::Arc;

/// Turns one inbound request into one response
///
/// Handlers are pure: they see only the request and may not keep state
/// between calls. Filters such as [`crate::cors::Cors`] implement this trait
/// by wrapping another handler.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &InboundRequest) -> HttpResponse;
}

impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    fn handle(&self, request: &InboundRequest) -> HttpResponse {
        (**self).handle(request)
    }
}

impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    fn handle(&self, request: &InboundRequest) -> HttpResponse {
        (**self).handle(request)
    }
}

/// Lifecycle shared by servers in this crate
#[async_trait::async_trait]
pub trait EchoServerTrait {
    /// Binds, serves until shutdown, then drains in-flight connections
    async fn run(&self) -> Result<()>;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}
