//! A scripted transport.
//!
//! Routes map a method and url to a handler producing the response. Every
//! request is recorded, and every response is delayed by one scheduler
//! yield so that requests started together are in flight together.

use client::{HttpRequest, HttpResponse, Transport, TransportError};
use futures::future::LocalBoxFuture;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

type Handler = Rc<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError>>;

#[derive(Default)]
pub struct MockTransport {
    routes: RefCell<Vec<(Method, String, Handler)>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Answer `method url` with `handler`. Later routes take precedence.
    pub fn on(
        &self,
        method: Method,
        url: &str,
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError>
        + 'static,
    ) {
        self.routes
            .borrow_mut()
            .push((method, url.to_string(), Rc::new(handler)));
    }

    /// Answer `GET url` with a 200 and `body`.
    pub fn on_get_json(&self, url: &str, body: Value) {
        self.on(Method::GET, url, move |_| Ok(HttpResponse::ok(body.clone())));
    }

    /// Answer `method url` with `status` and `body`.
    pub fn on_status(
        &self,
        method: Method,
        url: &str,
        status: StatusCode,
        body: Value,
    ) {
        self.on(method, url, move |_| {
            Ok(HttpResponse::new(status, body.clone()))
        });
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|request| request.url == url)
            .cloned()
            .collect()
    }

    fn handler(&self, request: &HttpRequest) -> Option<Handler> {
        self.routes
            .borrow()
            .iter()
            .rev()
            .find(|(method, url, _)| {
                *method == request.method && *url == request.url
            })
            .map(|(_, _, handler)| handler.clone())
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> LocalBoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            self.requests.borrow_mut().push(request.clone());
            tokio::task::yield_now().await;

            match self.handler(&request) {
                Some(handler) => handler(&request),
                None => Ok(HttpResponse::new(StatusCode::NOT_FOUND, Value::Null)),
            }
        })
    }
}
