//! Request scopes: at most one live request per consumer.
//!
//! A [`RequestScope`] belongs to a single consumer, typically one component
//! instance. Starting a request cancels the one still in flight (unless
//! `cancel_prev` is off), and disposing the scope cancels whatever is
//! outstanding so nothing settles into a consumer that is gone. A canceled
//! request settles as a CANCELED error, once any credential renewal it
//! was waiting on has finished.

use futures::future::{AbortHandle, Abortable};
use payloads::{
    ApiResult, ErrorDetails, codes, decode_body, make_error,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::Instrument;
use uuid::Uuid;

use crate::http_client::HttpClient;
use crate::transport::HttpRequest;

/// Shared slot holding the cancellation handle of the live request.
///
/// Scopes created with the same `CancelRef` cancel each other's requests.
#[derive(Clone, Default)]
pub struct CancelRef(Rc<RefCell<Option<AbortHandle>>>);

impl CancelRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the live request, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.0.borrow().as_ref() {
            handle.abort();
        }
    }

    fn replace(&self, handle: AbortHandle) {
        *self.0.borrow_mut() = Some(handle);
    }
}

impl PartialEq for CancelRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, PartialEq)]
pub struct RequestOptions {
    /// Cancel the live request when a new one starts.
    pub cancel_prev: bool,
    /// Cancel the live request when the scope is disposed.
    pub cancel_on_unmount: bool,
    /// Use this slot instead of a private one.
    pub cancel_ref: Option<CancelRef>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cancel_prev: true,
            cancel_on_unmount: true,
            cancel_ref: None,
        }
    }
}

pub struct RequestScope {
    client: Rc<HttpClient>,
    cancel_prev: bool,
    cancel_on_unmount: bool,
    cancel_ref: CancelRef,
}

impl RequestScope {
    pub fn new(client: Rc<HttpClient>, options: RequestOptions) -> Self {
        Self {
            client,
            cancel_prev: options.cancel_prev,
            cancel_on_unmount: options.cancel_on_unmount,
            cancel_ref: options.cancel_ref.unwrap_or_default(),
        }
    }

    pub fn client(&self) -> &Rc<HttpClient> {
        &self.client
    }

    pub fn cancel_ref(&self) -> &CancelRef {
        &self.cancel_ref
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> ApiResult<T> {
        if self.cancel_prev {
            self.cancel_ref.cancel();
        }
        let (handle, registration) = AbortHandle::new_pair();
        self.cancel_ref.replace(handle);

        let span = tracing::debug_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            url = %request.url,
        );
        let call = Abortable::new(self.client.request(request), registration)
            .instrument(span);
        futures::pin_mut!(call);

        match (&mut call).await {
            Ok(result) => result.and_then(decode_body::<T>),
            Err(_) => {
                tracing::debug!("Request was canceled");
                // The canceled call may be what keeps a renewal alive.
                // Finish the renewal before letting go of it.
                if let Some(renewal) = self.client.renewal_in_flight() {
                    tracing::debug!("Finishing renewal for canceled request");
                    let _ = renewal.await;
                }
                Err(make_error(
                    codes::CANCELED,
                    "Request was canceled",
                    ErrorDetails::default(),
                ))
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        self.request(HttpRequest::get(url)).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &impl Serialize,
    ) -> ApiResult<T> {
        let request = HttpRequest::post(url, None).json(body).map_err(|e| {
            make_error(
                codes::UNKNOWN,
                format!("Failed to encode request body: {e}"),
                ErrorDetails::cause(e),
            )
        })?;
        self.request(request).await
    }

    pub async fn empty_post<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> ApiResult<T> {
        self.request(HttpRequest::post(url, None)).await
    }

    /// Tear the scope down, canceling the live request if
    /// `cancel_on_unmount` is set.
    pub fn dispose(&self) {
        if self.cancel_on_unmount {
            self.cancel_ref.cancel();
        }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.dispose();
    }
}
