//! Access and refresh token state, and renewal.
//!
//! The session holds the current access token for every authenticated
//! request to read at send time. When a request is refused as
//! unauthorized, the client asks the session to renew: the refresh token
//! is exchanged for a new access token at the renewal endpoint and the
//! refused request is retried once with it.
//!
//! Renewal is single-flight. Requests refused while a renewal is in
//! flight wait for that renewal instead of starting their own, so a wave
//! of expired requests produces one call to the renewal endpoint.
//!
//! The session only holds a weak handle to the renewal in flight; the
//! requests awaiting it own it. A request canceled while a renewal is in
//! flight keeps driving the renewal before it settles (see
//! [`RequestScope`](crate::RequestScope)), so the session is not left
//! half-renewed.

use derive_more::Display;
use futures::future::{FutureExt, LocalBoxFuture, Shared, WeakShared};
use payloads::requests::RenewTokens;
use payloads::responses::TokenPair;
use payloads::{ErrorDetails, codes, decode_body, make_error};
use secrecy::{ExposeSecret, SecretString};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::http_client::{HttpClient, RenewCredentials, RenewalOutcome};
use crate::notify::{Subscribers, Subscription};
use crate::token::{JwtSubjectDecoder, TokenDecodeError, TokenDecoder};
use crate::transport::{AUTHORIZATION, HttpRequest};

/// Loads a refresh token from durable storage.
pub type GetRefreshToken =
    Rc<dyn Fn() -> LocalBoxFuture<'static, anyhow::Result<String>>>;
/// Persists a refresh token, or clears it when given `None`.
pub type SetRefreshToken =
    Rc<dyn Fn(Option<String>) -> LocalBoxFuture<'static, ()>>;

#[derive(Clone)]
pub struct AuthConfig {
    /// Endpoint exchanging a refresh token for new tokens.
    pub refresh_token_url: String,
    pub get_refresh_token: Option<GetRefreshToken>,
    pub set_refresh_token: Option<SetRefreshToken>,
    pub decoder: Rc<dyn TokenDecoder>,
}

impl AuthConfig {
    pub fn new(refresh_token_url: impl Into<String>) -> Self {
        Self {
            refresh_token_url: refresh_token_url.into(),
            get_refresh_token: None,
            set_refresh_token: None,
            decoder: Rc::new(JwtSubjectDecoder),
        }
    }

    pub fn get_refresh_token<F, Fut>(mut self, get: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<String>> + 'static,
    {
        self.get_refresh_token = Some(Rc::new(move || Box::pin(get())));
        self
    }

    pub fn set_refresh_token<F, Fut>(mut self, set: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.set_refresh_token =
            Some(Rc::new(move |token| Box::pin(set(token))));
        self
    }

    pub fn decoder(mut self, decoder: impl TokenDecoder + 'static) -> Self {
        self.decoder = Rc::new(decoder);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionStatus {
    /// No access token and no renewal in flight.
    Anonymous,
    /// A renewal is in flight.
    Authenticating,
    Authenticated,
}

/// What views observe of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub status: SessionStatus,
}

type PendingRenewal = Shared<LocalBoxFuture<'static, RenewalOutcome>>;
type WeakRenewal = WeakShared<LocalBoxFuture<'static, RenewalOutcome>>;

struct SessionInner {
    /// Client without renew-and-retry, used for the renewal call itself.
    plain: Rc<HttpClient>,
    config: AuthConfig,
    access_token: RefCell<Option<String>>,
    user_id: RefCell<Option<String>>,
    refresh_token: RefCell<Option<SecretString>>,
    pending: RefCell<Option<WeakRenewal>>,
    subscribers: Subscribers<SessionSnapshot>,
}

#[derive(Clone)]
pub struct AuthSession {
    inner: Rc<SessionInner>,
}

impl AuthSession {
    pub fn new(plain: Rc<HttpClient>, config: AuthConfig) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                plain,
                config,
                access_token: RefCell::new(None),
                user_id: RefCell::new(None),
                refresh_token: RefCell::new(None),
                pending: RefCell::new(None),
                subscribers: Subscribers::new(),
            }),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.access_token.borrow().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.user_id.borrow().clone()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.inner.refresh_token.borrow().is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if self.pending_renewal().is_some() {
            SessionStatus::Authenticating
        } else if self.inner.access_token.borrow().is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            access_token: self.access_token(),
            user_id: self.user_id(),
            status: self.status(),
        }
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SessionSnapshot) + 'static,
    ) -> Subscription {
        self.inner.subscribers.subscribe(listener)
    }

    /// Replace the access token. The token must decode to a subject; a
    /// token that doesn't is refused and the session is left unchanged.
    pub fn set_access_token(
        &self,
        token: Option<String>,
    ) -> Result<(), TokenDecodeError> {
        let user_id = token
            .as_deref()
            .map(|token| self.inner.config.decoder.subject(token))
            .transpose()?;
        self.store_access_token(token, user_id);
        Ok(())
    }

    /// Hold a refresh token and persist it through the configured
    /// callback. `None` clears both.
    pub async fn set_refresh_token(&self, token: Option<String>) {
        *self.inner.refresh_token.borrow_mut() =
            token.clone().map(SecretString::from);
        let persist = self.inner.config.set_refresh_token.clone();
        if let Some(persist) = persist {
            persist(token).await;
        }
    }

    /// Attach the current access token to a request.
    pub fn authorize(&self, request: &mut HttpRequest) {
        if let Some(token) = self.inner.access_token.borrow().as_deref() {
            request.set_header(AUTHORIZATION, format!("Bearer {token}"));
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns the new access token, `None` if the renewal produced none,
    /// or the error if the renewal endpoint refused the credentials (both
    /// tokens are cleared in that case). Joins the renewal in flight if
    /// there is one.
    pub async fn renew_tokens(&self) -> RenewalOutcome {
        if let Some(pending) = self.pending_renewal() {
            tracing::debug!("Joining renewal in flight");
            return pending.await;
        }

        let session = self.clone();
        let renewal = async move {
            let outcome = session.perform_renewal().await;
            session.inner.pending.borrow_mut().take();
            session.notify();
            outcome
        }
        .boxed_local()
        .shared();

        *self.inner.pending.borrow_mut() = renewal.downgrade();
        self.notify();
        renewal.await
    }

    /// Like [`renew_tokens`](Self::renew_tokens), running `on_success`
    /// with the new access token once it is stored.
    pub async fn renew_tokens_with(
        &self,
        on_success: impl FnOnce(&str),
    ) -> RenewalOutcome {
        let outcome = self.renew_tokens().await;
        if let Ok(Some(token)) = &outcome {
            on_success(token);
        }
        outcome
    }

    /// The renewal in flight, if anything still awaits it.
    fn pending_renewal(&self) -> Option<PendingRenewal> {
        self.inner
            .pending
            .borrow()
            .as_ref()
            .and_then(WeakShared::upgrade)
    }

    async fn perform_renewal(&self) -> RenewalOutcome {
        tracing::info!("Renewing access token");
        // The current token was refused; stop attaching it.
        self.store_access_token(None, None);

        let missing = self.inner.refresh_token.borrow().is_none();
        let load = self.inner.config.get_refresh_token.clone();
        if let (true, Some(load)) = (missing, load) {
            match load().await {
                Ok(token) => {
                    *self.inner.refresh_token.borrow_mut() =
                        Some(SecretString::from(token));
                }
                // TODO: confirm with product whether a storage failure
                // should end the session instead of renewing anonymously.
                Err(e) => tracing::warn!(
                    "Failed to load refresh token, renewing without one: {e:#}"
                ),
            }
        }

        let body = self.inner.refresh_token.borrow().as_ref().map(|token| {
            RenewTokens {
                refresh_token: token.expose_secret().to_string(),
            }
        });
        let request =
            HttpRequest::post(self.inner.config.refresh_token_url.clone(), None);
        let request = match body {
            Some(body) => request.json(&body).map_err(|e| {
                make_error(
                    codes::UNKNOWN,
                    format!("Failed to encode renewal request: {e}"),
                    ErrorDetails::cause(e),
                )
            })?,
            None => request,
        };

        let response = self
            .inner
            .plain
            .request(request)
            .await
            .and_then(decode_body::<TokenPair>);

        match response {
            Err(error) if error.is_unauthorized() => {
                tracing::error!("Renewal refused: {}", error.message);
                self.store_access_token(None, None);
                self.set_refresh_token(None).await;
                Err(error)
            }
            Err(error) => {
                tracing::warn!("Renewal failed: {error}");
                Ok(None)
            }
            Ok(TokenPair {
                access_token: Some(access_token),
                refresh_token,
            }) => {
                self.set_access_token(Some(access_token.clone())).map_err(
                    |e| {
                        make_error(
                            codes::UNKNOWN,
                            format!("Received malformed access token: {e}"),
                            ErrorDetails::cause(e),
                        )
                    },
                )?;
                if let Some(refresh_token) = refresh_token {
                    self.set_refresh_token(Some(refresh_token)).await;
                }
                tracing::info!("Access token renewed");
                Ok(Some(access_token))
            }
            Ok(_) => {
                tracing::warn!("Renewal response carried no access token");
                Ok(None)
            }
        }
    }

    fn store_access_token(
        &self,
        token: Option<String>,
        user_id: Option<String>,
    ) {
        *self.inner.access_token.borrow_mut() = token;
        *self.inner.user_id.borrow_mut() = user_id;
        self.notify();
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        self.inner.subscribers.notify(&snapshot);
    }
}

impl RenewCredentials for AuthSession {
    fn renew(&self) -> LocalBoxFuture<'_, RenewalOutcome> {
        Box::pin(self.renew_tokens())
    }

    fn in_flight(&self) -> Option<LocalBoxFuture<'static, RenewalOutcome>> {
        self.pending_renewal().map(FutureExt::boxed_local)
    }
}
