//! The shared services handed down to every consumer.
//!
//! An [`ApiContext`] is built once per application (or per session) and
//! cloned into whatever needs to make requests. Without auth configuration
//! it holds a single client. With auth configuration it holds a plain
//! client, used for token renewal, and an authenticated client that
//! attaches the session's access token and renews it when a request is
//! refused.

use payloads::ResultError;
use std::rc::Rc;

use crate::auth::{AuthConfig, AuthSession};
use crate::config::ClientConfig;
use crate::http_client::{ErrorSink, HttpClient};
use crate::scope::{RequestOptions, RequestScope};
use crate::transport::{ReqwestTransport, Transport};

/// Extra setup run on every client as it is created.
pub type PostInitialize = Rc<dyn Fn(&HttpClient)>;

#[derive(Clone, Default)]
pub struct ProviderOptions {
    pub config: ClientConfig,
    /// Receives every error except UNAUTHORIZED.
    pub on_error: Option<ErrorSink>,
    pub post_initialize: Option<PostInitialize>,
    pub auth: Option<AuthConfig>,
}

impl ProviderOptions {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn on_error(mut self, on_error: impl Fn(&ResultError) + 'static) -> Self {
        self.on_error = Some(Rc::new(on_error));
        self
    }

    pub fn post_initialize(
        mut self,
        post_initialize: impl Fn(&HttpClient) + 'static,
    ) -> Self {
        self.post_initialize = Some(Rc::new(post_initialize));
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }
}

#[derive(Clone)]
pub struct ApiContext {
    plain: Rc<HttpClient>,
    authenticated: Rc<HttpClient>,
    session: Option<AuthSession>,
}

impl ApiContext {
    pub fn new(transport: Rc<dyn Transport>, options: ProviderOptions) -> Self {
        // Interceptors from `post_initialize` run after the bearer one, so
        // they see and may replace the Authorization header.
        let create = |session: Option<&AuthSession>| {
            let client = HttpClient::new(transport.clone(), options.config.clone());
            if let Some(session) = session {
                client.set_renewer(Rc::new(session.clone()));
                let session = session.clone();
                client
                    .add_request_interceptor(move |request| session.authorize(request));
            }
            if let Some(post_initialize) = &options.post_initialize {
                post_initialize(&client);
            }
            client.set_error_sink(options.on_error.clone());
            Rc::new(client)
        };

        let Some(auth) = options.auth.clone() else {
            let client = create(None);
            return Self {
                plain: client.clone(),
                authenticated: client,
                session: None,
            };
        };

        let plain = create(None);
        let session = AuthSession::new(plain.clone(), auth);
        let authenticated = create(Some(&session));
        tracing::debug!("Initialized authenticated api context");

        Self {
            plain,
            authenticated,
            session: Some(session),
        }
    }

    /// A context sending requests over reqwest.
    pub fn with_reqwest(options: ProviderOptions) -> Self {
        Self::new(Rc::new(ReqwestTransport::default()), options)
    }

    /// The authenticated client if `auth`, otherwise the plain one. They
    /// are the same client when no auth is configured.
    pub fn client(&self, auth: bool) -> Rc<HttpClient> {
        if auth {
            self.authenticated.clone()
        } else {
            self.plain.clone()
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    /// Whether auth is configured.
    pub fn has_auth(&self) -> bool {
        self.session.is_some()
    }

    /// A request scope over the plain client.
    pub fn request(&self, options: RequestOptions) -> RequestScope {
        RequestScope::new(self.plain.clone(), options)
    }

    /// A request scope over the authenticated client.
    pub fn api_request(&self, options: RequestOptions) -> RequestScope {
        RequestScope::new(self.authenticated.clone(), options)
    }
}

impl PartialEq for ApiContext {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.authenticated, &other.authenticated)
    }
}
