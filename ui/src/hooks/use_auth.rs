use client::{AuthSession, SessionSnapshot};
use yew::prelude::*;

use crate::contexts::use_api_context;

/// The current session, or `None` when auth is not configured. Components
/// calling this re-render whenever the session changes.
#[hook]
pub fn use_auth() -> Option<SessionSnapshot> {
    use_context::<SessionSnapshot>()
}

/// The session itself, for signing in and out.
#[hook]
pub fn use_session() -> Option<AuthSession> {
    use_api_context().session().cloned()
}
