//! Fetch state for a single call site.
//!
//! A [`Fetch`] wraps a [`Caller`] and tracks what a view needs to render
//! it: the latest data, the latest error, whether the first call is still
//! loading, and whether any call is outstanding. It is a small reactive
//! store: every change is pushed to subscribers, and [`Fetch::sync`] is
//! the effect that re-issues the call when its inputs change.
//!
//! ```rust,ignore
//! let fetch = Fetch::new(get_user, FetchOptions::new(user_id));
//! let _subscription = fetch.subscribe(|state| render(state));
//! if let Some(call) = fetch.sync() {
//!     spawn_local(async move { let _ = call.await; });
//! }
//! ```

use futures::future::LocalBoxFuture;
use payloads::{ApiResult, ResultError, codes};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::api::Caller;
use crate::notify::{Subscribers, Subscription};

/// Combines the previous data with newly fetched data.
pub type DataFolder<R, S> = Rc<dyn Fn(Option<S>, R) -> S>;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<S, P = Value> {
    pub data: Option<S>,
    pub error: Option<ResultError<P>>,
    /// True until the first call settles.
    pub loading: bool,
    /// True while the most recent call is outstanding.
    pub refetching: bool,
    /// Number of successful settlements so far.
    pub version: u64,
}

pub struct FetchOptions<A, R, S = R> {
    pub args: A,
    /// Don't call automatically; wait for [`Fetch::refetch`].
    pub skip: bool,
    /// Changing this re-issues the call.
    pub refresh_version: u64,
    pub on_data: DataFolder<R, S>,
}

impl<A, R: 'static> FetchOptions<A, R, R> {
    /// Options that replace the data with each result.
    pub fn new(args: A) -> Self {
        Self {
            args,
            skip: false,
            refresh_version: 0,
            on_data: Rc::new(|_, data| data),
        }
    }
}

impl<A: Default, R: 'static> Default for FetchOptions<A, R, R> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: Clone, R, S> Clone for FetchOptions<A, R, S> {
    fn clone(&self) -> Self {
        Self {
            args: self.args.clone(),
            skip: self.skip,
            refresh_version: self.refresh_version,
            on_data: self.on_data.clone(),
        }
    }
}

impl<A, R, S> FetchOptions<A, R, S> {
    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn refresh_version(mut self, refresh_version: u64) -> Self {
        self.refresh_version = refresh_version;
        self
    }

    /// Fold each result into the previous data instead of replacing it,
    /// e.g. to accumulate pages.
    pub fn on_data<T>(
        self,
        on_data: impl Fn(Option<T>, R) -> T + 'static,
    ) -> FetchOptions<A, R, T> {
        FetchOptions {
            args: self.args,
            skip: self.skip,
            refresh_version: self.refresh_version,
            on_data: Rc::new(on_data),
        }
    }
}

/// Inputs that re-issue the call when they change.
struct EffectKey<A, R, P> {
    caller: Caller<A, R, P>,
    args: A,
    skip: bool,
    refresh_version: u64,
}

impl<A: PartialEq, R, P> PartialEq for EffectKey<A, R, P> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.caller, &other.caller)
            && self.args == other.args
            && self.skip == other.skip
            && self.refresh_version == other.refresh_version
    }
}

struct FetchInner<A, R, S, P> {
    state: RefCell<FetchState<S, P>>,
    /// Number of calls issued.
    count: Cell<u64>,
    caller: RefCell<Caller<A, R, P>>,
    options: RefCell<FetchOptions<A, R, S>>,
    last_effect: RefCell<Option<EffectKey<A, R, P>>>,
    subscribers: Subscribers<FetchState<S, P>>,
}

pub struct Fetch<A, R, S = R, P = Value> {
    inner: Rc<FetchInner<A, R, S, P>>,
}

impl<A, R, S, P> Clone for Fetch<A, R, S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, R, S, P> Fetch<A, R, S, P>
where
    A: Clone + PartialEq + 'static,
    R: Clone + 'static,
    S: Clone + 'static,
    P: Clone + 'static,
{
    pub fn new(caller: Caller<A, R, P>, options: FetchOptions<A, R, S>) -> Self {
        let state = FetchState {
            data: None,
            error: None,
            loading: !options.skip,
            refetching: false,
            version: 0,
        };
        Self {
            inner: Rc::new(FetchInner {
                state: RefCell::new(state),
                count: Cell::new(0),
                caller: RefCell::new(caller),
                options: RefCell::new(options),
                last_effect: RefCell::new(None),
                subscribers: Subscribers::new(),
            }),
        }
    }

    pub fn state(&self) -> FetchState<S, P> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<S> {
        self.inner.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ResultError<P>> {
        self.inner.state.borrow().error.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn refetching(&self) -> bool {
        self.inner.state.borrow().refetching
    }

    pub fn version(&self) -> u64 {
        self.inner.state.borrow().version
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&FetchState<S, P>) + 'static,
    ) -> Subscription {
        self.inner.subscribers.subscribe(listener)
    }

    pub fn set_caller(&self, caller: Caller<A, R, P>) {
        *self.inner.caller.borrow_mut() = caller;
    }

    pub fn set_options(&self, options: FetchOptions<A, R, S>) {
        *self.inner.options.borrow_mut() = options;
    }

    pub fn set_args(&self, args: A) {
        self.inner.options.borrow_mut().args = args;
    }

    pub fn set_skip(&self, skip: bool) {
        self.inner.options.borrow_mut().skip = skip;
    }

    pub fn set_refresh_version(&self, refresh_version: u64) {
        self.inner.options.borrow_mut().refresh_version = refresh_version;
    }

    /// Override the data, e.g. for optimistic updates.
    pub fn set_data(&self, update: impl FnOnce(Option<S>) -> Option<S>) {
        let next = update(self.data());
        self.update(|state| state.data = next);
    }

    /// Issue the call if the caller, args, skip flag or refresh version
    /// changed since the last sync. The first sync always counts as a
    /// change. Returns the call to drive, if one was issued.
    pub fn sync(&self) -> Option<LocalBoxFuture<'static, ApiResult<R, P>>> {
        let key = {
            let options = self.inner.options.borrow();
            EffectKey {
                caller: self.inner.caller.borrow().clone(),
                args: options.args.clone(),
                skip: options.skip,
                refresh_version: options.refresh_version,
            }
        };

        if self.inner.last_effect.borrow().as_ref() == Some(&key) {
            return None;
        }
        let skip = key.skip;
        *self.inner.last_effect.borrow_mut() = Some(key);

        if skip { None } else { Some(self.refetch()) }
    }

    /// Issue the call now. State is marked as refetching before this
    /// returns; the returned future settles the call and yields its
    /// result.
    pub fn refetch(&self) -> LocalBoxFuture<'static, ApiResult<R, P>> {
        let sequence = self.inner.count.get() + 1;
        self.inner.count.set(sequence);
        self.update(|state| {
            state.refetching = true;
            if sequence == 1 {
                state.loading = true;
            }
        });

        let caller = self.inner.caller.borrow().clone();
        let args = self.inner.options.borrow().args.clone();
        let call = caller(args);
        let fetch = self.clone();

        Box::pin(async move {
            let result = call.await;
            fetch.settle(sequence, &result);
            result
        })
    }

    fn settle(&self, sequence: u64, result: &ApiResult<R, P>) {
        let latest = self.inner.count.get();
        tracing::trace!(sequence, latest, ok = result.is_ok(), "Call settled");

        // Folded outside of the state borrow, on_data is caller code.
        let data = match result {
            Ok(data) => {
                let on_data = self.inner.options.borrow().on_data.clone();
                Some(on_data(self.data(), data.clone()))
            }
            Err(_) => None,
        };

        self.update(|state| {
            match (result, data) {
                (Ok(_), Some(data)) => {
                    state.data = Some(data);
                    state.error = None;
                    state.version += 1;
                }
                // A superseded call leaves the state alone.
                (Err(error), _) if error.is_code(codes::CANCELED) => {}
                (Err(error), _) => state.error = Some(error.clone()),
                (Ok(_), None) => {}
            }

            if sequence == 1 {
                state.loading = false;
            }
            if sequence == latest {
                state.refetching = false;
            }
        });
    }

    fn update(&self, change: impl FnOnce(&mut FetchState<S, P>)) {
        change(&mut self.inner.state.borrow_mut());
        let snapshot = self.state();
        self.inner.subscribers.notify(&snapshot);
    }
}
