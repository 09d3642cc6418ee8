//! Completion listeners and subscriptions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::dispatcher::Dispatcher;
use crate::errors::CastError;

type Completion<T> = Box<dyn FnOnce(Result<T, CastError>) + Send + 'static>;

/// One-shot outcome callback for an asynchronous command.
///
/// The listener is consumed when it completes, so a command can never
/// report both a success and an error, nor report twice.
pub struct ResponseListener<T> {
    callback: Completion<T>,
}

impl<T: Send + 'static> ResponseListener<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<T, CastError>) + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn from_fns<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(CastError) + Send + 'static,
    {
        Self::new(move |result| match result {
            Ok(value) => on_success(value),
            Err(err) => on_error(err),
        })
    }

    /// A listener that discards the outcome.
    pub fn ignore() -> Self {
        Self::new(|_| {})
    }

    /// Runs the callback synchronously on the current thread.
    pub fn complete(self, result: Result<T, CastError>) {
        (self.callback)(result)
    }

    /// Delivers `result` through the dispatcher.
    pub fn post(self, dispatcher: &Dispatcher, result: Result<T, CastError>) {
        dispatcher.post(move || self.complete(result));
    }

    pub fn post_success(self, dispatcher: &Dispatcher, value: T) {
        self.post(dispatcher, Ok(value));
    }

    pub fn post_error(self, dispatcher: &Dispatcher, error: CastError) {
        self.post(dispatcher, Err(error));
    }

    /// Rewraps the listener so it accepts a different success type.
    pub fn map<U, F>(self, f: F) -> ResponseListener<U>
    where
        U: Send + 'static,
        F: FnOnce(U) -> T + Send + 'static,
    {
        ResponseListener::new(move |result: Result<U, CastError>| self.complete(result.map(f)))
    }
}

impl<T> fmt::Debug for ResponseListener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseListener")
    }
}

/// A listener shared between a platform callback and the synchronous error
/// path of the same call. Whoever takes it first delivers the outcome.
pub(crate) struct SharedListener<T>(Arc<Mutex<Option<ResponseListener<T>>>>);

impl<T> Clone for SharedListener<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Send + 'static> SharedListener<T> {
    pub(crate) fn new(listener: ResponseListener<T>) -> Self {
        Self(Arc::new(Mutex::new(Some(listener))))
    }

    pub(crate) fn post(&self, dispatcher: &Dispatcher, result: Result<T, CastError>) {
        let taken = self.0.lock().unwrap().take();
        if let Some(listener) = taken {
            listener.post(dispatcher, result);
        }
    }
}

type Subscriber<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Set of value subscribers notified through the dispatcher.
pub struct SubscriberSet<T> {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Subscriber<T>)>>,
}

impl<T: Clone + Send + 'static> SubscriberSet<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn subscribe<F>(self: &Arc<Self>, f: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().push((id, Arc::new(f)));

        let set: Weak<Self> = Arc::downgrade(self);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(set) = set.upgrade() {
                    set.unsubscribe(id);
                }
            })),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().unwrap().retain(|(sid, _)| *sid != id);
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    /// Posts `value` to every current subscriber.
    pub fn notify(&self, dispatcher: &Dispatcher, value: T) {
        let subscribers: Vec<Subscriber<T>> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();

        for subscriber in subscribers {
            let value = value.clone();
            dispatcher.post(move || subscriber(value));
        }
    }
}

/// Handle returned by every `subscribe_*` method.
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to end it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
