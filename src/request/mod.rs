//! Work items submitted to a [`RequestQueue`](crate::scheduler::RequestQueue).
//!
//! A [`Request`] pairs an HTTP exchange description with the
//! [`ResponseParser`] that turns the raw response into `T`, and the listeners
//! that receive the typed result on the request's delivery target.

mod error;
mod parser;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use error::{ErrorKind, QueueError, RequestError};
pub use parser::{
    BytesParser, JsonArrayParser, JsonObjectParser, JsonParser, ResponseParser, TextParser,
};

use crate::delivery::{DeliveryTarget, Job};
use crate::scheduler::{InFlight, Priority};
use crate::transport::{Method, OutboundRequest, RawResponse};

/// Content type used for form-encoded parameter bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique request identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

type SuccessListener<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorListener = Box<dyn Fn(RequestError) + Send + Sync>;
type CancelHook = Box<dyn FnOnce() + Send>;

/// Set once when the queue accepts the request.
struct Submission {
    owner: Weak<InFlight>,
    target: Arc<dyn DeliveryTarget>,
}

/// A unit of asynchronous work producing `T`.
pub struct Request<T> {
    id: RequestId,
    method: Method,
    url: RwLock<String>,
    priority: Priority,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    body_content_type: Option<String>,
    parser: Box<dyn ResponseParser<Output = T>>,
    on_success: Option<SuccessListener<T>>,
    on_error: Option<ErrorListener>,
    cancel_hooks: Mutex<Vec<CancelHook>>,
    sequence: AtomicU64,
    canceled: AtomicBool,
    delivered: AtomicBool,
    finished: AtomicBool,
    submission: OnceLock<Submission>,
}

impl Request<String> {
    /// Request whose body is decoded as UTF-8 text.
    pub fn text(method: Method, url: impl Into<String>) -> Self {
        Self::with_parser(method, url, TextParser)
    }
}

impl Request<Vec<u8>> {
    pub fn bytes(method: Method, url: impl Into<String>) -> Self {
        Self::with_parser(method, url, BytesParser)
    }
}

impl Request<Map<String, Value>> {
    pub fn json_object(method: Method, url: impl Into<String>) -> Self {
        Self::with_parser(method, url, JsonObjectParser)
    }
}

impl Request<Vec<Value>> {
    pub fn json_array(method: Method, url: impl Into<String>) -> Self {
        Self::with_parser(method, url, JsonArrayParser)
    }
}

impl<D: DeserializeOwned + Send + 'static> Request<D> {
    /// Request whose body is deserialized into `D`.
    pub fn json(method: Method, url: impl Into<String>) -> Self {
        Self::with_parser(method, url, JsonParser::<D>::new())
    }
}

impl<T: Send + 'static> Request<T> {
    pub fn with_parser<P>(method: Method, url: impl Into<String>, parser: P) -> Self
    where
        P: ResponseParser<Output = T>,
    {
        Self {
            id: RequestId::next(),
            method,
            url: RwLock::new(url.into()),
            priority: Priority::default(),
            headers: Vec::new(),
            body: None,
            body_content_type: None,
            parser: Box::new(parser),
            on_success: None,
            on_error: None,
            cancel_hooks: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            canceled: AtomicBool::new(false),
            delivered: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            submission: OnceLock::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Raw body, sent for POST, PUT, DELETE and PATCH.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.body_content_type = Some(content_type.into());
        self
    }

    /// Form-encoded parameter body.
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        if !encoded.is_empty() {
            self.body = Some(encoded.into_bytes());
            self.body_content_type = Some(FORM_CONTENT_TYPE.to_string());
        }
        self
    }

    pub fn on_success(mut self, listener: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(listener));
        self
    }

    pub fn on_error(mut self, listener: impl Fn(RequestError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(listener));
        self
    }

    /// Run `hook` once when the request is first canceled.
    pub fn on_cancel(self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.cancel_hooks.lock().push(Box::new(hook));
        self
    }

    pub(crate) fn take_listeners(&mut self) -> (Option<SuccessListener<T>>, Option<ErrorListener>) {
        (self.on_success.take(), self.on_error.take())
    }
}

impl<T> Request<T> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> String {
        self.url.read().clone()
    }

    /// Change the URL of a request that has not been submitted yet.
    pub fn set_url(&self, url: impl Into<String>) -> Result<(), QueueError> {
        let mut current = self.url.write();
        if self.is_submitted() {
            return Err(QueueError::UrlLocked(self.id.to_string()));
        }
        *current = url.into();
        Ok(())
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Submission sequence number; `None` before submission.
    pub fn sequence(&self) -> Option<u64> {
        self.is_submitted().then(|| self.sequence.load(Ordering::Acquire))
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn body_content_type(&self) -> Option<&str> {
        self.body_content_type.as_deref()
    }

    pub fn is_submitted(&self) -> bool {
        self.submission.get().is_some()
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Mark the request as canceled. Returns `true` if this call flipped it.
    ///
    /// A canceled request is never delivered. Cancel hooks run on the
    /// calling thread.
    pub fn cancel(&self) -> bool {
        if self.canceled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let hooks = std::mem::take(&mut *self.cancel_hooks.lock());
        for hook in hooks {
            if panic::catch_unwind(AssertUnwindSafe(hook)).is_err() {
                tracing::warn!(request_id = %self.id, "cancel hook panicked");
            }
        }
        true
    }

    pub fn is_response_delivered(&self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }

    /// Whether the queue has released this request.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn bind(
        &self,
        owner: Weak<InFlight>,
        target: Arc<dyn DeliveryTarget>,
        sequence: u64,
    ) -> Result<(), QueueError> {
        // Hold the url lock so set_url observes either before or after binding.
        let _url = self.url.write();
        self.submission
            .set(Submission { owner, target })
            .map_err(|_| QueueError::AlreadySubmitted(self.id.to_string()))?;
        self.sequence.store(sequence, Ordering::Release);
        Ok(())
    }

    /// Release the request from its queue. Only the first call has effect.
    pub(crate) fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(owner) = self.submission.get().and_then(|s| s.owner.upgrade()) {
            owner.remove(self.id);
        }
        true
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &*self.url.read())
            .field("priority", &self.priority)
            .field("sequence", &self.sequence())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Finishes the request when dropped, whether or not its job ran.
struct Finisher<T>(Arc<Request<T>>);

impl<T> Drop for Finisher<T> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Type-erased view of a request used by the queue and dispatchers.
pub(crate) trait Dispatchable: Send + Sync {
    fn id(&self) -> RequestId;
    fn priority(&self) -> Priority;
    fn is_canceled(&self) -> bool;
    fn cancel(&self) -> bool;
    fn outbound(&self) -> OutboundRequest;
    fn is_response_delivered(&self) -> bool;
    fn mark_response_delivered(&self);
    fn refine_error(&self, error: RequestError, response: Option<&mut RawResponse>) -> RequestError;
    /// Parse the response into a job delivering the value.
    fn parse(self: Arc<Self>, response: &mut RawResponse) -> Result<Job, RequestError>;
    /// Job delivering `error`.
    fn error_job(self: Arc<Self>, error: RequestError) -> Job;
    fn finish(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn target(&self) -> Option<Arc<dyn DeliveryTarget>>;
}

impl<T: Send + 'static> Dispatchable for Request<T> {
    fn id(&self) -> RequestId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn is_canceled(&self) -> bool {
        Request::is_canceled(self)
    }

    fn cancel(&self) -> bool {
        Request::cancel(self)
    }

    fn outbound(&self) -> OutboundRequest {
        OutboundRequest {
            method: self.method,
            url: self.url(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            content_type: self.body_content_type.clone(),
        }
    }

    fn is_response_delivered(&self) -> bool {
        Request::is_response_delivered(self)
    }

    fn mark_response_delivered(&self) {
        self.delivered.store(true, Ordering::Release);
    }

    fn refine_error(&self, error: RequestError, response: Option<&mut RawResponse>) -> RequestError {
        self.parser.parse_network_error(error, response)
    }

    fn parse(self: Arc<Self>, response: &mut RawResponse) -> Result<Job, RequestError> {
        let value = self.parser.parse_response(response)?;
        let finisher = Finisher(self);
        Ok(Box::new(move || {
            let request = &finisher.0;
            if request.is_canceled() {
                return;
            }
            if let Some(listener) = &request.on_success {
                listener(value);
            }
        }))
    }

    fn error_job(self: Arc<Self>, error: RequestError) -> Job {
        let finisher = Finisher(self);
        Box::new(move || {
            let request = &finisher.0;
            if request.is_canceled() {
                return;
            }
            if let Some(listener) = &request.on_error {
                listener(error);
            }
        })
    }

    fn finish(&self) -> bool {
        Request::finish(self)
    }

    fn is_finished(&self) -> bool {
        Request::is_finished(self)
    }

    fn target(&self) -> Option<Arc<dyn DeliveryTarget>> {
        self.submission.get().map(|s| Arc::clone(&s.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::ImmediateTarget;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_ids_are_unique() {
        let a = Request::text(Method::Get, "http://localhost/a");
        let b = Request::text(Method::Get, "http://localhost/a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_builder_defaults() {
        let req = Request::bytes(Method::Get, "http://localhost/img");
        assert_eq!(req.priority(), Priority::Normal);
        assert_eq!(req.sequence(), None);
        assert!(!req.is_canceled());
        assert!(!req.is_response_delivered());
        assert!(req.body().is_none());
    }

    #[test]
    fn test_params_are_form_encoded() {
        let req = Request::text(Method::Post, "http://localhost/login")
            .with_params([("user", "a b"), ("pass", "x&y=z")]);
        assert_eq!(req.body(), Some(&b"user=a+b&pass=x%26y%3Dz"[..]));
        assert_eq!(req.body_content_type(), Some(FORM_CONTENT_TYPE));
    }

    #[test]
    fn test_empty_params_leave_no_body() {
        let req = Request::text(Method::Post, "http://localhost/").with_params(Vec::<(String, String)>::new());
        assert!(req.body().is_none());
    }

    #[test]
    fn test_outbound_snapshot() {
        let req = Request::json_object(Method::Put, "http://localhost/doc")
            .header("Accept", "application/json")
            .with_body(r#"{"a":1}"#, "application/json");
        let out = Dispatchable::outbound(&req);
        assert_eq!(out.method, Method::Put);
        assert_eq!(out.url, "http://localhost/doc");
        assert_eq!(out.headers, vec![("Accept".to_string(), "application/json".to_string())]);
        assert_eq!(out.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_cancel_flips_once_and_runs_hooks_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let req = Request::text(Method::Get, "http://localhost/").on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(req.cancel());
        assert!(!req.cancel());
        assert!(req.is_canceled());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_url_locked_after_bind() {
        let req = Request::text(Method::Get, "http://localhost/a");
        req.set_url("http://localhost/b").unwrap();
        assert_eq!(req.url(), "http://localhost/b");

        req.bind(Weak::new(), Arc::new(ImmediateTarget), 7).unwrap();
        assert_eq!(req.sequence(), Some(7));
        assert!(matches!(req.set_url("http://localhost/c"), Err(QueueError::UrlLocked(_))));
        assert_eq!(req.url(), "http://localhost/b");
        assert!(matches!(
            req.bind(Weak::new(), Arc::new(ImmediateTarget), 8),
            Err(QueueError::AlreadySubmitted(_))
        ));
    }

    #[test]
    fn test_success_job_invokes_listener_then_finishes() {
        let got = Arc::new(Mutex::new(None));
        let g = got.clone();
        let req = Arc::new(
            Request::text(Method::Get, "http://localhost/").on_success(move |s| *g.lock() = Some(s)),
        );
        let mut resp = RawResponse::from_bytes(200, "body");
        let job = Arc::clone(&req).parse(&mut resp).unwrap();
        assert!(!req.is_finished());
        job();
        assert_eq!(got.lock().as_deref(), Some("body"));
        assert!(req.is_finished());
    }

    #[test]
    fn test_canceled_job_skips_listener_but_finishes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let req = Arc::new(Request::text(Method::Get, "http://localhost/").on_error(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        let job = Arc::clone(&req).error_job(RequestError::internal("boom"));
        req.cancel();
        job();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(req.is_finished());
    }

    #[test]
    fn test_dropped_job_still_finishes() {
        let req = Arc::new(Request::text(Method::Get, "http://localhost/"));
        let job = Arc::clone(&req).error_job(RequestError::internal("never run"));
        drop(job);
        assert!(req.is_finished());
        // Second finish is a no-op.
        assert!(!req.finish());
    }
}
