//! Transport configuration.
//!
//! One explicit object per transport instance; nothing here is process-wide.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::OutboundRequest;

/// User agent sent when the configuration does not override it.
pub const DEFAULT_USER_AGENT: &str = "courier/1";

/// Hook run on every outbound request before it reaches the wire.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: &mut OutboundRequest);
}

impl<F> Interceptor for F
where
    F: Fn(&mut OutboundRequest) + Send + Sync,
{
    fn intercept(&self, request: &mut OutboundRequest) {
        self(request)
    }
}

/// How redirects are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Return 3xx responses as-is.
    None,
    /// Follow up to `n` hops.
    Limited(usize),
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::Limited(10)
    }
}

/// Settings applied when building a transport client.
#[derive(Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Whole-exchange timeout, headers included.
    pub timeout: Duration,
    pub user_agent: String,
    pub redirect: RedirectPolicy,
    pub cookie_store: bool,
    /// Run in order before every exchange.
    pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            redirect: RedirectPolicy::default(),
            cookie_store: false,
            interceptors: Vec::new(),
        }
    }
}

impl TransportConfig {
    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Apply every interceptor to a copy of `request`.
    pub fn intercept(&self, request: &OutboundRequest) -> OutboundRequest {
        let mut outbound = request.clone();
        for interceptor in &self.interceptors {
            interceptor.intercept(&mut outbound);
        }
        outbound
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("redirect", &self.redirect)
            .field("cookie_store", &self.cookie_store)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
