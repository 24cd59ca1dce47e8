//! Reqwest-backed transport adapter.
//!
//! Owns client construction from [`TransportConfig`] and maps reqwest errors
//! into [`TransportError`]. Status codes are passed through untouched; the
//! dispatcher decides what counts as failure.

use reqwest::blocking::Client;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Url;

use super::{
    Method, OutboundRequest, RawResponse, RedirectPolicy, ResponseBody, Transport,
    TransportConfig, TransportError,
};

/// Blocking HTTP client shared by every dispatcher of a queue.
///
/// Must be built and dropped outside of an async runtime context.
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] when the client cannot be built
    /// (for example when no TLS backend can be initialised).
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let redirect = match config.redirect {
            RedirectPolicy::None => Policy::none(),
            RedirectPolicy::Limited(max) => Policy::limited(max),
        };
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(redirect)
            .cookie_store(config.cookie_store)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for ReqwestTransport {
    fn perform(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        let outbound = self.config.intercept(request);
        let url = Url::parse(&outbound.url).map_err(|e| TransportError::InvalidUrl {
            url: outbound.url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = self.client.request(to_reqwest_method(outbound.method), url);
        for (name, value) in &outbound.headers {
            let (name, value) = to_header(name, value)?;
            builder = builder.header(name, value);
        }
        if let Some(body) = outbound.wire_body() {
            if let Some(content_type) = &outbound.content_type {
                builder = builder.header(CONTENT_TYPE, content_type.as_str());
            }
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content_length = response.content_length();
        let final_url = response.url().to_string();

        Ok(RawResponse {
            status,
            headers,
            body: ResponseBody::new(response),
            content_length,
            url: final_url,
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Patch => reqwest::Method::PATCH,
    }
}

fn to_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TransportError> {
    let invalid = |reason: String| TransportError::InvalidHeader { name: name.to_string(), reason };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}

// Url and headers are validated before the builder runs, so anything else
// the builder rejects is reported as a failed exchange.
fn map_transport_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(Box::new(error))
    } else if error.is_connect() {
        TransportError::Connect(Box::new(error))
    } else {
        TransportError::Io(Box::new(error))
    }
}
