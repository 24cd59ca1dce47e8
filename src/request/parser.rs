//! Payload parsers selected when a request is built.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::RequestError;
use crate::transport::RawResponse;

/// Decodes a raw response into a request's typed result.
///
/// Runs on a dispatcher thread.
pub trait ResponseParser: Send + Sync + 'static {
    type Output: Send + 'static;

    fn parse_response(&self, response: &mut RawResponse) -> Result<Self::Output, RequestError>;

    /// Refine an error before it is delivered.
    ///
    /// `response` is `None` when the transport failed before any status was
    /// received. The default attaches the error body as UTF-8 content.
    fn parse_network_error(
        &self,
        mut error: RequestError,
        response: Option<&mut RawResponse>,
    ) -> RequestError {
        if let Some(response) = response {
            match response.read_text() {
                Ok(text) => error.set_content(text),
                Err(e) => tracing::debug!(error = %e, "unable to read error body"),
            }
        }
        error
    }
}

fn read_body(response: &mut RawResponse) -> Result<Vec<u8>, RequestError> {
    response
        .read_bytes()
        .map_err(|e| RequestError::parse("failed to read response body").with_source(e))
}

/// UTF-8 text body.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl ResponseParser for TextParser {
    type Output = String;

    fn parse_response(&self, response: &mut RawResponse) -> Result<String, RequestError> {
        let bytes = read_body(response)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Raw body bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesParser;

impl ResponseParser for BytesParser {
    type Output = Vec<u8>;

    fn parse_response(&self, response: &mut RawResponse) -> Result<Vec<u8>, RequestError> {
        read_body(response)
    }
}

/// Top-level JSON object.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonObjectParser;

impl ResponseParser for JsonObjectParser {
    type Output = Map<String, Value>;

    fn parse_response(&self, response: &mut RawResponse) -> Result<Self::Output, RequestError> {
        match parse_value(response)? {
            Value::Object(map) => Ok(map),
            other => Err(RequestError::parse(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }
}

/// Top-level JSON array.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonArrayParser;

impl ResponseParser for JsonArrayParser {
    type Output = Vec<Value>;

    fn parse_response(&self, response: &mut RawResponse) -> Result<Self::Output, RequestError> {
        match parse_value(response)? {
            Value::Array(items) => Ok(items),
            other => Err(RequestError::parse(format!(
                "expected a JSON array, got {}",
                json_type(&other)
            ))),
        }
    }
}

/// Any serde-deserializable type.
pub struct JsonParser<D> {
    _marker: PhantomData<fn() -> D>,
}

impl<D> JsonParser<D> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<D> Default for JsonParser<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> ResponseParser for JsonParser<D>
where
    D: DeserializeOwned + Send + 'static,
{
    type Output = D;

    fn parse_response(&self, response: &mut RawResponse) -> Result<D, RequestError> {
        let bytes = read_body(response)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RequestError::parse(format!("invalid JSON payload: {}", e)).with_source(e))
    }
}

fn parse_value(response: &mut RawResponse) -> Result<Value, RequestError> {
    JsonParser::<Value>::new().parse_response(response)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ErrorKind;
    use serde::Deserialize;
    use std::io::{self, Read};

    #[test]
    fn test_text_parser() {
        let mut resp = RawResponse::from_bytes(200, "hello");
        assert_eq!(TextParser.parse_response(&mut resp).unwrap(), "hello");
    }

    #[test]
    fn test_bytes_parser_keeps_binary() {
        let mut resp = RawResponse::from_bytes(200, vec![0u8, 159, 146, 150]);
        assert_eq!(BytesParser.parse_response(&mut resp).unwrap(), vec![0u8, 159, 146, 150]);
    }

    #[test]
    fn test_json_object_parser() {
        let mut resp = RawResponse::from_bytes(200, r#"{"id": 7, "name": "x"}"#);
        let map = JsonObjectParser.parse_response(&mut resp).unwrap();
        assert_eq!(map["id"], 7);
    }

    #[test]
    fn test_json_object_rejects_array() {
        let mut resp = RawResponse::from_bytes(200, "[1, 2]");
        let err = JsonObjectParser.parse_response(&mut resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().contains("an array"));
    }

    #[test]
    fn test_json_array_parser() {
        let mut resp = RawResponse::from_bytes(200, "[1, 2, 3]");
        assert_eq!(JsonArrayParser.parse_response(&mut resp).unwrap().len(), 3);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let mut resp = RawResponse::from_bytes(200, "{\"id\":");
        let err = JsonArrayParser.parse_response(&mut resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
        login: String,
    }

    #[test]
    fn test_typed_json_parser() {
        let mut resp = RawResponse::from_bytes(200, r#"{"id": 1, "login": "octo"}"#);
        let user = JsonParser::<User>::new().parse_response(&mut resp).unwrap();
        assert_eq!(user, User { id: 1, login: "octo".into() });
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_body_read_failure_is_parse_error() {
        let mut resp = RawResponse::new(200, crate::transport::ResponseBody::new(Broken));
        let err = TextParser.parse_response(&mut resp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_default_network_error_attaches_body() {
        let mut resp = RawResponse::from_bytes(404, "no such user");
        let err = RequestError::status(resp.meta());
        let err = TextParser.parse_network_error(err, Some(&mut resp));
        assert_eq!(err.content(), Some("no such user"));
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_default_network_error_without_response() {
        let err = TextParser.parse_network_error(RequestError::internal("x"), None);
        assert!(err.content().is_none());
    }
}
