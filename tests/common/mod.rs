//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use courier_core::transport::{OutboundRequest, RawResponse, Transport, TransportError};
use reqwest::header::{HeaderName, HeaderValue};

pub const BASE: &str = "http://courier.test";

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

/// In-memory transport answering by path:
///
/// - `/status/<code>` answers `<code>` with an `x-courier-test` header
/// - `/refused` fails with a connection error
/// - `/slow/<ms>` sleeps, then answers 200
/// - `/json/<body>` answers 200 with `<body>`
/// - anything else answers 200 with the path as body
#[derive(Default)]
pub struct MockTransport {
    seen: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths in the order they were performed.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Transport for MockTransport {
    fn perform(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        let path = request.url.trim_start_matches(BASE).to_string();
        self.seen.lock().push(path.clone());

        if let Some(code) = path.strip_prefix("/status/") {
            let status: u16 = code.parse().unwrap_or(500);
            return Ok(RawResponse::from_bytes(status, format!("status {}", status)).with_header(
                HeaderName::from_static("x-courier-test"),
                HeaderValue::from_static("yes"),
            ));
        }
        if path == "/refused" {
            return Err(TransportError::Connect(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))));
        }
        if let Some(ms) = path.strip_prefix("/slow/") {
            thread::sleep(Duration::from_millis(ms.parse().unwrap_or(10)));
            return Ok(RawResponse::from_bytes(200, "slow"));
        }
        if let Some(body) = path.strip_prefix("/json/") {
            return Ok(RawResponse::from_bytes(200, body.to_string()));
        }
        Ok(RawResponse::from_bytes(200, path))
    }
}

/// Poll `done` until it holds, failing the test after five seconds.
pub fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

/// A request as received by [`LoopbackServer`].
#[derive(Debug, Clone)]
pub struct Captured {
    pub head: String,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    }

    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }
}

/// One-connection-per-response HTTP/1.1 server on 127.0.0.1.
pub struct LoopbackServer {
    pub base_url: String,
    captured: mpsc::Receiver<Captured>,
    handle: Option<JoinHandle<()>>,
}

impl LoopbackServer {
    /// Serve `responses` in order, one per connection, then exit.
    pub fn serve(responses: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, captured) = mpsc::channel();

        let handle = thread::spawn(move || {
            for response in responses {
                let (stream, _) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                if let Ok(request) = handle_connection(stream, &response) {
                    let _ = tx.send(request);
                }
            }
        });

        Self { base_url, captured, handle: Some(handle) }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn next_request(&self) -> Captured {
        self.captured.recv_timeout(Duration::from_secs(5)).expect("request captured")
    }
}

impl Drop for LoopbackServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn handle_connection(stream: TcpStream, response: &str) -> io::Result<Captured> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut head = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
        head.push_str(&line);
    }

    let length = head
        .lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.trim().eq_ignore_ascii_case("content-length").then(|| v.trim().parse().ok())?
        })
        .unwrap_or(0usize);
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;

    let mut stream = stream;
    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(Captured { head, body })
}

/// Build a full HTTP/1.1 response with `Connection: close`.
pub fn http_response(status_line: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {}\r\n", status_line);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n{}", body.len(), body));
    out
}

/// A loopback address nothing listens on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}
