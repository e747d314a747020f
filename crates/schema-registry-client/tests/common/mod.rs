// crates/schema-registry-client/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Fake HTTP endpoints for registry and OAuth tests.
// Purpose: Serve scripted responses and record every request received.
// Dependencies: tiny_http
// ============================================================================

//! ## Overview
//! [`FakeServer`] runs a `tiny_http` server on an ephemeral port. Every request
//! is recorded and answered by a handler closure. Dropping the server unblocks
//! the accept loop and joins the thread.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Recorded Requests
// ============================================================================

/// One request as received by the fake server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Path and query.
    pub url: String,
    /// Header pairs with lowercase names.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: String,
}

impl RecordedRequest {
    /// Returns the path without the query string.
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }

    /// Returns the first header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers.iter().find(|(key, _)| *key == name).map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// SECTION: Fake Server
// ============================================================================

/// Scripted HTTP server.
pub struct FakeServer {
    /// Base URL, for example `http://127.0.0.1:40000`.
    pub base_url: String,
    /// Requests received so far.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Server handle used to unblock the accept loop.
    server: Arc<Server>,
    /// Accept loop thread.
    handle: Option<JoinHandle<()>>,
}

impl FakeServer {
    /// Starts a server answering every request with `handler`.
    pub fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let accept_server = Arc::clone(&server);
        let accept_requests = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            for mut request in accept_server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|header| {
                            (
                                header.field.as_str().as_str().to_ascii_lowercase(),
                                header.value.as_str().to_string(),
                            )
                        })
                        .collect(),
                    body,
                };
                accept_requests.lock().unwrap().push(recorded.clone());
                let (status, body) = handler(&recorded);
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response =
                    Response::from_string(body).with_status_code(status).with_header(content_type);
                let _ = request.respond(response);
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            requests,
            server,
            handle: Some(handle),
        }
    }

    /// Starts a server that always answers with the same status and body.
    pub fn fixed(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::spawn(move |_| (status, body.clone()))
    }

    /// Returns the number of requests received.
    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Returns a copy of every request received.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the number of requests whose path equals `path`.
    pub fn hits_for(&self, path: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|request| request.path() == path).count()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Returns a base URL nothing is listening on.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
