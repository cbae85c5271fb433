//! Health responder on raw sockets.
//!
//! Accepts on a blocking `std::net::TcpListener`, handles each connection on
//! its own thread, reads one chunk of the request, answers and closes.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use tracing::{error, info};

use super::{ServerError, HEALTH_BODY, NOT_FOUND_BODY};
use crate::config::{ACCEPT_ERROR_BACKOFF, RAW_READ_LIMIT};

const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// What a request was classified as.
#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    Health,
    /// Carries the requested target, or `unknown` if none could be read.
    NotFound(String),
}

/// Classify a request by its request line. `GET` on a target starting with
/// `/health` is a health check; anything else is a 404.
pub fn classify(request: &str) -> Route {
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next();
    let target = parts.next();

    match (method, target) {
        (Some("GET"), Some(t)) if t.starts_with("/health") => Route::Health,
        (_, Some(t)) => Route::NotFound(t.to_string()),
        _ => Route::NotFound("unknown".into()),
    }
}

/// Full HTTP/1.1 response for a route, with `Content-Length`.
pub fn render(route: &Route) -> String {
    let (status, content_type, body) = match route {
        Route::Health => ("200 OK", "application/json", HEALTH_BODY),
        Route::NotFound(_) => ("404 Not Found", "text/plain", NOT_FOUND_BODY),
    };
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

pub struct RawHealthServer {
    listener: TcpListener,
}

impl RawHealthServer {
    pub fn bind(host: &str, port: u16) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        info!("health server started on {}", addr);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept forever, one thread per connection.
    pub fn serve(&self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    thread::spawn(move || {
                        if let Err(e) = handle_client(stream, peer) {
                            error!(peer = %peer.ip(), error = %e, "client handling error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "socket error");
                    thread::sleep(ACCEPT_ERROR_BACKOFF);
                }
            }
        }
    }
}

fn handle_client(mut stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut buf = [0u8; RAW_READ_LIMIT];
    let n = stream.read(&mut buf)?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let route = classify(&request);
    match &route {
        Route::Health => info!(peer = %peer.ip(), "health check"),
        Route::NotFound(path) => info!(peer = %peer.ip(), path = %path, "404 request"),
    }

    stream.write_all(render(&route).as_bytes())?;
    stream.flush()
}
