//! # HTTP Transport
//!
//! One protocol message per HTTP request body, one reply per response body.
//!
//! ## Server
//! - Any path, `POST` only; other methods get `405`
//! - The body is processed on a blocking worker over memory buffers
//! - Replies carry `Content-Type: application/json`; oneway calls get an empty body
//! - A body that does not hold one complete message gets `400`
//!
//! ## Client
//! [`HttpClientTransport`] collects writes and sends them as one `POST` on
//! flush. The response body is buffered and served to subsequent reads.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::socket::resolve;
use super::{MemoryBuffer, Transport};
use crate::config::{ClientConfig, NetworkConfig};
use crate::core::schema::ServiceSpec;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::client::Client;
use crate::protocol::processor::Processor;
use crate::utils::metrics::Metrics;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Client over HTTP.
pub type HttpClient = Client<HttpClientTransport>;

#[derive(Clone)]
struct HttpState {
    processor: Arc<Processor>,
    metrics: Arc<Metrics>,
}

#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    processor: Arc<Processor>,
    metrics: Arc<Metrics>,
}

impl HttpServer {
    /// Bind to `config.server.address`.
    pub async fn bind(processor: Processor, config: &NetworkConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.address).await?;
        Ok(Self {
            listener,
            processor: Arc::new(processor),
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// The request router, for embedding into a larger application.
    pub fn router(&self) -> Router {
        build_router(HttpState {
            processor: Arc::clone(&self.processor),
            metrics: Arc::clone(&self.metrics),
        })
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });
        self.serve_with_shutdown(shutdown_rx).await
    }

    /// Serve until a message arrives on `shutdown_rx` or its sender is dropped.
    /// In-flight requests are allowed to finish.
    pub async fn serve_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let router = self.router();
        info!(
            address = ?self.listener.local_addr().ok(),
            service = %self.processor.service().name(),
            "Listening for HTTP requests"
        );
        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Shutting down HTTP server");
            })
            .await?;
        self.metrics.log_metrics();
        Ok(())
    }
}

fn build_router(state: HttpState) -> Router {
    let limit = state.processor.max_message_size();
    Router::new()
        .fallback(handle_rpc)
        .layer(DefaultBodyLimit::max(limit))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn handle_rpc(State(state): State<HttpState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST")],
        )
            .into_response();
    }

    let processor = Arc::clone(&state.processor);
    let handled = tokio::task::spawn_blocking(move || {
        let mut input = MemoryBuffer::from(body);
        let mut output = MemoryBuffer::new();
        processor
            .process(&mut input, &mut output)
            .map(|exchange| (exchange, output.into_bytes()))
    })
    .await;

    match handled {
        Ok(Ok((exchange, reply))) => {
            state.metrics.record_exchange(&exchange);
            ([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], reply).into_response()
        }
        Ok(Err(e)) => {
            state.metrics.protocol_error();
            debug!(error = %e, "Rejecting request body");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "Request worker failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = started_at.elapsed().as_millis(),
        "request summary"
    );
    if status.is_client_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), "request rejected");
    }

    response
}

/// Blocking HTTP/1.1 client transport.
///
/// Every flush opens a fresh connection (`Connection: close`).
#[derive(Debug)]
pub struct HttpClientTransport {
    address: String,
    path: String,
    config: ClientConfig,
    max_response_size: usize,
    request: Vec<u8>,
    response: MemoryBuffer,
}

impl HttpClientTransport {
    /// Target `address` (`host:port`) at `path`.
    pub fn new(address: impl Into<String>, path: impl Into<String>, config: &ClientConfig) -> Self {
        Self {
            address: address.into(),
            path: path.into(),
            config: config.clone(),
            max_response_size: crate::config::MAX_MESSAGE_SIZE,
            request: Vec::new(),
            response: MemoryBuffer::new(),
        }
    }

    /// Parse an `http://host:port/path` URL.
    pub fn from_url(url: &str, config: &ClientConfig) -> Result<Self> {
        let rest = url.strip_prefix("http://").ok_or_else(|| {
            ProtocolError::ConfigError(format!("only http:// URLs are supported: '{url}'"))
        })?;
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(ProtocolError::ConfigError(format!("missing host in '{url}'")));
        }
        let address = if authority.contains(':') {
            authority.to_string()
        } else {
            format!("{authority}:80")
        };
        Ok(Self::new(address, path, config))
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn post(&self, body: &[u8]) -> Result<Vec<u8>> {
        let addr = resolve(&self.address)?;
        let mut stream = TcpStream::connect_timeout(&addr, self.config.connection_timeout)?;
        stream.set_read_timeout(Some(self.config.response_timeout))?;
        stream.set_nodelay(true)?;

        let head = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: {JSON_CONTENT_TYPE}\r\nAccept: {JSON_CONTENT_TYPE}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.path,
            self.address,
            body.len()
        );
        stream.write_all(head.as_bytes())?;
        stream.write_all(body)?;
        stream.flush()?;

        read_response(BufReader::new(stream), self.max_response_size)
    }
}

impl Transport for HttpClientTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.response.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.request.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.request.is_empty() {
            return Ok(());
        }
        let body = std::mem::take(&mut self.request);
        let reply = self.post(&body)?;
        debug!(sent = body.len(), received = reply.len(), "HTTP exchange complete");
        self.response = MemoryBuffer::from(reply);
        Ok(())
    }
}

/// Upper bound on the response head, status line included.
const MAX_HEAD_SIZE: usize = 16 * 1024;
const MAX_HEADERS: usize = 64;

/// Read status line, headers and body of one HTTP/1.1 response.
fn read_response<R: BufRead>(mut reader: R, max_size: usize) -> Result<Vec<u8>> {
    let head = read_head(&mut reader)?;
    let malformed = |detail: String| {
        ProtocolError::TransportError(format!("{}: {detail}", constants::ERR_HTTP_HEADER))
    };

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(&head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => return Err(malformed("incomplete head".into())),
        Err(e) => return Err(malformed(e.to_string())),
    }
    let status = response
        .code
        .ok_or_else(|| malformed("missing status code".into()))?;

    let mut content_length = None;
    let mut chunked = false;
    for h in response.headers.iter() {
        let value = String::from_utf8_lossy(h.value);
        if h.name.eq_ignore_ascii_case("content-length") {
            let len = value
                .trim()
                .parse::<usize>()
                .map_err(|_| malformed(format!("content-length '{value}'")))?;
            content_length = Some(len);
        } else if h.name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
        }
    }

    let body = if chunked {
        read_chunked(&mut reader, max_size)?
    } else if let Some(len) = content_length {
        if len > max_size {
            return Err(ProtocolError::OversizedMessage(len));
        }
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body)?;
        body
    } else {
        let mut body = Vec::new();
        reader.take(max_size as u64 + 1).read_to_end(&mut body)?;
        if body.len() > max_size {
            return Err(ProtocolError::OversizedMessage(body.len()));
        }
        body
    };

    if !(200..300).contains(&status) {
        let detail = String::from_utf8_lossy(&body);
        return Err(ProtocolError::TransportError(format!(
            "{}: {status} {}",
            constants::ERR_HTTP_STATUS,
            detail.trim()
        )));
    }
    Ok(body)
}

fn read_chunked<R: BufRead>(reader: &mut R, max_size: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line = read_line(reader)?;
        let size_text = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16).map_err(|_| {
            ProtocolError::TransportError(format!("malformed chunk size '{line}'"))
        })?;
        if size == 0 {
            // Trailers, then the terminating blank line.
            while !read_line(reader)?.is_empty() {}
            return Ok(body);
        }
        if body.len() + size > max_size {
            return Err(ProtocolError::OversizedMessage(body.len() + size));
        }
        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..])?;
        read_line(reader)?;
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Raw bytes up to and including the blank line that ends the headers.
fn read_head<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut head = Vec::new();
    loop {
        let start = head.len();
        if reader.read_until(b'\n', &mut head)? == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        if start > 0 && matches!(&head[start..], b"\r\n" | b"\n") {
            return Ok(head);
        }
        if head.len() > MAX_HEAD_SIZE {
            return Err(ProtocolError::TransportError(format!(
                "{}: head exceeds {MAX_HEAD_SIZE} bytes",
                constants::ERR_HTTP_HEADER
            )));
        }
    }
}

/// HTTP client for `config.client.address` at `config.client.http_path`.
pub fn connect(service: Arc<ServiceSpec>, config: &NetworkConfig) -> Result<HttpClient> {
    connect_to(&config.client.address, &config.client.http_path, service, config)
}

pub fn connect_to(
    address: &str,
    path: &str,
    service: Arc<ServiceSpec>,
    config: &NetworkConfig,
) -> Result<HttpClient> {
    let max = config.transport.max_message_size;
    let transport =
        HttpClientTransport::new(address, path, &config.client).with_max_response_size(max);
    Ok(Client::new(service, transport).with_max_message_size(max))
}
