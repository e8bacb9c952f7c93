//! HTTP/1.1 adapter.
//!
//! Binds a TCP listener, turns each connection's request into a [`Request`]
//! whose body is a lazy byte stream, dispatches it through the router's
//! compiled routes and writes the outcome back. One request is served per
//! connection.
//!
//! # Examples
//!
//! ```rust,no_run
//! use trailhead::{Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let router = Router::new()
//!         .get("/")
//!         .end(|r| async move { Ok(r.send("hello").into()) });
//!     Server::new(&router).addr("127.0.0.1:3000").listen().await
//! }
//! ```

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::dispatch::{dispatch, Dispatch};
use crate::handler::CompiledRoute;
use crate::http::{reason_phrase, Body, BodyStream, Headers, Request, ResponseState};
use crate::router::Router;

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `127.0.0.1:3000`.
    pub addr: String,
    /// Header lines accepted before the request is rejected.
    pub max_header_lines: usize,
    /// Whether responses carry a `date` header.
    pub send_date: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
            max_header_lines: 100,
            send_date: true,
        }
    }
}

#[derive(Clone)]
pub struct Server {
    config: Arc<ServerConfig>,
    routes: Arc<[CompiledRoute]>,
}

impl Server {
    pub fn new<S: ResponseState>(router: &Router<S>) -> Self {
        Self {
            config: Arc::new(ServerConfig::default()),
            routes: router.routes().into(),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn addr(mut self, addr: &str) -> Self {
        Arc::make_mut(&mut self.config).addr = addr.to_string();
        self
    }

    pub fn max_header_lines(mut self, max_header_lines: usize) -> Self {
        Arc::make_mut(&mut self.config).max_header_lines = max_header_lines;
        self
    }

    pub fn send_date(mut self, send_date: bool) -> Self {
        Arc::make_mut(&mut self.config).send_date = send_date;
        self
    }

    /// Binds the configured address and serves until the listener fails.
    pub async fn listen(self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        info!(addr = %listener.local_addr()?, routes = self.routes.len(), "server listening");
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            error!(%peer, error = %e, "connection error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "connection failed"),
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<(), Error> {
        let (read_half, mut write_half) = stream.into_split();
        let mut buf_reader = BufReader::new(read_half);

        let mut request_line = String::new();
        buf_reader.read_line(&mut request_line).await?;
        if request_line.trim().is_empty() {
            return Ok(());
        }

        let mut parts = request_line.split_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Invalid request line"))?
            .to_string();
        let url = parts
            .next()
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Invalid request line"))?
            .to_string();

        let mut headers = HashMap::new();
        let mut lines = 0;
        loop {
            let mut line = String::new();
            if buf_reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
                break;
            }
            lines += 1;
            if lines > self.config.max_header_lines {
                warn!(%url, "too many header lines");
                return Err(Error::new(ErrorKind::InvalidData, "Too many header lines"));
            }
            if let Some((key, value)) = line.trim().split_once(':') {
                headers.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }

        let content_length = headers
            .get("content-length")
            .and_then(|length| length.parse::<u64>().ok())
            .unwrap_or(0);
        let body = if content_length > 0 {
            Body::Stream(read_stream(buf_reader.take(content_length)))
        } else {
            Body::Empty
        };

        let request = Arc::new(Request::new(&method, &url, body, headers));
        debug!(%method, %url, "request received");
        let outcome = dispatch(&self.routes, Arc::clone(&request)).await;
        if let Err(e) = request.discard_body().await {
            debug!(error = %e, "failed to drain request body");
        }
        drop(request);

        match outcome {
            Dispatch::Handled(res) => {
                let (status, headers, body) = res.into_parts();
                match body {
                    Body::Stream(body) => {
                        self.write_stream(&mut write_half, status, headers, body).await?
                    }
                    body if status >= 300 && reason_phrase(status).is_some() => {
                        let message = match &body {
                            Body::Text(text) if !text.is_empty() => Some(text.as_str()),
                            _ => None,
                        };
                        self.write_status(&mut write_half, status, headers, message).await?
                    }
                    body => {
                        let bytes = match body {
                            Body::Text(text) => text.into_bytes(),
                            Body::Json(value) => value.to_string().into_bytes(),
                            Body::Empty | Body::Stream(_) => Vec::new(),
                        };
                        self.write_full(&mut write_half, status, headers, &bytes).await?
                    }
                }
            }
            Dispatch::Failed(err) => {
                self.write_status(&mut write_half, err.status_code(), Headers::new(), Some(err.code()))
                    .await?
            }
            Dispatch::NotFound => {
                self.write_status(&mut write_half, 404, Headers::new(), Some("not_found")).await?
            }
        }

        write_half.shutdown().await
    }

    /// Writes the structured `{statusCode, error, message}` body used for
    /// error-class statuses.
    async fn write_status<W>(
        &self,
        writer: &mut W,
        status: u16,
        mut headers: Headers,
        message: Option<&str>,
    ) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        let body = StatusBody {
            status_code: status,
            error: reason_phrase(status).unwrap_or(""),
            message,
        };
        let bytes = serde_json::to_vec(&body).map_err(|e| Error::new(ErrorKind::Other, e))?;
        headers.insert("content-type".to_string(), "application/json".to_string());
        self.write_full(writer, status, headers, &bytes).await
    }

    async fn write_full<W>(
        &self,
        writer: &mut W,
        status: u16,
        mut headers: Headers,
        body: &[u8],
    ) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        headers.remove("content-length");
        let mut head = self.head(status, &headers);
        head += &format!("content-length: {}\r\n\r\n", body.len());
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(body).await?;
        writer.flush().await
    }

    /// Forwards a streamed body chunk by chunk using chunked transfer coding.
    async fn write_stream<W>(
        &self,
        writer: &mut W,
        status: u16,
        mut headers: Headers,
        mut body: BodyStream,
    ) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        headers.remove("content-length");
        headers.insert("transfer-encoding".to_string(), "chunked".to_string());
        let mut head = self.head(status, &headers);
        head += "\r\n";
        writer.write_all(head.as_bytes()).await?;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            writer.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await?;
            writer.write_all(&chunk).await?;
            writer.write_all(b"\r\n").await?;
        }
        writer.write_all(b"0\r\n\r\n").await?;
        writer.flush().await
    }

    fn head(&self, status: u16, headers: &Headers) -> String {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            status,
            reason_phrase(status).unwrap_or("Unknown")
        );
        for (name, value) in headers {
            head += &format!("{}: {}\r\n", name, value);
        }
        if self.config.send_date && !headers.contains_key("date") {
            head += &format!("date: {}\r\n", httpdate::fmt_http_date(SystemTime::now()));
        }
        head += "connection: close\r\n";
        head
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody<'a> {
    status_code: u16,
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

/// Exposes a reader as a body stream that reads lazily, one chunk per poll.
fn read_stream<R>(reader: R) -> BodyStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}
