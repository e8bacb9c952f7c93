use std::collections::HashMap;
use std::fmt;
use std::io;
use tokio::sync::Mutex;

use crate::error::{RouteError, RouteResult};
use crate::http::body::{collect, Body, BodyKind, BodyOptions, BodyValue};

enum BodyCell {
    Unloaded(Body),
    Loaded(BodyValue),
    /// The stream failed part way; what was read is gone.
    Failed(io::ErrorKind, String),
}

/// Snapshot of an inbound request.
///
/// Everything except the body cell is fixed at construction. The body cell
/// moves from `Unloaded` to `Loaded` the first time a stream payload is read
/// and never goes back, so every later read is served from the cache.
pub struct Request {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    body: Mutex<BodyCell>,
}

impl Request {
    /// Builds a request from adapter-supplied parts. The method is
    /// upper-cased (empty becomes `GET`) and header names are lower-cased.
    pub fn new(
        method: &str,
        url: &str,
        body: impl Into<Body>,
        headers: HashMap<String, String>,
    ) -> Request {
        let method = if method.is_empty() {
            "GET".to_string()
        } else {
            method.to_ascii_uppercase()
        };
        let headers = headers
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
        Request {
            method,
            url: url.to_string(),
            headers,
            body: Mutex::new(BodyCell::Unloaded(body.into())),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The url without its query string or fragment.
    pub fn path(&self) -> &str {
        let end = self.url.find(|c| c == '?' || c == '#').unwrap_or(self.url.len());
        &self.url[..end]
    }

    pub fn query(&self) -> Option<&str> {
        let rest = self.url.split_once('?')?.1;
        Some(rest.split('#').next().unwrap_or(rest))
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Loads the payload.
    ///
    /// A loaded cell answers immediately with its cached value whatever the
    /// requested kind. An unloaded stream is consumed once and its text is
    /// cached before any JSON decoding, so a failed `Json` read still leaves
    /// the text readable. Non-stream payloads are returned as they are and
    /// leave the cell untouched. A read error is remembered and returned to
    /// every later caller.
    pub async fn body(&self, kind: BodyKind, options: &BodyOptions) -> RouteResult<BodyValue> {
        let mut cell = self.body.lock().await;
        match &mut *cell {
            BodyCell::Loaded(value) => Ok(value.clone()),
            BodyCell::Failed(error_kind, message) => Err(io::Error::new(*error_kind, message.clone()).into()),
            BodyCell::Unloaded(Body::Stream(stream)) => {
                let collected = collect(stream, options.encoding).await;
                let text = match collected {
                    Ok(text) => text,
                    Err(e) => {
                        *cell = BodyCell::Failed(e.kind(), e.to_string());
                        return Err(e.into());
                    }
                };
                *cell = BodyCell::Loaded(BodyValue::Text(text.clone()));
                match kind {
                    BodyKind::Text => Ok(BodyValue::Text(text)),
                    BodyKind::Json => serde_json::from_str(&text)
                        .map(BodyValue::Json)
                        .map_err(|e| RouteError::body_parse(e.to_string())),
                }
            }
            BodyCell::Unloaded(raw) => Ok(raw.snapshot().unwrap_or(BodyValue::Null)),
        }
    }

    pub async fn is_body_loaded(&self) -> bool {
        matches!(&*self.body.lock().await, BodyCell::Loaded(_))
    }

    /// Reads and drops a stream payload nobody asked for, leaving the cell
    /// loaded with an empty value.
    pub(crate) async fn discard_body(&self) -> RouteResult<()> {
        let mut cell = self.body.lock().await;
        if let BodyCell::Unloaded(Body::Stream(stream)) = &mut *cell {
            use futures::StreamExt;
            while let Some(chunk) = stream.next().await {
                if let Err(e) = chunk {
                    *cell = BodyCell::Failed(e.kind(), e.to_string());
                    return Err(e.into());
                }
            }
            *cell = BodyCell::Loaded(BodyValue::Null);
        }
        Ok(())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
