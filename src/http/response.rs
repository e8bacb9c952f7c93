use std::collections::HashMap;
use std::sync::Arc;

use crate::http::body::Body;

pub type Headers = HashMap<String, String>;

mod sealed {
    pub trait Sealed {}
}

/// Marker for the stages of response assembly.
pub trait ResponseState: sealed::Sealed + Send + 'static {}

/// States that still accept a body.
pub trait Open: ResponseState {
    fn pending_status(&self) -> u16;
}

/// No status chosen yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fresh;

/// Status fixed, body not yet set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithStatus {
    status: u16,
}

/// Fully finalized.
#[derive(Debug)]
pub struct Ended {
    status: u16,
    body: Body,
}

impl sealed::Sealed for Fresh {}
impl sealed::Sealed for WithStatus {}
impl sealed::Sealed for Ended {}
impl ResponseState for Fresh {}
impl ResponseState for WithStatus {}
impl ResponseState for Ended {}

impl Open for Fresh {
    fn pending_status(&self) -> u16 {
        200
    }
}

impl Open for WithStatus {
    fn pending_status(&self) -> u16 {
        self.status
    }
}

/// A response under assembly.
///
/// The state parameter tracks how far assembly has progressed: `status` is
/// only callable on `Response<Fresh>` and `send` only before `Ended`, so an
/// out-of-order build does not compile. Headers are shared between values
/// and copied on write, so setting one never changes a previously observed
/// response.
#[derive(Debug, Clone)]
pub struct Response<S = Fresh> {
    headers: Arc<Headers>,
    state: S,
}

impl Response<Fresh> {
    pub fn new() -> Self {
        Self {
            headers: Arc::new(HashMap::new()),
            state: Fresh,
        }
    }

    pub fn status(self, status: u16) -> Response<WithStatus> {
        Response {
            headers: self.headers,
            state: WithStatus { status },
        }
    }
}

impl Default for Response<Fresh> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ResponseState> Response<S> {
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn set_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        Arc::make_mut(&mut self.headers).insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

impl<S: Open> Response<S> {
    /// Finalizes the response.
    ///
    /// Text bodies get `content-type: text/plain` unless one is already set.
    /// JSON objects are serialized to text and get `application/json`.
    /// Anything else, including streams and non-object JSON values, passes
    /// through unconverted with headers untouched.
    pub fn send(self, body: impl Into<Body>) -> Response<Ended> {
        let status = self.state.pending_status();
        let mut headers = self.headers;
        let body = match body.into() {
            Body::Text(text) => {
                if !headers.contains_key("content-type") {
                    Arc::make_mut(&mut headers)
                        .insert("content-type".to_string(), "text/plain".to_string());
                }
                Body::Text(text)
            }
            Body::Json(value) if value.is_object() => {
                Arc::make_mut(&mut headers)
                    .insert("content-type".to_string(), "application/json".to_string());
                Body::Text(value.to_string())
            }
            other => other,
        };
        Response {
            headers,
            state: Ended { status, body },
        }
    }
}

impl Response<WithStatus> {
    pub fn status_code(&self) -> u16 {
        self.state.status
    }
}

impl Response<Ended> {
    pub fn status_code(&self) -> u16 {
        self.state.status
    }

    pub fn body(&self) -> &Body {
        &self.state.body
    }

    pub fn into_parts(self) -> (u16, Headers, Body) {
        let headers = Arc::try_unwrap(self.headers).unwrap_or_else(|shared| (*shared).clone());
        (self.state.status, headers, self.state.body)
    }
}
