//! In-process adapter for exercising a router without a socket.
//!
//! ```rust,no_run
//! # async fn demo() {
//! use trailhead::{Router, testing::TestClient};
//!
//! let router = Router::new().get("/abc").end(|r| async move { Ok(r.send("cool").into()) });
//! let res = TestClient::new(&router).get("/abc").await;
//! assert_eq!(res.status, 200);
//! assert_eq!(res.text(), Some("cool"));
//! # }
//! ```

use futures::stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::dispatch::{dispatch, Dispatch};
use crate::handler::CompiledRoute;
use crate::http::body::collect;
use crate::http::{Body, Encoding, Headers, Request, ResponseState};
use crate::router::Router;

#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl TestResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn text(&self) -> Option<&str> {
        self.body.as_text()
    }

    /// The body as JSON: structured bodies as they are, text bodies parsed.
    pub fn json(&self) -> Option<Value> {
        match &self.body {
            Body::Json(value) => Some(value.clone()),
            Body::Text(text) => serde_json::from_str(text).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestClient {
    routes: Arc<[CompiledRoute]>,
}

impl TestClient {
    pub fn new<S: ResponseState>(router: &Router<S>) -> Self {
        Self {
            routes: router.routes().into(),
        }
    }

    pub async fn get(&self, url: &str) -> TestResponse {
        self.request("GET", url, &[], None).await
    }

    pub async fn post(&self, url: &str, body: &str) -> TestResponse {
        self.request("POST", url, &[], Some(body)).await
    }

    /// Sends a request whose text body, if any, arrives as a one-chunk byte
    /// stream, the same shape a socket adapter produces.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> TestResponse {
        let body = match body {
            Some(text) => {
                let bytes = text.as_bytes().to_vec();
                Body::stream(stream::iter(vec![Ok::<_, io::Error>(bytes)]))
            }
            None => Body::Empty,
        };
        let headers = headers
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.send(method, url, headers, body).await
    }

    pub async fn send(
        &self,
        method: &str,
        url: &str,
        headers: HashMap<String, String>,
        body: Body,
    ) -> TestResponse {
        let request = Arc::new(Request::new(method, url, body, headers));
        match dispatch(&self.routes, request).await {
            Dispatch::Handled(res) => {
                let (status, headers, body) = res.into_parts();
                let body = match body {
                    Body::Stream(mut stream) => match collect(&mut stream, Encoding::Utf8).await {
                        Ok(text) => Body::Text(text),
                        Err(_) => return respond(500, "unexpected_error"),
                    },
                    other => other,
                };
                TestResponse { status, headers, body }
            }
            Dispatch::Failed(err) => respond(err.status_code(), err.code()),
            Dispatch::NotFound => respond(404, "no_such_route"),
        }
    }
}

fn respond(status: u16, message: &str) -> TestResponse {
    TestResponse {
        status,
        headers: Headers::new(),
        body: Body::Json(json!({ "message": message })),
    }
}
