//! The per-request value threaded through middleware.
//!
//! A [`Route`] bundles the shared [`Request`], the response under assembly and
//! the accumulated [`Context`]. Every operation consumes the route and hands
//! back a new one; clone a route first to branch from it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{RouteError, RouteResult};
use crate::http::{
    Body, BodyKind, BodyOptions, BodyValue, Ended, Fresh, Open, Request, Response,
    ResponseState, WithStatus,
};

/// Result of trying a route: it either applies or the next one should be
/// tried. Not an error.
#[derive(Debug)]
pub enum Match<T> {
    Matched(T),
    NotMatched,
}

impl<T> Match<T> {
    pub fn is_matched(&self) -> bool {
        matches!(self, Match::Matched(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Match::Matched(value) => Some(value),
            Match::NotMatched => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Match<U> {
        match self {
            Match::Matched(value) => Match::Matched(f(value)),
            Match::NotMatched => Match::NotMatched,
        }
    }
}

impl<S> From<Route<S>> for Match<Route<S>> {
    fn from(route: Route<S>) -> Self {
        Match::Matched(route)
    }
}

/// What a middleware or handler produces.
pub type Outcome<S> = RouteResult<Match<Route<S>>>;

#[derive(Debug, Clone)]
pub struct Route<S = Fresh> {
    request: Arc<Request>,
    response: Response<S>,
    context: Context,
    matched: usize,
}

impl Route<Fresh> {
    /// A fresh route: empty context, no headers, nothing matched.
    pub fn new(request: Arc<Request>) -> Self {
        Self {
            request,
            response: Response::new(),
            context: Context::new(),
            matched: 0,
        }
    }

    pub fn status(self, status: u16) -> Route<WithStatus> {
        Route {
            request: self.request,
            response: self.response.status(status),
            context: self.context,
            matched: self.matched,
        }
    }
}

impl<S: ResponseState> Route<S> {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response<S> {
        &self.response
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Length of the request path consumed by matching so far.
    pub fn matched_len(&self) -> usize {
        self.matched
    }

    pub fn extend(mut self, attrs: &Context) -> Self {
        self.context = self.context.extend(attrs);
        self
    }

    pub fn extend_with<T: Serialize>(self, attrs: &T) -> RouteResult<Self> {
        let attrs = Context::from_serialize(attrs)?;
        Ok(self.extend(&attrs))
    }

    pub fn set_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.response.get_header(key)
    }

    pub fn set_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.response = self.response.set_header(key, value);
        self
    }

    pub fn fail<T>(&self) -> Match<T> {
        Match::NotMatched
    }

    pub async fn body(&self, kind: BodyKind, options: &BodyOptions) -> RouteResult<BodyValue> {
        self.request.body(kind, options).await
    }

    pub async fn text(&self) -> RouteResult<Option<String>> {
        let value = self.body(BodyKind::Text, &BodyOptions::default()).await?;
        Ok(value.into_text())
    }

    /// Decodes the payload as JSON into `T`. Text already cached by an
    /// earlier read is decoded without touching the stream again.
    pub async fn json<T: DeserializeOwned>(&self) -> RouteResult<T> {
        let value = match self.body(BodyKind::Json, &BodyOptions::default()).await? {
            BodyValue::Null => serde_json::Value::Null,
            BodyValue::Json(value) => value,
            BodyValue::Text(text) => serde_json::from_str(&text)
                .map_err(|e| RouteError::body_parse(e.to_string()))?,
        };
        serde_json::from_value(value).map_err(|e| RouteError::body_parse(e.to_string()))
    }

    pub(crate) fn advance(mut self, matched: usize) -> Self {
        self.matched = matched;
        self
    }
}

impl<S: Open> Route<S> {
    pub fn send(self, body: impl Into<Body>) -> Route<Ended> {
        Route {
            request: self.request,
            response: self.response.send(body),
            context: self.context,
            matched: self.matched,
        }
    }

    pub fn send_json<T: Serialize>(self, value: &T) -> RouteResult<Route<Ended>> {
        let value = serde_json::to_value(value)?;
        Ok(self.send(Body::Json(value)))
    }
}

impl Route<WithStatus> {
    pub fn status_code(&self) -> u16 {
        self.response.status_code()
    }
}

impl Route<Ended> {
    pub fn status_code(&self) -> u16 {
        self.response.status_code()
    }

    pub fn into_response(self) -> Response<Ended> {
        self.response
    }
}
