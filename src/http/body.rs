use base64::Engine;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::io;
use std::str::FromStr;

use crate::error::RouteError;

/// Raw byte chunks of a payload that is read at most once.
pub type BodyStream = BoxStream<'static, io::Result<Vec<u8>>>;

/// Payload carried by a request before loading, or by a finished response.
pub enum Body {
    Empty,
    Text(String),
    Json(Value),
    Stream(BodyStream),
}

impl Body {
    pub fn stream<S>(stream: S) -> Body
    where
        S: Stream<Item = io::Result<Vec<u8>>> + Send + 'static,
    {
        Body::Stream(stream.boxed())
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Copies a non-stream payload into its loaded form. Streams have no
    /// snapshot until consumed.
    pub(crate) fn snapshot(&self) -> Option<BodyValue> {
        match self {
            Body::Empty => Some(BodyValue::Null),
            Body::Text(text) => Some(BodyValue::Text(text.clone())),
            Body::Json(value) => Some(BodyValue::Json(value.clone())),
            Body::Stream(_) => None,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Body {
        Body::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Body {
        Body::Text(s)
    }
}

impl From<Option<String>> for Body {
    fn from(s: Option<String>) -> Body {
        s.map(Body::Text).unwrap_or(Body::Empty)
    }
}

// Strings stay text so they pick up `text/plain` when sent.
impl From<Value> for Body {
    fn from(value: Value) -> Body {
        match value {
            Value::Null => Body::Empty,
            Value::String(s) => Body::Text(s),
            other => Body::Json(other),
        }
    }
}

impl From<BodyValue> for Body {
    fn from(value: BodyValue) -> Body {
        match value {
            BodyValue::Null => Body::Empty,
            BodyValue::Text(s) => Body::Text(s),
            BodyValue::Json(v) => Body::Json(v),
        }
    }
}

impl From<BodyStream> for Body {
    fn from(stream: BodyStream) -> Body {
        Body::Stream(stream)
    }
}

/// A loaded request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyValue {
    Null,
    Text(String),
    Json(Value),
}

impl BodyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BodyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            BodyValue::Null => None,
            BodyValue::Text(text) => Some(text),
            BodyValue::Json(value) => Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
    Base64,
}

impl Encoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Encoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

impl FromStr for Encoding {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "binary" | "iso-8859-1" => Ok(Encoding::Latin1),
            "base64" => Ok(Encoding::Base64),
            other => Err(RouteError::internal(format!("unknown body encoding `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyOptions {
    pub encoding: Encoding,
}

impl BodyOptions {
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Reads a stream to completion and decodes it.
pub(crate) async fn collect(stream: &mut BodyStream, encoding: Encoding) -> io::Result<String> {
    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(encoding.decode(&data))
}
