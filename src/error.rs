use std::any::Any;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Coarse classification of a [`RouteError`], fixed when the error is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request payload could not be decoded in the requested format.
    BodyParse,
    /// Anything else raised by middleware or handler code.
    Unexpected,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("body parse error: {0}")]
    BodyParse(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("panic: {0}")]
    Panic(String),
    #[error("{0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

impl RouteError {
    pub fn body_parse(msg: impl Into<String>) -> Self {
        RouteError::BodyParse(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        RouteError::Internal(msg.into())
    }

    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        RouteError::Other(err.into())
    }

    /// Turns a caught panic payload into an error, keeping its message when
    /// the payload is a string.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(msg) = payload.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "Unknown panic".to_string()
        };
        RouteError::Panic(msg)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::BodyParse(_) => ErrorKind::BodyParse,
            RouteError::Io(_)
            | RouteError::Json(_)
            | RouteError::Internal(_)
            | RouteError::Panic(_)
            | RouteError::Other(_) => ErrorKind::Unexpected,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::BodyParse => 400,
            ErrorKind::Unexpected => 500,
        }
    }

    /// Stable machine-readable code exposed to clients. Never carries the
    /// error's internal detail.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::BodyParse => "body_parse_error",
            ErrorKind::Unexpected => "unexpected_error",
        }
    }
}

pub type RouteResult<T> = Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_decided_by_variant() {
        let err = RouteError::body_parse("expected value at line 1 column 1");
        assert_eq!(err.kind(), ErrorKind::BodyParse);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), "body_parse_error");

        let err = RouteError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.code(), "unexpected_error");
    }

    #[test]
    fn json_errors_are_unexpected_unless_raised_as_body_parse() {
        let json_err = serde_json::from_str::<serde_json::Value>("baad").unwrap_err();
        assert_eq!(RouteError::from(json_err).kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn panics_are_unexpected() {
        let err = RouteError::from_panic(Box::new("index out of bounds"));
        assert_eq!(err.to_string(), "panic: index out of bounds");
        assert_eq!(err.status_code(), 500);

        let err = RouteError::from_panic(Box::new(42u8));
        assert_eq!(err.to_string(), "panic: Unknown panic");
        assert_eq!(err.code(), "unexpected_error");
    }

    #[test]
    fn other_wraps_any_error() {
        let err = RouteError::other("database unavailable");
        assert_eq!(err.to_string(), "database unavailable");
        assert_eq!(err.code(), "unexpected_error");
    }
}
