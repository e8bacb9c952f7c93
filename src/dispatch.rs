//! The contract between a router and the adapter that feeds it requests.
//!
//! An adapter builds one [`Request`] per inbound request and offers it to
//! each compiled route in registration order:
//!
//! ```text
//! for route in routes:
//!     Matched(route)  → stop, the route's response is the answer
//!     NotMatched      → try the next route
//!     Err(error)      → stop, later routes are never tried
//! exhausted           → adapter's own not-found response
//! ```
//!
//! Each attempt is awaited to completion before the next starts, so the first
//! route that matches without failing wins and at most one route reads the
//! request body at a time.
//!
//! A panic inside a route, including one raised while the route's chain is
//! being assembled, is caught and reported as an unexpected error.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::error::{ErrorKind, RouteError};
use crate::handler::CompiledRoute;
use crate::http::{Ended, Request, Response};
use crate::route::Match;

#[derive(Debug)]
pub enum Dispatch {
    /// A route matched and finished the response.
    Handled(Response<Ended>),
    /// Every route declined.
    NotFound,
    /// A route raised an error; dispatch stopped there.
    Failed(RouteError),
}

pub async fn dispatch(routes: &[CompiledRoute], request: Arc<Request>) -> Dispatch {
    for (position, route) in routes.iter().enumerate() {
        let attempt = async { route.call(Arc::clone(&request)).await };
        let outcome = match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(RouteError::from_panic(payload)),
        };
        match outcome {
            Ok(Match::Matched(finished)) => {
                debug!(
                    method = request.method(),
                    url = request.url(),
                    route = route.label(),
                    position,
                    status = finished.status_code(),
                    "request handled"
                );
                return Dispatch::Handled(finished.into_response());
            }
            Ok(Match::NotMatched) => {
                trace!(route = route.label(), position, "route declined");
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::BodyParse => warn!(
                        method = request.method(),
                        url = request.url(),
                        route = route.label(),
                        error = %err,
                        "request body could not be decoded"
                    ),
                    ErrorKind::Unexpected => error!(
                        method = request.method(),
                        url = request.url(),
                        route = route.label(),
                        error = %err,
                        "route failed"
                    ),
                }
                return Dispatch::Failed(err);
            }
        }
    }
    debug!(method = request.method(), url = request.url(), "no route matched");
    Dispatch::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Body;
    use crate::router::Router;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(url: &str) -> Arc<Request> {
        Arc::new(Request::new("GET", url, Body::Empty, HashMap::new()))
    }

    #[tokio::test]
    async fn first_match_wins() {
        let router = Router::new()
            .add(|r| async move { Ok(r.fail()) })
            .add(|r| async move { Ok(r.status(300).fail()) })
            .add(|r| async move { Ok(r.status(200).send("hi").into()) })
            .add(|r| async move { Ok(r.send("too late").into()) });

        match dispatch(router.routes(), request("/anything")).await {
            Dispatch::Handled(res) => {
                assert_eq!(res.status_code(), 200);
                assert_eq!(res.body().as_text(), Some("hi"));
            }
            other => panic!("unexpected dispatch result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn errors_stop_dispatch() {
        let later = Arc::new(AtomicUsize::new(0));
        let seen = later.clone();
        let router = Router::new()
            .add(|_r| async move { Err(RouteError::internal("boom")) })
            .add(move |r| {
                seen.fetch_add(1, Ordering::SeqCst);
                async move { Ok(r.send("never").into()) }
            });

        let outcome = dispatch(router.routes(), request("/")).await;
        assert!(matches!(outcome, Dispatch::Failed(ref e) if e.kind() == ErrorKind::Unexpected));
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panics_become_unexpected_errors() {
        let router = Router::new()
            .add(|r| async move {
                let empty: Vec<u8> = Vec::new();
                let byte = empty[3];
                Ok(r.send(byte.to_string()).into())
            })
            .add(|r| async move { Ok(r.send("never").into()) });

        match dispatch(router.routes(), request("/")).await {
            Dispatch::Failed(err) => {
                assert_eq!(err.kind(), ErrorKind::Unexpected);
                assert!(matches!(err, RouteError::Panic(_)));
            }
            other => panic!("unexpected dispatch result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_param_parser_is_caught() {
        let router = Router::new()
            .get_with("/users/:id", |_params: &[String]| -> crate::Context {
                panic!("parser exploded")
            })
            .end(|r| async move { Ok(r.send("never").into()) });

        match dispatch(router.routes(), request("/users/10")).await {
            Dispatch::Failed(err) => assert_eq!(err.to_string(), "panic: parser exploded"),
            other => panic!("unexpected dispatch result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_list_is_not_found() {
        let router = Router::new().get("/a").end(|r| async move { Ok(r.send("a").into()) });
        assert!(matches!(dispatch(router.routes(), request("/b")).await, Dispatch::NotFound));
        assert!(matches!(dispatch(&[], request("/b")).await, Dispatch::NotFound));
    }

    #[tokio::test]
    async fn failed_attempts_do_not_leak_headers() {
        let router = Router::new()
            .add(|r| async move { Ok(r.set_header("x-leak", "1").fail()) })
            .add(|r| async move {
                let leaked = r.get_header("x-leak").unwrap_or("none").to_string();
                Ok(r.send(leaked).into())
            });
        match dispatch(router.routes(), request("/")).await {
            Dispatch::Handled(res) => assert_eq!(res.body().as_text(), Some("none")),
            other => panic!("unexpected dispatch result: {other:?}"),
        }
    }
}
