use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::http::{Fresh, ResponseState};
use crate::route::{Match, Outcome, Route};

pub type MiddlewareResult<S> = BoxFuture<'static, Outcome<S>>;

/// One step of a route chain: takes a route in state `In` and either returns
/// it (possibly transformed into state `Out`), declines with
/// [`Match::NotMatched`], or fails.
///
/// Async closures `Fn(Route<In>) -> impl Future<Output = Outcome<Out>>`
/// implement this trait.
pub trait Middleware<In, Out>: Send + Sync + 'static {
    fn call(&self, route: Route<In>) -> MiddlewareResult<Out>;
}

impl<F, Fut, In, Out> Middleware<In, Out> for F
where
    F: Fn(Route<In>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<Out>> + Send + 'static,
{
    fn call(&self, route: Route<In>) -> MiddlewareResult<Out> {
        Box::pin((self)(route))
    }
}

/// Passes every route through unchanged. The root of every router chain.
pub(crate) struct Identity;

impl Middleware<Fresh, Fresh> for Identity {
    fn call(&self, route: Route<Fresh>) -> MiddlewareResult<Fresh> {
        Box::pin(async move { Ok(Match::Matched(route)) })
    }
}

/// Runs `first`, then `then` on its result. A match failure from `first`
/// short-circuits without running `then`.
pub(crate) struct Chain<In, Mid, Out> {
    first: Arc<dyn Middleware<In, Mid>>,
    then: Arc<dyn Middleware<Mid, Out>>,
}

impl<In, Mid, Out> Chain<In, Mid, Out> {
    pub(crate) fn new(
        first: Arc<dyn Middleware<In, Mid>>,
        then: Arc<dyn Middleware<Mid, Out>>,
    ) -> Self {
        Self { first, then }
    }
}

impl<In, Mid, Out> Middleware<In, Out> for Chain<In, Mid, Out>
where
    In: ResponseState,
    Mid: ResponseState,
    Out: ResponseState,
{
    fn call(&self, route: Route<In>) -> MiddlewareResult<Out> {
        let first = self.first.call(route);
        let then = Arc::clone(&self.then);
        Box::pin(async move {
            match first.await? {
                Match::Matched(route) => then.call(route).await,
                Match::NotMatched => Ok(Match::NotMatched),
            }
        })
    }
}
