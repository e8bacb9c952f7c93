pub mod pattern;

use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::context::Context;
use crate::dispatch::{dispatch, Dispatch};
use crate::handler::CompiledRoute;
use crate::http::{Ended, Fresh, Request, ResponseState};
use crate::middleware::{Chain, Identity, Middleware, MiddlewareResult};
use crate::route::{Match, Outcome, Route};
use pattern::{PathMatcher, PathPattern};

pub use pattern::PathMatch;

type ParamParser = Arc<dyn Fn(&[String]) -> Context + Send + Sync>;

/// Ordered list of compiled routes plus the middleware chain that every route
/// registered on this router runs first.
///
/// The state parameter is the response state the chain hands to handlers:
/// `Fresh` unless a middleware has already set a status or finished the
/// response.
pub struct Router<S = Fresh> {
    routes: Vec<CompiledRoute>,
    middleware: Arc<dyn Middleware<Fresh, S>>,
}

impl Router<Fresh> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middleware: Arc::new(Identity),
        }
    }
}

impl Default for Router<Fresh> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for Router<S> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
            middleware: Arc::clone(&self.middleware),
        }
    }
}

impl<S: ResponseState> Router<S> {
    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registers a handler that sees every request reaching this router's
    /// chain. It may still decline with a match failure.
    pub fn add<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(Route<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<Ended>> + Send + 'static,
    {
        self.push("*", Arc::new(handler))
    }

    /// Derives a router whose chain runs this router's middleware and then
    /// `middleware`. The receiver is left as it was: routes registered on it
    /// afterwards skip `middleware`, routes registered on the result run it.
    pub fn middleware<S2, F, Fut>(&self, middleware: F) -> Router<S2>
    where
        S2: ResponseState,
        F: Fn(Route<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<S2>> + Send + 'static,
    {
        self.layer(middleware)
    }

    /// Like [`Router::middleware`], for any [`Middleware`] implementation.
    pub fn layer<S2, M>(&self, middleware: M) -> Router<S2>
    where
        S2: ResponseState,
        M: Middleware<S, S2>,
    {
        let next: Arc<dyn Middleware<S, S2>> = Arc::new(middleware);
        Router {
            routes: self.routes.clone(),
            middleware: Arc::new(Chain::new(Arc::clone(&self.middleware), next)),
        }
    }

    /// Starts a route matching `verb` and `path`. Captured path parameters are
    /// handed to `parser`, whose result extends the route context.
    pub fn method<P>(self, verb: &str, path: &str, parser: P) -> RouteBuilder<S>
    where
        P: Fn(&[String]) -> Context + Send + Sync + 'static,
    {
        let pattern = PathPattern::new(path);
        let label = format!("{} {}", verb.to_ascii_uppercase(), pattern.as_str());
        self.method_matching(verb, pattern, parser).labelled(label)
    }

    /// Like [`Router::method`] with a caller-supplied path matcher.
    pub fn method_matching<M, P>(self, verb: &str, matcher: M, parser: P) -> RouteBuilder<S>
    where
        M: PathMatcher,
        P: Fn(&[String]) -> Context + Send + Sync + 'static,
    {
        let verb = verb.to_ascii_uppercase();
        RouteBuilder {
            label: verb.clone(),
            step: Arc::new(MatchStep {
                verb,
                matcher: Arc::new(matcher),
                parser: Arc::new(parser),
            }),
            parent: self,
        }
    }

    pub fn get(self, path: &str) -> RouteBuilder<S> {
        self.method("GET", path, no_params)
    }

    pub fn get_with<P>(self, path: &str, parser: P) -> RouteBuilder<S>
    where
        P: Fn(&[String]) -> Context + Send + Sync + 'static,
    {
        self.method("GET", path, parser)
    }

    pub fn post(self, path: &str) -> RouteBuilder<S> {
        self.method("POST", path, no_params)
    }

    pub fn put(self, path: &str) -> RouteBuilder<S> {
        self.method("PUT", path, no_params)
    }

    pub fn patch(self, path: &str) -> RouteBuilder<S> {
        self.method("PATCH", path, no_params)
    }

    pub fn delete(self, path: &str) -> RouteBuilder<S> {
        self.method("DELETE", path, no_params)
    }

    /// Tries every route in order against `request`.
    pub async fn dispatch(&self, request: Request) -> Dispatch {
        dispatch(&self.routes, Arc::new(request)).await
    }

    fn push(mut self, label: impl Into<Arc<str>>, endpoint: Arc<dyn Middleware<S, Ended>>) -> Self {
        let route = CompiledRoute::new(label, Arc::new(Chain::new(Arc::clone(&self.middleware), endpoint)));
        debug!(route = route.label(), position = self.routes.len(), "registered route");
        self.routes.push(route);
        self
    }
}

fn no_params(_params: &[String]) -> Context {
    Context::new()
}

/// Second phase of route registration: holds the parent router and the
/// compiled match step until the terminal handler is supplied.
pub struct RouteBuilder<S> {
    parent: Router<S>,
    step: Arc<MatchStep>,
    label: String,
}

impl<S: ResponseState> RouteBuilder<S> {
    fn labelled(mut self, label: String) -> Self {
        self.label = label;
        self
    }

    /// Appends `match step → handler` to the parent router and returns it.
    pub fn end<F, Fut>(self, handler: F) -> Router<S>
    where
        F: Fn(Route<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<Ended>> + Send + 'static,
    {
        let step: Arc<dyn Middleware<S, S>> = self.step;
        let handler: Arc<dyn Middleware<S, Ended>> = Arc::new(handler);
        self.parent.push(self.label, Arc::new(Chain::new(step, handler)))
    }
}

impl RouteBuilder<Ended> {
    /// Registers the match step alone, for chains whose middleware already
    /// finished the response.
    pub fn add(self) -> Router<Ended> {
        self.parent.push(self.label, self.step)
    }
}

struct MatchStep {
    verb: String,
    matcher: Arc<dyn PathMatcher>,
    parser: ParamParser,
}

impl MatchStep {
    fn apply<S: ResponseState>(&self, route: Route<S>) -> Match<Route<S>> {
        if !route.request().method().eq_ignore_ascii_case(&self.verb) {
            return route.fail();
        }
        let Some(found) = self.matcher.match_path(route.request().path()) else {
            return route.fail();
        };
        let attrs = (self.parser)(&found.params);
        Match::Matched(route.extend(&attrs).advance(found.matched_len))
    }
}

impl<S: ResponseState> Middleware<S, S> for MatchStep {
    fn call(&self, route: Route<S>) -> MiddlewareResult<S> {
        let outcome = self.apply(route);
        Box::pin(async move { Ok(outcome) })
    }
}
