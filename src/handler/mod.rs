use std::fmt;
use std::sync::Arc;

use crate::http::{Ended, Fresh, Request};
use crate::middleware::{Middleware, MiddlewareResult};
use crate::route::Route;

/// A fully composed route: router middleware, match step and terminal
/// handler folded into one function from a request to a finished route or a
/// match failure.
#[derive(Clone)]
pub struct CompiledRoute {
    label: Arc<str>,
    endpoint: Arc<dyn Middleware<Fresh, Ended>>,
}

impl CompiledRoute {
    pub(crate) fn new(label: impl Into<Arc<str>>, endpoint: Arc<dyn Middleware<Fresh, Ended>>) -> Self {
        Self {
            label: label.into(),
            endpoint,
        }
    }

    /// Human-readable description, e.g. `GET /users/:id`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the route against a request, starting from a fresh route value.
    pub fn call(&self, request: Arc<Request>) -> MiddlewareResult<Ended> {
        self.endpoint.call(Route::new(request))
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledRoute").field(&self.label).finish()
    }
}
