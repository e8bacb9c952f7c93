//! # Trailhead
//!
//! Request routing and response assembly built from immutable values.
//!
//! ## Features
//!
//! - Ordered, first-match-wins routing with `:param` path captures
//! - Non-destructive middleware: deriving a router never changes its parent
//! - Typestate responses: status, then headers, then body, checked at compile time
//! - Lazily loaded, memoized request bodies (text or JSON)
//! - In-process test client and a small HTTP/1.1 adapter
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trailhead::{Context, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let router = Router::new()
//!         .get_with("/users/:id", |params: &[String]| {
//!             Context::new().with("userId", params[0].clone())
//!         })
//!         .end(|r| async move {
//!             let id: String = r.context().require("userId")?;
//!             Ok(r.send(id).into())
//!         });
//!
//!     Server::new(&router).addr("127.0.0.1:3000").listen().await
//! }
//! ```
//!
//! ## Middleware Usage
//!
//! ```rust
//! use trailhead::{Route, Router};
//!
//! let api: Router = Router::new().middleware(|r: Route| async move {
//!     if r.request().get_header("authorization").is_some() {
//!         Ok(r.into())
//!     } else {
//!         Ok(r.fail())
//!     }
//! });
//! let api = api.get("/me").end(|r| async move { Ok(r.send("me").into()) });
//! # let _ = api;
//! ```

pub mod context;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod route;
pub mod router;
pub mod server;
pub mod testing;

pub use context::Context;
pub use dispatch::{dispatch, Dispatch};
pub use error::{ErrorKind, RouteError, RouteResult};
pub use handler::CompiledRoute;
pub use http::{
    Body, BodyKind, BodyOptions, BodyValue, Encoding, Ended, Fresh, Request, Response, WithStatus,
};
pub use middleware::Middleware;
pub use route::{Match, Outcome, Route};
pub use router::{RouteBuilder, Router};
pub use server::{Server, ServerConfig};

// Reexport serde_json
pub use serde_json::{json, Value};
