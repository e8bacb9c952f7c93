//! Routing example for Trailhead
//!
//! This example demonstrates:
//! - Path parameters parsed into the route context
//! - Middleware that guards a branch of routes
//! - JSON request and response bodies
//!
//! Run with `RUST_LOG=trailhead=debug cargo run --example routing`.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use trailhead::{Context, Match, Route, RouteError, Router, Server};

#[derive(Serialize, Deserialize)]
struct User {
    name: String,
    role: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let public = Router::new()
        .get("/")
        .end(|r| async move { Ok(r.send("Welcome").into()) })
        .get_with("/users/:id", |params: &[String]| {
            Context::new().with("userId", params[0].clone())
        })
        .end(|r| async move {
            let id: String = r.context().require("userId")?;
            Ok(r.send_json(&serde_json::json!({ "id": id }))?.into())
        });

    // Everything registered on `admin` runs the token check first.
    let admin: Router = public.middleware(|r: Route| async move {
        match r.request().get_header("authorization") {
            Some("Bearer admin") => Ok(Match::Matched(r.extend(&Context::new().with("role", "admin")))),
            _ => Ok(r.fail()),
        }
    });
    let app = admin
        .post("/users")
        .end(|r| async move {
            let mut user: User = r.json().await?;
            if user.name.is_empty() {
                return Err(RouteError::body_parse("name must not be empty"));
            }
            user.role = r.context().require("role")?;
            Ok(r.status(201).send_json(&user)?.into())
        });

    Server::new(&app).addr("127.0.0.1:3000").listen().await
}
