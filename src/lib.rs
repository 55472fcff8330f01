#[cfg(target_arch = "wasm32")]
use spin_sdk::http::IntoResponse;
use spin_sdk::http::{Request, Response};
#[cfg(target_arch = "wasm32")]
use spin_sdk::http_component;
use std::sync::OnceLock;

pub mod auth;
pub mod config;
pub mod core;
pub mod feed;
pub mod follow;
pub mod models;
pub mod posts;
pub mod users;

use crate::core::errors::ApiError;
use crate::core::helpers::store;

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    route(req)
}

// Runs once per process; seed_demo_data itself is idempotent, this just
// avoids re-scanning the user list on every request.
fn seed_demo_once() {
    static SEEDED: OnceLock<()> = OnceLock::new();
    SEEDED.get_or_init(|| {
        if let Err(e) = core::db::seed_demo_data(&store()) {
            eprintln!("demo seed failed: {}", e);
        }
    });
}

/// Route table shared by the Spin component and the native dev server.
pub fn route(req: Request) -> anyhow::Result<Response> {
    if config::seed_demo_enabled() {
        seed_demo_once();
    }

    let path = req.path().to_string();
    let method = req.method().to_string();

    match (method.as_str(), path.as_str()) {
        ("POST", "/users") => users::create_user(req),
        ("POST", "/login") => auth::login_user(req),
        ("POST", "/logout") => auth::logout_user(req),
        ("GET", "/profile") => users::get_profile(req),
        ("PUT", "/profile") => users::update_profile(req),
        ("POST", "/posts") => posts::create_post(req),
        ("GET", "/posts") => posts::list_posts(req),
        ("GET", "/feed") => feed::handle_timeline(req),
        ("GET", "/explore") => feed::handle_global_feed(req),
        ("POST", "/follow") => follow::handle_follow(req),
        ("POST", "/unfollow") => follow::handle_unfollow(req),
        ("GET", "/is_following") => follow::handle_is_following(req),
        ("POST", "/reset") => handle_reset(),
        ("GET", p) if p.starts_with("/followings/") => follow::get_followings_list(p),
        ("GET", p) if p.starts_with("/followers/") => follow::get_followers_list(p),
        ("GET", p) if p.starts_with("/users/") && p.len() > 7 => users::get_user_details(p),
        _ => Ok(Response::builder().status(404).body("Not found").build()),
    }
}

fn handle_reset() -> anyhow::Result<Response> {
    if !config::reset_enabled() {
        return Ok(ApiError::NotFound("Not found".to_string()).into());
    }
    core::db::reset_db_data(&store())?;
    Ok(Response::builder().status(204).body("").build())
}
