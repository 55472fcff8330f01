use ammonia::Builder;
use html_escape::encode_double_quoted_attribute;
use regex::Regex;
use spin_sdk::http::{Request, Response};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, now_iso, store};
use crate::core::query_params::{get_int, get_string, parse_query_params};
use crate::feed::author_posts;
use crate::models::models::Post;
use crate::users::find_user_by_username;

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("Regex should compile"))
}

// Sanitize HTML to remove dangerous scripts and event handlers. A
// markup-only body can come out empty here, so the non-empty check must
// run on this result, not on the raw input.
fn sanitize_body(body: &str) -> String {
    Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(body)
        .to_string()
}

// Convert HTTP/HTTPS URLs into clickable links with proper escaping
fn linkify(body: &str) -> String {
    url_regex()
        .replace_all(body, |caps: &regex::Captures| {
            let url = &caps[0];
            let escaped_url = encode_double_quoted_attribute(url);
            format!(r#"<a href="{}" target="_blank">{}</a>"#, escaped_url, url)
        })
        .to_string()
}

// === HTTP Handlers ===

/// Posts are immutable: created here with a server-assigned timestamp,
/// never edited or deleted.
pub fn create_post(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let raw = value["body"].as_str().unwrap_or_default();

    let clean = sanitize_body(raw);
    if clean.is_empty() || clean.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest("Invalid post body".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let post = Post {
        id: id.clone(),
        user_id,
        body: linkify(&clean),
        created_at: now_iso(),
    };

    store.set_json(&post_key(&id), &post)?;

    // Prepend to the post index (newest first)
    let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed.insert(0, id);
    store.set_json(FEED_KEY, &feed)?;

    Ok(json_response(201, serde_json::to_vec(&post)?))
}

/// Public per-author listing: GET /posts?user={username}&page=N
pub fn list_posts(req: Request) -> anyhow::Result<Response> {
    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);
    let page_size = get_int(&params, "page_size", posts_per_page());

    let username = match get_string(&params, "user") {
        Some(u) if !u.is_empty() => u,
        _ => return Ok(ApiError::BadRequest("user parameter required".to_string()).into()),
    };

    let store = store();
    let author = match find_user_by_username(&store, &username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    match author_posts(&store, &author.id, page, page_size) {
        Ok(page) => Ok(json_response(200, serde_json::to_vec(&page)?)),
        Err(e) => Ok(ApiError::from(e).into()),
    }
}
