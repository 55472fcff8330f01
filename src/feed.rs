use serde::Serialize;
use spin_sdk::http::{Request, Response};
use std::collections::HashSet;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::{ApiError, StoreError};
use crate::core::helpers::{json_response, store};
use crate::core::query_params::{get_int, parse_query_params};
use crate::core::store::Storage;
use crate::follow::followed_set;
use crate::models::models::Post;
use crate::users::user_exists;

/// One page of a newest-first result set. `has_next` means at least one
/// more item exists past this slice; `has_prev` means earlier pages held
/// items (page numbers are 1-based).
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
    pub has_prev: bool,
}

fn check_page_args(page: usize, page_size: usize) -> Result<(), StoreError> {
    if page < 1 {
        return Err(StoreError::InvalidArgument("page must be >= 1".to_string()));
    }
    if page_size < 1 {
        return Err(StoreError::InvalidArgument("page_size must be >= 1".to_string()));
    }
    Ok(())
}

/// Dedup, order and slice. The three steps are explicit so each is
/// testable: duplicates drop by post id, ordering is (created_at desc,
/// id desc) which keeps pagination stable across calls with no writes
/// in between, and out-of-range pages come back empty rather than as an
/// error.
pub fn paginate(mut posts: Vec<Post>, page: usize, page_size: usize) -> Page<Post> {
    let mut seen = HashSet::new();
    posts.retain(|p| seen.insert(p.id.clone()));

    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let total = posts.len();
    // Saturate on huge page numbers: any offset past the end is just an
    // empty page, never a panic or a wrapped slice.
    let start = (page - 1).saturating_mul(page_size);
    let items: Vec<Post> = posts.into_iter().skip(start).take(page_size).collect();

    Page {
        has_next: start + items.len() < total,
        has_prev: page > 1 && total > 0,
        items,
    }
}

fn load_posts<S, F>(store: &S, mut include: F) -> Result<Vec<Post>, StoreError>
where
    S: Storage,
    F: FnMut(&Post) -> bool,
{
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut posts = Vec::new();
    for post_id in &feed {
        if let Some(p) = store.get_json::<Post>(&post_key(post_id))? {
            if include(&p) {
                posts.push(p);
            }
        }
    }
    Ok(posts)
}

/// A user's timeline: own posts unioned with posts by every followed
/// author, newest first. Own posts are included by construction - there
/// is never a self-follow edge to rely on.
pub fn timeline<S: Storage>(
    store: &S,
    user_id: &str,
    page: usize,
    page_size: usize,
) -> Result<Page<Post>, StoreError> {
    check_page_args(page, page_size)?;
    if !user_exists(store, user_id)? {
        return Err(StoreError::NotFound(format!("user {} does not exist", user_id)));
    }

    // Set-membership filter over one scan of the post index, not one
    // query per followed author.
    let followed = followed_set(store, user_id)?;
    let visible = load_posts(store, |p| p.user_id == user_id || followed.contains(&p.user_id))?;

    Ok(paginate(visible, page, page_size))
}

/// The explore view: every post by everyone, same ordering and paging as
/// `timeline`.
pub fn global_feed<S: Storage>(
    store: &S,
    page: usize,
    page_size: usize,
) -> Result<Page<Post>, StoreError> {
    check_page_args(page, page_size)?;
    let posts = load_posts(store, |_| true)?;
    Ok(paginate(posts, page, page_size))
}

/// Posts by a single author, for profile pages.
pub fn author_posts<S: Storage>(
    store: &S,
    author_id: &str,
    page: usize,
    page_size: usize,
) -> Result<Page<Post>, StoreError> {
    check_page_args(page, page_size)?;
    if !user_exists(store, author_id)? {
        return Err(StoreError::NotFound(format!("user {} does not exist", author_id)));
    }
    let posts = load_posts(store, |p| p.user_id == author_id)?;
    Ok(paginate(posts, page, page_size))
}

// === HTTP Handlers ===

fn page_args(req: &Request) -> (usize, usize) {
    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);
    let page_size = get_int(&params, "page_size", posts_per_page());
    (page, page_size)
}

pub fn handle_timeline(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let (page, page_size) = page_args(&req);
    let store = store();
    match timeline(&store, &user_id, page, page_size) {
        Ok(page) => Ok(json_response(200, serde_json::to_vec(&page)?)),
        Err(e) => Ok(ApiError::from(e).into()),
    }
}

pub fn handle_global_feed(req: Request) -> anyhow::Result<Response> {
    let (page, page_size) = page_args(&req);
    let store = store();
    match global_feed(&store, page, page_size) {
        Ok(page) => Ok(json_response(200, serde_json::to_vec(&page)?)),
        Err(e) => Ok(ApiError::from(e).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::helpers::now_iso;
    use crate::core::store::MemoryStore;
    use crate::follow::{follow_user, unfollow_user};
    use crate::models::models::User;

    fn seed_user(store: &MemoryStore, id: &str) {
        let user = User {
            id: id.to_string(),
            username: format!("user_{}", id),
            email: format!("{}@example.com", id),
            password: "hash".to_string(),
            bio: None,
            last_seen: now_iso(),
        };
        store.set_json(&user_key(id), &user).unwrap();
        let mut users: Vec<String> = store.get_json(USERS_LIST_KEY).unwrap().unwrap_or_default();
        users.push(id.to_string());
        store.set_json(USERS_LIST_KEY, &users).unwrap();
    }

    fn seed_post(store: &MemoryStore, id: &str, author: &str, body: &str, created_at: &str) {
        let post = Post {
            id: id.to_string(),
            user_id: author.to_string(),
            body: body.to_string(),
            created_at: created_at.to_string(),
        };
        store.set_json(&post_key(id), &post).unwrap();
        let mut feed: Vec<String> = store.get_json(FEED_KEY).unwrap().unwrap_or_default();
        feed.insert(0, id.to_string());
        store.set_json(FEED_KEY, &feed).unwrap();
    }

    fn ts(minute: usize) -> String {
        format!("2024-06-01T10:{:02}:00+00:00", minute)
    }

    fn bodies(page: &Page<Post>) -> Vec<&str> {
        page.items.iter().map(|p| p.body.as_str()).collect()
    }

    #[test]
    fn own_posts_always_present_without_any_follow() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_post(&store, "p1", "a", "mine", &ts(1));

        let page = timeline(&store, "a", 1, 10).unwrap();
        assert_eq!(bodies(&page), vec!["mine"]);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn timeline_unions_followed_authors_and_excludes_others() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");
        seed_user(&store, "c");
        follow_user(&store, "a", "b").unwrap();

        seed_post(&store, "p1", "b", "hello", &ts(1));
        seed_post(&store, "p2", "c", "world", &ts(2));
        seed_post(&store, "p3", "a", "me", &ts(3));

        let page = timeline(&store, "a", 1, 10).unwrap();
        assert_eq!(bodies(&page), vec!["me", "hello"]);
    }

    #[test]
    fn unfollow_removes_that_author_from_the_timeline() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");
        follow_user(&store, "a", "b").unwrap();

        seed_post(&store, "p1", "b", "hello", &ts(1));
        seed_post(&store, "p3", "a", "me", &ts(3));

        unfollow_user(&store, "a", "b").unwrap();
        let page = timeline(&store, "a", 1, 10).unwrap();
        assert_eq!(bodies(&page), vec!["me"]);
    }

    #[test]
    fn ordering_is_timestamp_desc_with_id_tiebreak_and_no_duplicates() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_post(&store, "p1", "a", "first", &ts(5));
        seed_post(&store, "p2", "a", "second", &ts(5));
        // Same post id indexed twice must surface once
        let mut feed: Vec<String> = store.get_json(FEED_KEY).unwrap().unwrap();
        feed.push("p1".to_string());
        store.set_json(FEED_KEY, &feed).unwrap();

        let page = timeline(&store, "a", 1, 10).unwrap();
        assert_eq!(bodies(&page), vec!["second", "first"]);
    }

    #[test]
    fn pagination_flags_over_25_posts() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        for i in 0..25 {
            seed_post(&store, &format!("p{:02}", i), "a", &format!("post {}", i), &ts(i));
        }

        let page1 = timeline(&store, "a", 1, 10).unwrap();
        assert_eq!(page1.items.len(), 10);
        assert!(page1.has_next);
        assert!(!page1.has_prev);

        let page3 = timeline(&store, "a", 3, 10).unwrap();
        assert_eq!(page3.items.len(), 5);
        assert!(!page3.has_next);
        assert!(page3.has_prev);

        let page4 = timeline(&store, "a", 4, 10).unwrap();
        assert!(page4.items.is_empty());
        assert!(!page4.has_next);
        assert!(page4.has_prev);
    }

    #[test]
    fn enormous_page_numbers_are_past_the_end_not_a_panic() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_post(&store, "p1", "a", "mine", &ts(1));

        let page = timeline(&store, "a", usize::MAX, 10).unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next);
        assert!(page.has_prev);

        let page = global_feed(&store, usize::MAX, usize::MAX).unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn page_zero_and_zero_page_size_are_rejected() {
        let store = MemoryStore::new();
        seed_user(&store, "a");

        assert!(matches!(
            timeline(&store, "a", 0, 10),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            timeline(&store, "a", 1, 0),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            global_feed(&store, 0, 10),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            timeline(&store, "ghost", 1, 10),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            author_posts(&store, "ghost", 1, 10),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn empty_timeline_pages_have_no_prev() {
        let store = MemoryStore::new();
        seed_user(&store, "a");

        let page2 = timeline(&store, "a", 2, 10).unwrap();
        assert!(page2.items.is_empty());
        assert!(!page2.has_next);
        assert!(!page2.has_prev);
    }

    #[test]
    fn global_feed_sees_everyone() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");
        seed_post(&store, "p1", "a", "from a", &ts(1));
        seed_post(&store, "p2", "b", "from b", &ts(2));

        let page = global_feed(&store, 1, 10).unwrap();
        assert_eq!(bodies(&page), vec!["from b", "from a"]);
    }

    #[test]
    fn author_posts_filters_to_one_author() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");
        seed_post(&store, "p1", "a", "from a", &ts(1));
        seed_post(&store, "p2", "b", "from b", &ts(2));

        let page = author_posts(&store, "b", 1, 10).unwrap();
        assert_eq!(bodies(&page), vec!["from b"]);
        assert!(!page.has_next);
    }
}
