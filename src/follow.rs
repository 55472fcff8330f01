use spin_sdk::http::{Request, Response};
use std::collections::BTreeSet;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::{ApiError, StoreError};
use crate::core::helpers::{json_response, store, validate_uuid};
use crate::core::query_params::{get_string, parse_query_params};
use crate::core::store::Storage;
use crate::users::user_exists;

/// Outcome of a follow mutation. `AlreadyFollowing` and `SelfFollow` left
/// the edge set untouched; they are distinct so callers can answer repeat
/// requests without treating them as failures.
#[derive(Debug, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    NotFollowing,
}

fn ensure_user<S: Storage>(store: &S, user_id: &str) -> Result<(), StoreError> {
    if !user_exists(store, user_id)? {
        return Err(StoreError::NotFound(format!("user {} does not exist", user_id)));
    }
    Ok(())
}

/// Insert the directed edge (follower, followee).
///
/// The edge set for one follower is persisted as a single set value, so a
/// duplicate follow cannot create a second edge even when two calls race:
/// both writes produce a set containing the edge exactly once.
pub fn follow_user<S: Storage>(
    store: &S,
    follower_id: &str,
    followee_id: &str,
) -> Result<FollowOutcome, StoreError> {
    ensure_user(store, follower_id)?;
    ensure_user(store, followee_id)?;

    // Never create a self-edge. A user sees their own posts because the
    // feed assembler unions them in, not via a follow edge.
    if follower_id == followee_id {
        return Ok(FollowOutcome::SelfFollow);
    }

    let key = followings_key(follower_id);
    let mut followings: BTreeSet<String> = store.get_json(&key)?.unwrap_or_default();

    if !followings.insert(followee_id.to_string()) {
        return Ok(FollowOutcome::AlreadyFollowing);
    }
    store.set_json(&key, &followings)?;

    Ok(FollowOutcome::Followed)
}

/// Remove the directed edge (follower, followee). Absent edge is a no-op.
pub fn unfollow_user<S: Storage>(
    store: &S,
    follower_id: &str,
    followee_id: &str,
) -> Result<UnfollowOutcome, StoreError> {
    ensure_user(store, follower_id)?;
    ensure_user(store, followee_id)?;

    let key = followings_key(follower_id);
    let mut followings: BTreeSet<String> = store.get_json(&key)?.unwrap_or_default();

    if !followings.remove(followee_id) {
        return Ok(UnfollowOutcome::NotFollowing);
    }
    store.set_json(&key, &followings)?;

    Ok(UnfollowOutcome::Unfollowed)
}

/// Membership test on the edge set: one keyed read, no scan. Unknown users
/// simply have an empty followed-set, so this is total over identifiers.
pub fn is_following<S: Storage>(
    store: &S,
    follower_id: &str,
    followee_id: &str,
) -> Result<bool, StoreError> {
    let followings: BTreeSet<String> = store
        .get_json(&followings_key(follower_id))?
        .unwrap_or_default();
    Ok(followings.contains(followee_id))
}

/// Everyone `user_id` follows. Order is irrelevant to callers.
pub fn followed_set<S: Storage>(store: &S, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
    let followings: BTreeSet<String> = store
        .get_json(&followings_key(user_id))?
        .unwrap_or_default();
    Ok(followings)
}

/// Reverse lookup over the whole user list. Only used for profile pages.
pub fn get_followers<S: Storage>(store: &S, user_id: &str) -> Result<Vec<String>, StoreError> {
    ensure_user(store, user_id)?;

    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    let mut followers = Vec::new();

    for id in users {
        let followings: BTreeSet<String> = store
            .get_json(&followings_key(&id))?
            .unwrap_or_default();
        if followings.contains(user_id) {
            followers.push(id);
        }
    }

    Ok(followers)
}

// === HTTP Handlers ===

fn parse_target(req: &Request) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(req.body()).ok()?;
    let target = value["target_user_id"].as_str().unwrap_or_default();
    if target.is_empty() || !validate_uuid(target) {
        return None;
    }
    Some(target.to_string())
}

pub fn handle_follow(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let target_user_id = match parse_target(&req) {
        Some(t) => t,
        None => return Ok(ApiError::BadRequest("Invalid target user".to_string()).into()),
    };

    // Self-follow is rejected here with a user-visible error; the store
    // below would refuse to create the edge regardless.
    if target_user_id == user_id {
        return Ok(ApiError::BadRequest("Cannot follow yourself".to_string()).into());
    }

    let store = store();
    match follow_user(&store, &user_id, &target_user_id) {
        Ok(outcome) => {
            let status = match outcome {
                FollowOutcome::Followed => "followed",
                FollowOutcome::AlreadyFollowing => "already_following",
                FollowOutcome::SelfFollow => "ignored",
            };
            Ok(json_response(
                200,
                serde_json::to_vec(&serde_json::json!({"status": status}))?,
            ))
        }
        Err(e) => Ok(ApiError::from(e).into()),
    }
}

pub fn handle_unfollow(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let target_user_id = match parse_target(&req) {
        Some(t) => t,
        None => return Ok(ApiError::BadRequest("Invalid target user".to_string()).into()),
    };

    let store = store();
    match unfollow_user(&store, &user_id, &target_user_id) {
        Ok(outcome) => {
            let status = match outcome {
                UnfollowOutcome::Unfollowed => "unfollowed",
                UnfollowOutcome::NotFollowing => "not_following",
            };
            Ok(json_response(
                200,
                serde_json::to_vec(&serde_json::json!({"status": status}))?,
            ))
        }
        Err(e) => Ok(ApiError::from(e).into()),
    }
}

pub fn handle_is_following(req: Request) -> anyhow::Result<Response> {
    let params = parse_query_params(req.uri());
    let follower_id = get_string(&params, "follower_id").unwrap_or_default();
    let followee_id = get_string(&params, "followee_id").unwrap_or_default();

    if !validate_uuid(&follower_id) || !validate_uuid(&followee_id) {
        return Ok(ApiError::BadRequest("follower_id and followee_id required".to_string()).into());
    }

    let store = store();
    match is_following(&store, &follower_id, &followee_id) {
        Ok(following) => Ok(json_response(
            200,
            serde_json::to_vec(&serde_json::json!({"following": following}))?,
        )),
        Err(e) => Ok(ApiError::from(e).into()),
    }
}

pub fn get_followings_list(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/followings/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    match followed_set(&store, user_id) {
        Ok(followings) => Ok(json_response(200, serde_json::to_vec(&followings)?)),
        Err(e) => Ok(ApiError::from(e).into()),
    }
}

pub fn get_followers_list(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/followers/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    match get_followers(&store, user_id) {
        Ok(followers) => Ok(json_response(200, serde_json::to_vec(&followers)?)),
        Err(e) => Ok(ApiError::from(e).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::helpers::now_iso;
    use crate::core::store::MemoryStore;
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

    #[test]
    fn follow_is_directed() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");

        assert_eq!(follow_user(&store, "a", "b").unwrap(), FollowOutcome::Followed);
        assert!(is_following(&store, "a", "b").unwrap());
        assert!(!is_following(&store, "b", "a").unwrap());
    }

    #[test]
    fn follow_is_idempotent() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");

        assert_eq!(follow_user(&store, "a", "b").unwrap(), FollowOutcome::Followed);
        assert_eq!(
            follow_user(&store, "a", "b").unwrap(),
            FollowOutcome::AlreadyFollowing
        );
        assert_eq!(followed_set(&store, "a").unwrap().len(), 1);
    }

    #[test]
    fn unfollow_undoes_follow_and_is_idempotent() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");

        follow_user(&store, "a", "b").unwrap();
        assert_eq!(
            unfollow_user(&store, "a", "b").unwrap(),
            UnfollowOutcome::Unfollowed
        );
        assert!(!is_following(&store, "a", "b").unwrap());
        assert_eq!(
            unfollow_user(&store, "a", "b").unwrap(),
            UnfollowOutcome::NotFollowing
        );
    }

    #[test]
    fn self_follow_never_creates_an_edge() {
        let store = MemoryStore::new();
        seed_user(&store, "a");

        assert_eq!(follow_user(&store, "a", "a").unwrap(), FollowOutcome::SelfFollow);
        assert!(!is_following(&store, "a", "a").unwrap());
        assert!(followed_set(&store, "a").unwrap().is_empty());
    }

    #[test]
    fn follow_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        seed_user(&store, "a");

        assert!(matches!(
            follow_user(&store, "a", "ghost"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            unfollow_user(&store, "ghost", "a"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn followers_is_the_reverse_relation() {
        let store = MemoryStore::new();
        seed_user(&store, "a");
        seed_user(&store, "b");
        seed_user(&store, "c");

        follow_user(&store, "a", "c").unwrap();
        follow_user(&store, "b", "c").unwrap();

        let mut followers = get_followers(&store, "c").unwrap();
        followers.sort();
        assert_eq!(followers, vec!["a".to_string(), "b".to_string()]);
        assert!(get_followers(&store, "a").unwrap().is_empty());
    }
}
