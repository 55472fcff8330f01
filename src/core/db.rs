use std::collections::BTreeSet;

use uuid::Uuid;

use crate::config::*;
use crate::core::helpers::{hash_password, now_iso};
use crate::core::store::Storage;
use crate::models::models::{Post, User};

fn create_user<S: Storage>(
    store: &S,
    users: &mut Vec<String>,
    username: &str,
    bio: &str,
) -> anyhow::Result<String> {
    let user_id = Uuid::new_v4().to_string();
    let user = User {
        id: user_id.clone(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: hash_password(username)?,
        bio: Some(bio.to_string()),
        last_seen: now_iso(),
    };
    store.set_json(&user_key(&user_id), &user)?;
    users.push(user_id.clone());
    Ok(user_id)
}

fn create_post<S: Storage>(
    store: &S,
    feed: &mut Vec<String>,
    author_id: &str,
    body: &str,
) -> anyhow::Result<()> {
    let post_id = Uuid::new_v4().to_string();
    let post = Post {
        id: post_id.clone(),
        user_id: author_id.to_string(),
        body: body.to_string(),
        created_at: now_iso(),
    };
    store.set_json(&post_key(&post_id), &post)?;
    feed.insert(0, post_id);
    Ok(())
}

/// Seed the demo accounts (test, alice, bob) with a few posts and a
/// follow edge from test to bob. Skipped if they already exist.
pub fn seed_demo_data<S: Storage>(store: &S) -> anyhow::Result<()> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in &users {
        if let Some(u) = store.get_json::<User>(&user_key(id))? {
            if u.username == "test" {
                return Ok(()); // Already initialized
            }
        }
    }

    let mut users = users;
    let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let test_id = create_user(store, &mut users, "test", "Test account")?;
    create_post(store, &mut feed, &test_id, "First post on chirp!")?;

    let alice_id = create_user(store, &mut users, "alice", "Hello, I'm Alice!")?;
    create_post(store, &mut feed, &alice_id, "Excited to share thoughts here.")?;
    create_post(store, &mut feed, &alice_id, "Feeling productive today!")?;

    let bob_id = create_user(store, &mut users, "bob", "Bob's corner of the internet")?;
    create_post(store, &mut feed, &bob_id, "Hey everyone, just joined chirp.")?;

    let mut followings: BTreeSet<String> = store
        .get_json(&followings_key(&test_id))?
        .unwrap_or_default();
    followings.insert(bob_id);
    store.set_json(&followings_key(&test_id), &followings)?;

    store.set_json(USERS_LIST_KEY, &users)?;
    store.set_json(FEED_KEY, &feed)?;

    Ok(())
}

/// Wipe all users, posts, edges and sessions. Only reachable through the
/// reset endpoint, which is disabled unless explicitly enabled.
pub fn reset_db_data<S: Storage>(store: &S) -> anyhow::Result<()> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    for id in &users {
        store.delete(&user_key(id))?;
        store.delete(&followings_key(id))?;
    }

    let posts: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    for id in posts {
        store.delete(&post_key(&id))?;
    }

    let tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    for token in tokens {
        store.delete(&token_key(&token))?;
    }

    store.delete(USERS_LIST_KEY)?;
    store.delete(FEED_KEY)?;
    store.delete(TOKENS_LIST_KEY)?;

    Ok(())
}
