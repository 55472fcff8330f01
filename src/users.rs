use ammonia::Builder;
use regex::Regex;
use spin_sdk::http::{Request, Response};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, json_response, now_iso, store, validate_uuid, verify_password};
use crate::core::store::Storage;
use crate::models::models::{TokenData, User};

fn sanitize_text(text: &str) -> String {
    // Plain text only - strip all HTML
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Regex should compile"))
}

fn build_user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "username": user.username,
        "bio": user.bio.as_ref().unwrap_or(&String::new()),
        "last_seen": user.last_seen,
    })
}

pub fn user_exists<S: Storage>(store: &S, user_id: &str) -> anyhow::Result<bool> {
    Ok(store.get_json::<User>(&user_key(user_id))?.is_some())
}

pub fn find_user_by_username<S: Storage>(store: &S, username: &str) -> anyhow::Result<Option<User>> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in users {
        if let Some(u) = store.get_json::<User>(&user_key(&id))? {
            if u.username == username {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

// === HTTP Handlers ===

pub fn create_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let body = req.body();

    let new_user: serde_json::Value = serde_json::from_slice(body)?;
    let username = new_user["username"].as_str().unwrap_or("");
    let email = new_user["email"].as_str().unwrap_or("");
    let password = new_user["password"].as_str().unwrap_or("");

    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Ok(ApiError::BadRequest("Username must be 3-50 characters".to_string()).into());
    }
    if !email_regex().is_match(email) {
        return Ok(ApiError::BadRequest("Invalid email address".to_string()).into());
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Ok(ApiError::BadRequest("Password must be at least 3 characters".to_string()).into());
    }

    // Sanitize username at input time
    let sanitized_username = sanitize_text(username);

    // Check duplicate username and email
    let existing_users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in &existing_users {
        if let Some(u) = store.get_json::<User>(&user_key(id))? {
            if u.username == sanitized_username {
                return Ok(ApiError::Conflict("Username exists".to_string()).into());
            }
            if u.email == email {
                return Ok(ApiError::Conflict("Email exists".to_string()).into());
            }
        }
    }
    let id = Uuid::new_v4().to_string();

    let user = User {
        id: id.clone(),
        username: sanitized_username,
        email: email.to_string(),
        password: hash_password(password)?,
        bio: None,
        last_seen: now_iso(),
    };

    store.set_json(&user_key(&id), &user)?;

    // Add to users_list
    let mut users = existing_users;
    users.push(id);
    store.set_json(USERS_LIST_KEY, &users)?;

    Ok(json_response(201, serde_json::to_vec(&build_user_json(&user))?))
}

fn get_user_by_id(user_id: &str) -> anyhow::Result<Response> {
    let store = store();

    if let Some(user) = store.get_json::<User>(&user_key(user_id))? {
        Ok(json_response(200, serde_json::to_vec(&build_user_json(&user))?))
    } else {
        Ok(ApiError::NotFound("User not found".to_string()).into())
    }
}

pub fn get_profile(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    get_user_by_id(&user_id)
}

pub fn get_user_details(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/users/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    get_user_by_id(user_id)
}

pub fn update_profile(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let user_key = user_key(&user_id);

    if let Some(mut user) = store.get_json::<User>(&user_key)? {
        let value: serde_json::Value = serde_json::from_slice(req.body())?;
        let mut password_changed = false;

        // Update bio if provided
        if let Some(bio) = value["bio"].as_str() {
            if bio.len() > MAX_BIO_LENGTH {
                return Ok(ApiError::BadRequest("Bio too long (max 500 chars)".to_string()).into());
            }
            let sanitized_bio = sanitize_text(bio);
            user.bio = if sanitized_bio.is_empty() { None } else { Some(sanitized_bio) };
        }

        // Update username if provided
        if let Some(username) = value["username"].as_str() {
            if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
                return Ok(ApiError::BadRequest("Username must be 3-50 characters".to_string()).into());
            }
            let sanitized_username = sanitize_text(username);
            if sanitized_username != user.username {
                if find_user_by_username(&store, &sanitized_username)?.is_some() {
                    return Ok(ApiError::Conflict("Username exists".to_string()).into());
                }
                user.username = sanitized_username;
            }
        }

        // Update password if provided
        if let Some(new_password) = value["new_password"].as_str() {
            if new_password.len() < MIN_PASSWORD_LENGTH {
                return Ok(ApiError::BadRequest("Password must be 3+ characters".to_string()).into());
            }

            let old_password = match value["old_password"].as_str() {
                Some(p) => p,
                None => {
                    return Ok(ApiError::BadRequest("Current password required".to_string()).into())
                }
            };

            if !verify_password(old_password, &user.password) {
                return Ok(ApiError::Unauthorized.into());
            }

            user.password = hash_password(new_password)?;
            password_changed = true;
        }

        store.set_json(&user_key, &user)?;

        // If password changed, invalidate all tokens for this user and issue a new one
        let mut response_data = build_user_json(&user);
        if password_changed {
            let all_tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();

            let filtered_tokens: Vec<String> = all_tokens
                .into_iter()
                .filter(|token| {
                    let token_key = token_key(token);
                    if let Ok(Some(token_data)) = store.get_json::<TokenData>(&token_key) {
                        if token_data.user_id == user_id {
                            let _ = store.delete(&token_key);
                            false
                        } else {
                            true
                        }
                    } else {
                        true
                    }
                })
                .collect();

            let new_token = Uuid::new_v4().to_string();
            let token_data = TokenData {
                user_id: user_id.clone(),
                created_at: now_iso(),
            };
            store.set_json(&token_key(&new_token), &token_data)?;

            let mut updated_tokens = filtered_tokens;
            updated_tokens.push(new_token.clone());
            store.set_json(TOKENS_LIST_KEY, &updated_tokens)?;

            response_data["token"] = serde_json::Value::String(new_token);
        }

        Ok(json_response(200, serde_json::to_vec(&response_data)?))
    } else {
        Ok(ApiError::NotFound("User not found".to_string()).into())
    }
}
