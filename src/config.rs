pub const USERS_LIST_KEY: &str = "users_list";
pub const TOKENS_LIST_KEY: &str = "tokens_list";
pub const FEED_KEY: &str = "feed";

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 3;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_POST_LENGTH: usize = 140;

pub const DEFAULT_POSTS_PER_PAGE: usize = 10;

pub fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn post_key(post_id: &str) -> String {
    format!("post:{}", post_id)
}

pub fn followings_key(user_id: &str) -> String {
    format!("followings:{}", user_id)
}

pub fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

pub fn token_expiration_hours() -> i64 {
    std::env::var("CHIRP_TOKEN_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

pub fn posts_per_page() -> usize {
    std::env::var("CHIRP_POSTS_PER_PAGE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_POSTS_PER_PAGE)
}

pub fn listen_addr() -> String {
    std::env::var("CHIRP_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

pub fn seed_demo_enabled() -> bool {
    std::env::var("CHIRP_SEED_DEMO").map(|v| v == "true").unwrap_or(false)
}

pub fn reset_enabled() -> bool {
    std::env::var("CHIRP_ENABLE_RESET").map(|v| v == "true").unwrap_or(false)
}
