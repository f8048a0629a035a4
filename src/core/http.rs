use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::error::RepoResult;

pub const DEFAULT_USER_AGENT: &str = "userdev/0.1.0";

pub fn build_http_client(user_agent: &str) -> RepoResult<Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Ok(Client::builder()
        .user_agent(user_agent)
        .default_headers(default_headers)
        .build()?)
}
