//! Username/password exchange over HTTP basic auth.

use reqwest::RequestBuilder;

/// Adds basic credentials to a token request. The body stays empty.
pub(super) fn request(builder: RequestBuilder, username: &str, password: &str) -> RequestBuilder {
    builder.basic_auth(username, Some(password))
}
