//! Client-credential grant (RFC 6749 section 4.4).

use reqwest::RequestBuilder;

/// Adds the form-encoded client-credential grant to a token request.
pub(super) fn request(
    builder: RequestBuilder,
    client_id: &str,
    client_secret: &str,
) -> RequestBuilder {
    builder.form(&[
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ])
}
