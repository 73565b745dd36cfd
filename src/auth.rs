//! Bearer-token extraction for the HTTP transport.
//!
//! The gateway does not authenticate tokens here: any well-formed bearer
//! token is passed on to credential resolution, which decides validity.

use axum::http::{HeaderMap, header};

/// Extract the bearer token from request headers.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Err("Missing Bearer token in Authorization header");
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Authorization header contains invalid characters")?;

    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err("Invalid Authorization header format. Expected 'Bearer <token>'");
    };

    let token = token.trim();
    if token.is_empty() {
        return Err("Bearer token is empty");
    }

    Ok(token)
}

/// Mask a token for logging, keeping only a short prefix.
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(3) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}
