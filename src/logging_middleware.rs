// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode

use axum::body::to_bytes;
use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use serde_json::Value;
use tracing::debug;

/// Upper bound on buffered bodies; auth payloads are tiny
const MAX_BODY_BYTES: usize = 64 * 1024;

const REDACTED_FIELDS: &[&str] = &["password", "password_digest", "access_token", "token"];

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    if !bytes.is_empty() {
        debug!(
            method = %parts.method,
            uri = %parts.uri.path(),
            request_body = %render_body(&bytes),
            "📥 Request"
        );
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() {
        debug!(
            status = %parts.status,
            response_body = %render_body(&bytes),
            "📤 Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

/// Pretty JSON with secret fields masked; non-JSON text as-is
fn render_body(bytes: &[u8]) -> String {
    let Ok(body_str) = std::str::from_utf8(bytes) else {
        return format!("<{} bytes>", bytes.len());
    };

    match serde_json::from_str::<Value>(body_str) {
        Ok(mut json) => {
            redact(&mut json);
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "<unprintable>".to_string())
        }
        Err(_) => body_str.to_string(),
    }
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String("***".to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_redacted() {
        let rendered = render_body(br#"{"email":"a@b.com","password":"abc12345"}"#);
        assert!(rendered.contains("a@b.com"));
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("abc12345"));
    }

    #[test]
    fn test_nested_redaction() {
        let rendered = render_body(br#"{"items":[{"token":"secret-value"}]}"#);
        assert!(!rendered.contains("secret-value"));
    }

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(render_body(b"Unauthorized: bad state"), "Unauthorized: bad state");
    }
}
