//! Request gate middleware.
//!
//! The upload routes sit behind an opaque gate: the enclosing framework's
//! signed-URL machinery decides who may reach this service, and this
//! middleware enforces the resulting shared secret. Requests present the
//! secret as a bearer token; its SHA-256 must match `gate.token_hash`.
//! An unset hash disables the gate.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

/// Gate middleware for upload routes.
pub async fn gate_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected_hash) = &state.config.gate.token_hash {
        let presented = bearer_token(&req)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(presented.as_bytes());
        let presented_hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        if !presented_hash.eq_ignore_ascii_case(expected_hash) {
            tracing::warn!("rejected request with invalid gate token");
            return Err(ApiError::Unauthorized("invalid signature".to_string()));
        }
    }

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn bearer_token_extraction() {
        let req = Request::builder()
            .header(AUTHORIZATION, "Bearer secret-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), Some("secret-token"));

        let req = Request::builder()
            .header(AUTHORIZATION, "Basic dXNlcg==")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), None);

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(bearer_token(&req), None);
    }
}
