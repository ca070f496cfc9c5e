use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::auth;
use crate::identity::Identity;

/// Resolve the caller's identity from the Authorization header and inject it
/// into request extensions.
///
/// This middleware never rejects: a missing, malformed or expired token
/// resolves to `Identity::Anonymous`, and the operation's guard chain is
/// responsible for turning that into UNAUTHORIZED where it matters.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    let identity = resolve_identity(request.headers());
    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn resolve_identity(headers: &HeaderMap) -> Identity {
    let Some(token) = extract_bearer_token(headers) else {
        return Identity::Anonymous;
    };

    match auth::validate_jwt(&token) {
        Ok(claims) => Identity::from(claims),
        Err(reason) => {
            tracing::debug!("session token rejected: {}", reason);
            Identity::Anonymous
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))?;

    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt, Claims};
    use crate::identity::Role;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn no_header_resolves_anonymous() {
        let identity = resolve_identity(&HeaderMap::new());
        assert!(matches!(identity, Identity::Anonymous));
    }

    #[test]
    fn garbage_token_resolves_anonymous() {
        let identity = resolve_identity(&headers_with("Bearer not.a.jwt"));
        assert!(matches!(identity, Identity::Anonymous));

        let identity = resolve_identity(&headers_with("Basic dXNlcjpwYXNz"));
        assert!(matches!(identity, Identity::Anonymous));
    }

    #[test]
    fn valid_token_resolves_known_identity() {
        let account_id = Uuid::new_v4();
        let claims = Claims::new(account_id, "Bob".to_string(), Role::Admin);
        let token = generate_jwt(&claims).unwrap();

        let identity = resolve_identity(&headers_with(&format!("Bearer {}", token)));
        match identity {
            Identity::Known { account_id: id, name, role } => {
                assert_eq!(id, account_id);
                assert_eq!(name, "Bob");
                assert_eq!(role, Role::Admin);
            }
            Identity::Anonymous => panic!("expected known identity"),
        }
    }
}
