use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config;
use crate::identity::{Identity, Role};

/// Session token claims. `sub` is the account id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(account_id: Uuid, name: String, role: Role) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: account_id,
            name,
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity::Known {
            account_id: claims.sub,
            name: claims.name,
            role: claims.role,
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate a session token and extract its claims. Expiry is checked by
/// the default validation rules.
pub fn validate_jwt(token: &str) -> Result<Claims, String> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("Invalid JWT token: {}", e))?;

    Ok(token_data.claims)
}

pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, config::config().security.bcrypt_cost)
}

/// Constant result on any failure: a malformed stored hash verifies as false
/// rather than erroring out of the login path.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

/// Digest an activation token for at-rest storage. A leaked accounts table
/// must not leak usable invitation links.
pub fn activation_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a fresh activation token. The raw value is returned to the
/// inviting staff member exactly once; only the digest is persisted.
pub fn new_activation_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip() {
        let claims = Claims::new(Uuid::new_v4(), "Alice".to_string(), Role::Employee);
        let token = generate_jwt(&claims).expect("dev config has a secret");

        let decoded = validate_jwt(&token).expect("token should validate");
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.name, "Alice");
        assert_eq!(decoded.role, Role::Employee);
    }

    #[test]
    fn rejects_tampered_token() {
        let claims = Claims::new(Uuid::new_v4(), "Alice".to_string(), Role::Customer);
        let token = generate_jwt(&claims).unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(validate_jwt(&tampered).is_err());
    }

    #[test]
    fn password_verification() {
        // Minimum cost keeps the test fast
        let hash = bcrypt::hash("hunter2secret", 4).unwrap();
        assert!(verify_password("hunter2secret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("hunter2secret", "not-a-bcrypt-hash"));
    }

    #[test]
    fn activation_digest_is_stable_and_opaque() {
        let token = new_activation_token();
        let d1 = activation_digest(&token);
        let d2 = activation_digest(&token);
        assert_eq!(d1, d2);
        assert_ne!(d1, token);
        assert_eq!(d1.len(), 64);
    }
}
