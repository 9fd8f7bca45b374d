//! HS256 bearer tokens.

use crate::error::ApiError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue(user_id: Uuid, role: &str, secret: &str, expires_hours: i64) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let exp = now + chrono::Duration::hours(expires_hours);
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}

pub fn verify(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn round_trip() {
        let id = Uuid::new_v4();
        let token = issue(id, "admin", SECRET, 24).unwrap();
        let claims = verify(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn wrong_secret_fails() {
        let token = issue(Uuid::new_v4(), "user", SECRET, 24).unwrap();
        assert!(matches!(verify(&token, "other-secret"), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn expired_token_fails() {
        let token = issue(Uuid::new_v4(), "user", SECRET, -1).unwrap();
        assert!(matches!(verify(&token, SECRET), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn garbage_fails() {
        assert!(matches!(verify("not-a-token", SECRET), Err(ApiError::Unauthorized)));
    }
}
