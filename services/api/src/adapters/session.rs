//! services/api/src/adapters/session.rs
//!
//! HS256 JWT implementation of the `SessionIssuer` port.

use chrono::{DateTime, Duration, Utc};
use flashcards_core::domain::{Plan, SessionClaims, SessionToken, User};
use flashcards_core::ports::{PortError, PortResult, SessionIssuer};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

/// The claims as they travel inside the token.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    plan: String,
    iat: i64,
    exp: i64,
}

pub struct JwtSessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl JwtSessionIssuer {
    pub fn new(secret: &[u8], lifetime_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime: Duration::seconds(lifetime_secs),
        }
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue(&self, user: &User) -> PortResult<SessionToken> {
        let now = Utc::now();
        let expires_at = now + self.lifetime;
        let claims = TokenClaims {
            sub: user.id,
            plan: user.plan.as_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to sign session token: {:?}", e);
            PortError::Unexpected("failed to sign session token".to_string())
        })?;
        Ok(SessionToken { token, expires_at })
    }

    fn validate(&self, token: &str) -> PortResult<SessionClaims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!("Rejected session token: {}", e);
            PortError::Unauthorized
        })?;
        let plan = data
            .claims
            .plan
            .parse::<Plan>()
            .map_err(|_| PortError::Unauthorized)?;
        let expires_at =
            DateTime::from_timestamp(data.claims.exp, 0).ok_or(PortError::Unauthorized)?;
        Ok(SessionClaims {
            user_id: data.claims.sub,
            plan,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(plan: Plan) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            plan,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_validate() {
        let issuer = JwtSessionIssuer::new(b"test-secret", 3600);
        let u = user(Plan::Pro);
        let token = issuer.issue(&u).unwrap();
        let claims = issuer.validate(&token.token).unwrap();
        assert_eq!(claims.user_id, u.id);
        assert_eq!(claims.plan, Plan::Pro);
        assert_eq!(claims.expires_at.timestamp(), token.expires_at.timestamp());
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let issuer = JwtSessionIssuer::new(b"test-secret", 3600);
        let forger = JwtSessionIssuer::new(b"other-secret", 3600);
        let forged = forger.issue(&user(Plan::Admin)).unwrap();
        assert!(matches!(issuer.validate(&forged.token), Err(PortError::Unauthorized)));

        let expired = JwtSessionIssuer::new(b"test-secret", -60)
            .issue(&user(Plan::Free))
            .unwrap();
        assert!(matches!(issuer.validate(&expired.token), Err(PortError::Unauthorized)));

        assert!(matches!(issuer.validate("not.a.jwt"), Err(PortError::Unauthorized)));
    }
}
